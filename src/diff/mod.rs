//! Diff generation, per-resource diff state and terminal rendering.

pub mod formatter;
pub mod generator;
pub mod state;

pub use formatter::DiffRenderer;
pub use generator::{DiffGenerator, DiffOutput};
pub use state::{ResourceDiffState, BASELINE_REVISION};
