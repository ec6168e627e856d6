pub mod cli;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod interrupt;
pub mod jsonpath;
pub mod locator;
pub mod normalize;
pub mod watcher;

pub use config::*;
pub use diff::*;
pub use dispatch::*;
pub use error::*;
pub use events::*;
pub use interrupt::*;
pub use jsonpath::*;
pub use locator::*;
pub use normalize::*;
pub use watcher::*;
