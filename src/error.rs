//! Error types for the watch-to-diff engine.

use thiserror::Error;

/// Errors surfaced by the engine and its collaborators.
#[derive(Error, Debug)]
pub enum WatchDiffError {
    /// The resolved selection spans more than one resource kind.
    #[error(
        "watch is only supported on individual resources and resource collections - \
         more than 1 resource kind was found: {kinds}"
    )]
    Selection { kinds: String },

    /// The watch service delivered an error event.
    #[error("watch returned an error event: {message}")]
    ServerError { message: String },

    /// An event or its object is not a recognizable structured resource.
    #[error("malformed watch payload: {reason}")]
    MalformedPayload { reason: String },

    /// A field-focus path expression failed to parse.
    #[error("invalid path expression {expr:?} at offset {offset}: {reason}")]
    PathParse {
        expr: String,
        offset: usize,
        reason: String,
    },

    /// The subscription ended while the run still expected events.
    #[error("watch closed before the run was cancelled")]
    WatchClosed,

    /// The resource locator failed to resolve or subscribe.
    #[error("resource locator failed: {reason}")]
    Locator { reason: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl WatchDiffError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    pub fn locator(reason: impl Into<String>) -> Self {
        Self::Locator {
            reason: reason.into(),
        }
    }
}
