use std::path::PathBuf;

use thiserror::Error;

/// Failures that are surfaced to the caller.
///
/// Component construction errors are not part of this enum: they are contained
/// by the scanner, logged, and reported through [`crate::init::InitReport`].
#[derive(Debug, Error)]
pub enum BinderError {
    /// `update_element` was called on a node without a parent.
    #[error("Cannot update element: element not mounted in dom")]
    DetachedElement,

    /// The replacement HTML did not produce a single element.
    #[error("Cannot update element: html does not contain an element")]
    EmptyFragment,

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Failed to read data module {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse data module {}: {source}", path.display())]
    DataModule {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

pub type Result<T, E = BinderError> = std::result::Result<T, E>;
