//! Error types for the content provider layer.

/// Errors from resolving or loading content.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The backing store failed while materializing a node.
    #[error("content store failed: {0}")]
    Store(String),

    /// A template required a path that does not exist.
    #[error("missing content at {0}")]
    MissingPath(String),

    /// A leaf held a value of the wrong type for the template parsing it.
    #[error("type mismatch at {path}: expected {expected}")]
    TypeMismatch {
        /// Path of the offending leaf.
        path: String,
        /// What the template parser needed.
        expected: &'static str,
    },
}
