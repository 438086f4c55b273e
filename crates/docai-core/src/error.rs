use thiserror::Error;

/// Top-level error type for the DocAI client.
///
/// Subsystem crates define their own error types and implement
/// `From<DocAiError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocAiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for DocAiError {
    fn from(err: toml::de::Error) -> Self {
        DocAiError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DocAiError {
    fn from(err: toml::ser::Error) -> Self {
        DocAiError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DocAiError {
    fn from(err: serde_json::Error) -> Self {
        DocAiError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for DocAI operations.
pub type Result<T> = std::result::Result<T, DocAiError>;
