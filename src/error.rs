use thiserror::Error;

/// Main error type for codedigest operations
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("TOML error: {0}")]
    Toml(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
