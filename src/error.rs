use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CanvasError>;

/// Errors raised at the edges of the crate: loading task lists, themes and
/// configuration, and writing rendered output. The graph core itself never
/// fails; degenerate input resolves to empty geometry instead.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("file not found: {path}")]
    MissingPath { path: PathBuf },

    #[error("unknown built-in theme '{name}'. Available: {available}")]
    UnknownTheme { name: String, available: String },

    #[error("unsupported input format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("logging error: {0}")]
    Logging(String),
}

impl CanvasError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
