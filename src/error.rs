use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThaiMtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unsupported translation direction: {from} -> {to}")]
    UnsupportedDirection { from: String, to: String },

    #[error("Model storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Failed to load translation engine: {0}")]
    EngineLoad(String),

    #[error("Translation engine error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ThaiMtError {
    /// Errors the caller can fix by changing the request itself
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::UnsupportedDirection { .. })
    }
}

pub type Result<T> = std::result::Result<T, ThaiMtError>;
