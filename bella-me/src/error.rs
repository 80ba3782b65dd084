//! Error types for bella-me

use bella_core::Error as CoreError;
use thiserror::Error;

/// Avatar runtime errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Asset load failed: {0}")]
    AssetLoad(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Voice agent error: {0}")]
    Voice(String),

    #[error("Network probe error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Animation engine is shut down")]
    EngineClosed,

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<AvatarError> for CoreError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::Core(inner) => inner,
            AvatarError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::InvalidInput(format!("Avatar error: {}", other)),
        }
    }
}
