use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unknown animation: {0}")]
    UnknownAnimation(String),

    #[error("Unknown gesture: {0}")]
    UnknownGesture(String),

    #[error("Unknown emotion: {0}")]
    UnknownEmotion(String),

    #[error("Unknown render mode: {0}")]
    UnknownMode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
