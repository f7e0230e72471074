use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackvaultError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Config(ConfigError),
    #[error("{0}")]
    Engine(EngineError),
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
    #[error("missing required setting {0}")]
    MissingSecret(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("required command not found: {0}")]
    MissingTool(String),
    #[error("{program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("init {repository} failed with exit code {status}: {message}")]
    Init {
        repository: String,
        status: i32,
        message: String,
    },
    #[error("{operation} failed with exit code {status}: {message}")]
    Failed {
        operation: String,
        status: i32,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, BackvaultError>;

impl BackvaultError {
    pub fn message(msg: impl Into<String>) -> Self {
        BackvaultError::Message(msg.into())
    }
}

impl From<ConfigError> for BackvaultError {
    fn from(err: ConfigError) -> Self {
        BackvaultError::Config(err)
    }
}

impl From<EngineError> for BackvaultError {
    fn from(err: EngineError) -> Self {
        BackvaultError::Engine(err)
    }
}
