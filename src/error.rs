use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid light configuration: {0}")]
    Validation(String),
    #[error("light configuration io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("watch channel send failed")]
    WatchSend,
    #[error("state lock poisoned")]
    StateLock,
}

impl From<serde_json::Error> for ControllerError {
    fn from(err: serde_json::Error) -> Self {
        ControllerError::Validation(err.to_string())
    }
}
