use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Audio session error: {0}")]
    AudioSession(String),

    #[error("Engine creation failed: {0}")]
    EngineCreation(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
