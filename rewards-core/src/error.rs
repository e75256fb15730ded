// rewards-core/src/error.rs
use common::models::Platform;

/// Errors from the persisted key/value layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Failures talking to the remote status / verification / phone services
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("transport failure during {operation}: {detail}")]
    Transport { operation: &'static str, detail: String },
    #[error("{operation} returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },
    #[error("{operation} returned an undecodable body: {detail}")]
    Decode { operation: &'static str, detail: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SmsError {
    #[error("SMS gateway unreachable: {0}")]
    Transport(String),
    #[error("SMS gateway rejected the message: {0}")]
    Rejected(String),
}

/// Phone verification failures; all are recoverable by retrying the step
#[derive(Debug, Clone, thiserror::Error)]
pub enum OtpError {
    #[error("phone number must have at least {min_len} characters")]
    InvalidPhone { min_len: usize },
    #[error("verification code must be 6 digits")]
    InvalidCodeFormat,
    #[error("no verification code has been sent")]
    NoChallenge,
    #[error("verification code has expired")]
    Expired,
    #[error("verification code is incorrect")]
    CodeMismatch,
    #[error("could not deliver verification code: {0}")]
    Delivery(#[from] SmsError),
    #[error("could not save phone number: {0}")]
    Association(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("operation not allowed while {0}")]
    WrongState(&'static str),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("login failed")]
    LoginFailed,
    #[error("a login is already in progress")]
    LoginInProgress,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VerifyError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("{0} cannot be verified from a screenshot")]
    NotVerifiable(Platform),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
