// rewards-web/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rewards_core::error::{OtpError, RemoteError, SessionError, StoreError, VerifyError};
use serde_json::json;

/// Errors surfaced by the dashboard API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    #[error("no phone verification in progress")]
    NoPhoneFlow,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::LoginFailed) => StatusCode::UNAUTHORIZED,
            ApiError::Session(SessionError::LoginInProgress) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,

            ApiError::Verify(VerifyError::NotLoggedIn) => StatusCode::UNAUTHORIZED,
            ApiError::Verify(VerifyError::NotVerifiable(_)) => StatusCode::BAD_REQUEST,
            ApiError::Verify(VerifyError::Remote(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Verify(VerifyError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,

            ApiError::Otp(OtpError::Delivery(_)) | ApiError::Otp(OtpError::Association(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Otp(OtpError::WrongState(_)) => StatusCode::CONFLICT,
            ApiError::Otp(OtpError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Otp(_) => StatusCode::BAD_REQUEST,

            ApiError::UnknownPlatform(_) => StatusCode::NOT_FOUND,
            ApiError::NoPhoneFlow => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let mut body = json!({ "error": self.to_string() });
        if status == StatusCode::BAD_GATEWAY {
            body["retry"] = json!(true);
        }
        HttpResponse::build(status).json(body)
    }
}

/// Failures while wiring the process together at startup
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("remote client: {0}")]
    Remote(#[from] RemoteError),
    #[error("identity provider url: {0}")]
    Url(#[from] url::ParseError),
}
