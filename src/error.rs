// Errors surfaced at the HTTP boundary

use crate::balance::BalanceError;
use crate::credentials::CredentialError;
use crate::gate::SessionRejected;
use crate::session::SignError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Validation failure of user supplied input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub &'static str);

#[derive(Debug, Error)]
pub enum AppError {
    /// Client fault, message is shown to the user
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    /// Session missing, invalid or expired
    #[error("invalid or expired session")]
    Unauthorized,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("credential failure: {0}")]
    Credential(#[from] CredentialError),

    #[error("balance listing failure: {0}")]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Session(#[from] SignError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.0.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store(_)
            | Self::Credential(_)
            | Self::Balance(_)
            | Self::Session(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::BadRequest(message) => (status, message).into_response(),
            Self::NotFound(message) => (status, message).into_response(),
            Self::Unauthorized => {
                let mut response = (status, "invalid or expired session").into_response();
                response.extensions_mut().insert(SessionRejected);
                response
            }
            err => {
                // Details stay in the log
                error!("Request failed: {}", err);
                (status, "Internal server error").into_response()
            }
        }
    }
}
