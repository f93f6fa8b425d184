//! Unified error handling for the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::accounts::AccountError;

/// Application-level error type returned by route handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// A lifecycle operation failed.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Database operation outside a lifecycle service failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Account(e) => account_status(e),
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message shown to the client. Storage, token and session details stay server-side.
    fn public_message(&self) -> String {
        match self {
            Self::Account(
                AccountError::Repository(_) | AccountError::Token(_) | AccountError::Session(_),
            )
            | Self::Database(_) => "Internal server error".to_owned(),
            Self::Account(AccountError::Notification(_)) => "Email delivery failed".to_owned(),
            _ => self.to_string(),
        }
    }
}

const fn account_status(error: &AccountError) -> StatusCode {
    match error {
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::Conflict(_) => StatusCode::CONFLICT,
        AccountError::InvalidCredential(_)
        | AccountError::ValidationFailed(_)
        | AccountError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AccountError::AccountDisabled | AccountError::Forbidden(_) => StatusCode::FORBIDDEN,
        AccountError::Notification(_) => StatusCode::BAD_GATEWAY,
        AccountError::Incomplete { .. }
        | AccountError::Repository(_)
        | AccountError::Token(_)
        | AccountError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.public_message()).into_response()
    }
}
