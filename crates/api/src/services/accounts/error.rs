//! Account lifecycle error taxonomy.

use thiserror::Error;

use super::stores::{CreateAccountError, SessionError};
use crate::db::RepositoryError;
use crate::services::email::EmailError;
use crate::services::tokens::TokenError;

/// Errors returned by the provisioner, authenticator and deactivator.
///
/// Client-facing variants carry the message shown to the caller.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidCredential(String),

    /// Store validation messages joined with `" | "`.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("User is banned.")]
    AccountDisabled,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The account exists but some follow-up steps failed.
    #[error("account '{username}' was created but {} failed", failures.join(", "))]
    Incomplete {
        username: String,
        failures: Vec<String>,
    },

    #[error("notification failed: {0}")]
    Notification(#[from] EmailError),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AccountError {
    pub(crate) fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_owned())
    }

    pub(crate) fn invalid_credential(message: &str) -> Self {
        Self::InvalidCredential(message.to_owned())
    }
}

impl From<CreateAccountError> for AccountError {
    fn from(error: CreateAccountError) -> Self {
        match error {
            CreateAccountError::Validation(messages) => Self::ValidationFailed(messages.join(" | ")),
            CreateAccountError::Repository(e) => Self::Repository(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_joined() {
        let error = AccountError::from(CreateAccountError::Validation(vec![
            "Username 'p1' is already taken.".to_owned(),
            "Passwords must have at least one digit ('0'-'9').".to_owned(),
        ]));
        assert_eq!(
            error.to_string(),
            "Username 'p1' is already taken. | Passwords must have at least one digit ('0'-'9')."
        );
    }

    #[test]
    fn test_incomplete_names_failed_steps() {
        let error = AccountError::Incomplete {
            username: "pharm1".to_owned(),
            failures: vec!["role assignment".to_owned(), "cart creation".to_owned()],
        };
        assert_eq!(
            error.to_string(),
            "account 'pharm1' was created but role assignment, cart creation failed"
        );
    }
}
