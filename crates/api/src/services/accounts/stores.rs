//! Capabilities the account lifecycle operations depend on.
//!
//! Each trait is implemented once against `PostgreSQL` (see [`crate::db`]),
//! once against process resources (filesystem, SMTP, HTTP session), and once
//! in memory for tests (see [`super::memory`]).

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use pharma_link_core::{AccountId, PendingRequestId, ReviewId, Role};

use crate::db::RepositoryError;
use crate::models::{Account, Cart, CurrentAccount, NewAccount, PendingRequest, Review};
use crate::services::artifacts::ArtifactError;
use crate::services::email::{EmailError, Notification};

/// Account creation was refused or failed.
#[derive(Debug, Error)]
pub enum CreateAccountError {
    /// One message per violated rule.
    #[error("{}", .0.join(" | "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Establishing or ending an authenticated session failed.
#[derive(Debug, Error)]
#[error("session error: {0}")]
pub struct SessionError(pub String);

/// Accounts, their credentials and their role grants.
///
/// Username and email lookups are case-insensitive.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;

    /// Validate and persist a new account with a hashed password.
    ///
    /// Duplicate usernames and emails are reported as validation messages.
    async fn create(
        &self,
        account: NewAccount,
        password: &SecretString,
    ) -> Result<Account, CreateAccountError>;

    /// Grant a role. Granting an already held role is a no-op.
    async fn assign_role(&self, account_id: AccountId, role: Role) -> Result<(), RepositoryError>;

    /// Returns false for unknown usernames as well as wrong passwords.
    async fn check_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<bool, RepositoryError>;

    /// Clear the active flag. Returns false if the account was already inactive.
    async fn deactivate(&self, account_id: AccountId) -> Result<bool, RepositoryError>;
}

/// The authenticated session of the current request.
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Bind `account` to the session. `remember_me` makes it outlive the browser session.
    async fn establish(
        &self,
        account: &CurrentAccount,
        remember_me: bool,
    ) -> Result<(), SessionError>;

    /// Drop the session. Ending an absent session succeeds.
    async fn end(&self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait PendingRequestStore: Send + Sync {
    async fn get_by_id(
        &self,
        id: PendingRequestId,
    ) -> Result<Option<PendingRequest>, RepositoryError>;

    /// Returns false if the request was already gone.
    async fn delete(&self, id: PendingRequestId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn create(&self, owner: AccountId, total_price: Decimal) -> Result<Cart, RepositoryError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Reviews written about `account`.
    async fn find_by_subject(&self, account: AccountId) -> Result<Vec<Review>, RepositoryError>;

    /// Reviews written by `account`.
    async fn find_by_author(&self, account: AccountId) -> Result<Vec<Review>, RepositoryError>;

    /// Returns false if the review was already gone.
    async fn delete(&self, id: ReviewId) -> Result<bool, RepositoryError>;
}

/// Outbound account notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Queue a notification. Delivery failures are logged, never returned.
    fn send_detached(&self, notification: Notification);

    /// Deliver a notification and wait for the outcome.
    async fn send(&self, notification: Notification) -> Result<(), EmailError>;
}

/// Uploaded files owned by accounts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Delete the artifact at `path`. Returns false if nothing was there.
    async fn delete_if_exists(&self, path: &str) -> Result<bool, ArtifactError>;
}
