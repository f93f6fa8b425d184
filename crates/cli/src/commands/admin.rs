//! Administrator account management.
//!
//! # Usage
//!
//! ```bash
//! PHARMALINK_ADMIN_PASSWORD='...' pharma-link-cli admin create -u admin -e admin@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `PHARMALINK_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `PHARMALINK_ADMIN_PASSWORD` - Password for the new administrator
//! - `PHARMALINK_PASSWORD_MIN_LENGTH` - Minimum password length (default 6)

use secrecy::SecretString;
use thiserror::Error;

use pharma_link_api::db::{AccountRepository, RepositoryError, create_pool};
use pharma_link_api::models::NewAccount;
use pharma_link_api::services::PasswordPolicy;
use pharma_link_api::services::accounts::{CreateAccountError, CredentialStore};
use pharma_link_core::{AccountId, Role};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Environment variable could not be parsed.
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The account was refused (taken username or email, weak password).
    #[error("{0}")]
    Rejected(#[from] CreateAccountError),
}

/// Create an administrator account.
///
/// The password is read from `PHARMALINK_ADMIN_PASSWORD` so it never appears
/// in shell history.
///
/// # Returns
///
/// The ID of the created account.
///
/// # Errors
///
/// Returns `AdminError` if configuration is missing, the account is refused,
/// or the database fails.
pub async fn create_user(
    username: &str,
    email: &str,
    name: &str,
) -> Result<AccountId, AdminError> {
    dotenvy::dotenv().ok();

    let password = std::env::var("PHARMALINK_ADMIN_PASSWORD")
        .map(SecretString::from)
        .map_err(|_| AdminError::MissingEnvVar("PHARMALINK_ADMIN_PASSWORD"))?;
    let policy = password_policy()?;

    let database_url = super::database_url()
        .ok_or(AdminError::MissingEnvVar("PHARMALINK_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;
    let accounts = AccountRepository::new(&pool, &policy);

    tracing::info!("Creating administrator: {} ({})", username, email);

    let account = accounts
        .create(
            NewAccount {
                username: username.to_owned(),
                email: email.to_owned(),
                phone: None,
                role: Role::Admin,
                name: name.to_owned(),
                street: None,
                city: None,
                state: None,
                license_number: None,
                contact_name: None,
                min_order_value: None,
                email_confirmed: true,
            },
            &password,
        )
        .await?;
    accounts.assign_role(account.id, Role::Admin).await?;

    tracing::info!(
        "Administrator created successfully! ID: {}, Username: {}",
        account.id,
        account.username
    );

    Ok(account.id)
}

fn password_policy() -> Result<PasswordPolicy, AdminError> {
    let min_length = match std::env::var("PHARMALINK_PASSWORD_MIN_LENGTH") {
        Ok(value) => value
            .parse()
            .map_err(|_| AdminError::InvalidEnvVar("PHARMALINK_PASSWORD_MIN_LENGTH", value))?,
        Err(_) => PasswordPolicy::default().min_length,
    };
    Ok(PasswordPolicy {
        min_length,
        ..PasswordPolicy::default()
    })
}
