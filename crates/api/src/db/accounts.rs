//! Account repository: credentials, profile fields and role grants.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate builds
//! without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tracing::instrument;

use pharma_link_core::{AccountId, Email, Role};

use super::RepositoryError;
use crate::models::{Account, NewAccount};
use crate::services::accounts::{CreateAccountError, CredentialStore};
use crate::services::credentials::{self, PasswordPolicy, Uniqueness};

const EMAIL_INDEX: &str = "account_email_key";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` account queries.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i32,
    username: String,
    email: String,
    phone: Option<String>,
    role: Role,
    name: String,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    license_number: Option<String>,
    contact_name: Option<String>,
    min_order_value: Option<Decimal>,
    email_confirmed: bool,
    active: bool,
    document_path: Option<String>,
    image_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: AccountId::new(row.id),
            username: row.username,
            email,
            phone: row.phone,
            role: row.role,
            name: row.name,
            street: row.street,
            city: row.city,
            state: row.state,
            license_number: row.license_number,
            contact_name: row.contact_name,
            min_order_value: row.min_order_value,
            email_confirmed: row.email_confirmed,
            active: row.active,
            document_path: row.document_path,
            image_path: row.image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for account database operations.
pub struct AccountRepository<'a> {
    pool: &'a PgPool,
    policy: &'a PasswordPolicy,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository enforcing `policy` on new passwords.
    #[must_use]
    pub const fn new(pool: &'a PgPool, policy: &'a PasswordPolicy) -> Self {
        Self { pool, policy }
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pharma.account WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pharma.account WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl CredentialStore for AccountRepository<'_> {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, email, phone, role, name, street, city, state,
                   license_number, contact_name, min_order_value, email_confirmed,
                   active, document_path, image_path, created_at, updated_at
            FROM pharma.account
            WHERE LOWER(username) = LOWER($1)
            ",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, email, phone, role, name, street, city, state,
                   license_number, contact_name, min_order_value, email_confirmed,
                   active, document_path, image_path, created_at, updated_at
            FROM pharma.account
            WHERE LOWER(email) = LOWER($1)
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, account, password), fields(username = %account.username))]
    async fn create(
        &self,
        account: NewAccount,
        password: &SecretString,
    ) -> Result<Account, CreateAccountError> {
        let uniqueness = Uniqueness {
            username_taken: self.username_exists(&account.username).await?,
            email_taken: self.email_exists(&account.email).await?,
        };
        let messages = credentials::validate_new_account(
            &account,
            password.expose_secret(),
            uniqueness,
            self.policy,
        );
        if !messages.is_empty() {
            return Err(CreateAccountError::Validation(messages));
        }

        let password_hash = credentials::hash_password(password.expose_secret())
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        let result = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO pharma.account (
                username, email, phone, role, name, street, city, state,
                license_number, contact_name, min_order_value, email_confirmed,
                password_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, username, email, phone, role, name, street, city, state,
                      license_number, contact_name, min_order_value, email_confirmed,
                      active, document_path, image_path, created_at, updated_at
            ",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(account.role)
        .bind(&account.name)
        .bind(&account.street)
        .bind(&account.city)
        .bind(&account.state)
        .bind(&account.license_number)
        .bind(&account.contact_name)
        .bind(account.min_order_value)
        .bind(account.email_confirmed)
        .bind(&password_hash)
        .fetch_one(self.pool)
        .await;

        // A concurrent insert can still win the race past the EXISTS checks.
        match result {
            Ok(row) => Ok(row.try_into()?),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let message = match db_err.constraint() {
                    Some(EMAIL_INDEX) => credentials::email_taken(&account.email),
                    _ => credentials::username_taken(&account.username),
                };
                Err(CreateAccountError::Validation(vec![message]))
            }
            Err(e) => Err(RepositoryError::Database(e).into()),
        }
    }

    async fn assign_role(&self, account_id: AccountId, role: Role) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO pharma.account_role (account_id, role)
            VALUES ($1, $2)
            ON CONFLICT (account_id, role) DO NOTHING
            ",
        )
        .bind(account_id.as_i32())
        .bind(role)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    async fn check_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<bool, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM pharma.account WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(hash.map_or_else(
            || credentials::verify_unknown_user(password.expose_secret()),
            |hash| credentials::verify_password(password.expose_secret(), &hash),
        ))
    }

    async fn deactivate(&self, account_id: AccountId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE pharma.account
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND active
            ",
        )
        .bind(account_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
