//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. Sessions last
//! until the browser closes unless the caller asked to be remembered.

use async_trait::async_trait;
use sqlx::PgPool;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ApiConfig;
use crate::models::{CurrentAccount, session_keys};
use crate::services::accounts::{SessionChannel, SessionError};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "pharma_link_session";

/// Inactivity window for remembered sessions (30 days).
const REMEMBER_ME_DAYS: i64 = 30;

/// Create the session layer with `PostgreSQL` store.
///
/// The session table lives in the `pharma` schema and is created by migration.
///
/// # Errors
///
/// Returns `SessionError` if the store rejects the schema or table name.
pub fn create_session_layer(
    pool: &PgPool,
    config: &ApiConfig,
) -> Result<SessionManagerLayer<PostgresStore>, SessionError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("pharma")
        .map_err(SessionError)?
        .with_table_name("session")
        .map_err(SessionError)?;

    // Determine if we're in production (HTTPS)
    let is_secure = config.base_url.starts_with("https://");

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnSessionEnd)
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/"))
}

fn session_error(error: tower_sessions::session::Error) -> SessionError {
    SessionError(error.to_string())
}

#[async_trait]
impl SessionChannel for Session {
    async fn establish(
        &self,
        account: &CurrentAccount,
        remember_me: bool,
    ) -> Result<(), SessionError> {
        // Fresh id on sign-in so a planted cookie never becomes authenticated.
        self.cycle_id().await.map_err(session_error)?;
        self.set_expiry(Some(if remember_me {
            Expiry::OnInactivity(Duration::days(REMEMBER_ME_DAYS))
        } else {
            Expiry::OnSessionEnd
        }));
        self.insert(session_keys::CURRENT_ACCOUNT, account)
            .await
            .map_err(session_error)
    }

    async fn end(&self) -> Result<(), SessionError> {
        self.flush().await.map_err(session_error)
    }
}
