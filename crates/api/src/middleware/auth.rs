//! Authentication extractors.
//!
//! Administrators authenticate with either a bearer token from `/login` or
//! the session cookie set by the same call.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tower_sessions::Session;

use pharma_link_core::authorize_provisioning;

use crate::db::AccountRepository;
use crate::error::AppError;
use crate::models::{CurrentAccount, session_keys};
use crate::services::accounts::{Authenticator, CredentialStore};
use crate::state::AppState;

/// Extractor that requires an authenticated, active administrator.
///
/// Rejects with 401 when no valid credentials are presented or the account
/// has been deactivated, and 403 for any other role.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdmin(admin): RequireAdmin,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.username)
/// }
/// ```
pub struct RequireAdmin(pub CurrentAccount);

/// Token from an `Authorization: Bearer ...` header, if present.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = AccountRepository::new(state.pool(), &state.config().password_policy);

        let account = if let Some(token) = bearer_token(parts) {
            Authenticator::new(&credentials, state.tokens())
                .verify_token(token)
                .map_err(|e| {
                    tracing::debug!(error = %e, "Bearer token rejected");
                    unauthorized()
                })?
        } else {
            let session = parts
                .extensions
                .get::<Session>()
                .ok_or_else(unauthorized)?;
            session
                .get::<CurrentAccount>(session_keys::CURRENT_ACCOUNT)
                .await
                .ok()
                .flatten()
                .ok_or_else(unauthorized)?
        };

        if authorize_provisioning(account.role).is_err() {
            tracing::info!(account_id = %account.id, role = %account.role, "Non-admin caller refused");
            return Err(AppError::Forbidden(
                "Only administrators can manage accounts".to_owned(),
            ));
        }

        // Tokens outlive deactivation, so confirm the account is still active.
        let stored = credentials.find_by_username(&account.username).await?;
        if !stored.is_some_and(|a| a.id == account.id && a.active) {
            return Err(unauthorized());
        }

        set_sentry_user(&account);
        Ok(Self(account))
    }
}

fn unauthorized() -> AppError {
    AppError::Unauthorized("Not signed in".to_owned())
}

/// Attach the caller to Sentry events raised while handling this request.
fn set_sentry_user(account: &CurrentAccount) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account.id.to_string()),
            username: Some(account.username.clone()),
            ..Default::default()
        }));
    });
}
