//! Account lifecycle route handlers.
//!
//! Thin wrappers: each handler builds the `PostgreSQL` repositories for the
//! request and delegates to a lifecycle service.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use pharma_link_core::PendingRequestId;

use crate::{
    db::{AccountRepository, CartRepository, PendingRequestRepository, ReviewRepository},
    error::AppError,
    middleware::RequireAdmin,
    models::{CompanyRegistration, ProvisionedAccount},
    services::accounts::{
        AccountDeactivator, AccountProvisioner, Authenticator, DeactivationReport, LoginRequest,
    },
    services::tokens::IssuedToken,
    state::AppState,
};

/// Build the account router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/account/register/{id}", post(register_pharmacy))
        .route("/api/account/company-register", post(register_company))
        .route("/api/account/login", post(login))
        .route("/api/account/logout", get(logout))
        .route("/api/account/delete-user", delete(delete_user))
}

/// Query string for `delete-user`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserQuery {
    #[serde(default)]
    pub user_name: String,
}

/// Approve a pending pharmacy request.
///
/// POST /api/account/register/{id}
///
/// # Errors
///
/// Returns the classified lifecycle error.
#[instrument(skip(admin, state), fields(admin = %admin.username))]
pub async fn register_pharmacy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PendingRequestId>,
) -> Result<(StatusCode, Json<ProvisionedAccount>), AppError> {
    let credentials = AccountRepository::new(state.pool(), &state.config().password_policy);
    let requests = PendingRequestRepository::new(state.pool());
    let carts = CartRepository::new(state.pool());

    let provisioned = AccountProvisioner::new(
        &credentials,
        &requests,
        &carts,
        state.notifier(),
        state.login_url(),
    )
    .from_pending_request(id)
    .await?;

    Ok((StatusCode::CREATED, Json(provisioned)))
}

/// Create a company account directly.
///
/// POST /api/account/company-register
///
/// # Errors
///
/// Returns the classified lifecycle error.
#[instrument(skip(admin, state, payload), fields(admin = %admin.username))]
pub async fn register_company(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(payload): Json<CompanyRegistration>,
) -> Result<(StatusCode, Json<ProvisionedAccount>), AppError> {
    let credentials = AccountRepository::new(state.pool(), &state.config().password_policy);
    let requests = PendingRequestRepository::new(state.pool());
    let carts = CartRepository::new(state.pool());

    let provisioned = AccountProvisioner::new(
        &credentials,
        &requests,
        &carts,
        state.notifier(),
        state.login_url(),
    )
    .from_company_payload(payload)
    .await?;

    Ok((StatusCode::CREATED, Json(provisioned)))
}

/// Sign in and receive a bearer token. Also sets the session cookie.
///
/// POST /api/account/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, AppError> {
    let credentials = AccountRepository::new(state.pool(), &state.config().password_policy);
    let token = Authenticator::new(&credentials, state.tokens())
        .login(&request, &session)
        .await?;
    Ok(Json(token))
}

/// End the session. Succeeds whether or not one existed.
///
/// GET /api/account/logout
async fn logout(State(state): State<AppState>, session: Session) -> StatusCode {
    let credentials = AccountRepository::new(state.pool(), &state.config().password_policy);
    Authenticator::new(&credentials, state.tokens())
        .logout(&session)
        .await;
    StatusCode::NO_CONTENT
}

/// Deactivate an account by username.
///
/// DELETE /api/account/delete-user?userName=...
///
/// # Errors
///
/// Returns the classified lifecycle error.
#[instrument(skip(admin, state), fields(admin = %admin.username))]
pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<DeleteUserQuery>,
) -> Result<Json<DeactivationReport>, AppError> {
    let credentials = AccountRepository::new(state.pool(), &state.config().password_policy);
    let reviews = ReviewRepository::new(state.pool());

    let report = AccountDeactivator::new(
        &credentials,
        &reviews,
        state.artifacts(),
        &state.config().reserved_admin,
    )
    .deactivate(&query.user_name)
    .await?;

    Ok(Json(report))
}
