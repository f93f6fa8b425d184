//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (database ping)
//!
//! # Accounts
//! POST   /api/account/register/{id}       - Approve a pending pharmacy request (admin)
//! POST   /api/account/company-register    - Create a company account (admin)
//! POST   /api/account/login               - Sign in, returns a bearer token
//! GET    /api/account/logout              - Sign out
//! DELETE /api/account/delete-user         - Deactivate an account (admin)
//! ```

pub mod accounts;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// Build the complete router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(accounts::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::Duration;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use pharma_link_core::{AccountId, Email, Role};

    use super::*;
    use crate::config::{ApiConfig, EmailConfig, JwtConfig};
    use crate::models::CurrentAccount;
    use crate::services::accounts::memory::RecordingNotifier;
    use crate::services::credentials::PasswordPolicy;
    use crate::services::tokens::TokenIssuer;

    const SECRET: &str = "k7Qm2xVr9LpT4sWz8NcB3hYf6JdG1aEu";

    fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/pharma_link_test"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            base_url: "http://localhost:5000".to_owned(),
            jwt: JwtConfig {
                secret: SecretString::from(SECRET),
                issuer: "pharma-link".to_owned(),
                ttl_minutes: 60,
            },
            email: EmailConfig {
                smtp_host: "localhost".to_owned(),
                smtp_port: 587,
                smtp_username: "mailer".to_owned(),
                smtp_password: SecretString::from("unused"),
                from_address: "noreply@pharmalink.test".to_owned(),
            },
            artifact_root: PathBuf::from("./uploads"),
            reserved_admin: "admin".to_owned(),
            password_policy: PasswordPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    /// Router over a pool that never connects; only paths that stop before
    /// the database are exercised.
    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/pharma_link_test")
            .unwrap();
        let state = AppState::new(test_config(), pool, Arc::new(RecordingNotifier::default()));
        router().with_state(state)
    }

    fn bearer_for(role: Role) -> String {
        let issued = TokenIssuer::new(
            &SecretString::from(SECRET),
            "pharma-link",
            Duration::minutes(5),
        )
        .issue(&CurrentAccount {
            id: AccountId::new(7),
            username: "someone".to_owned(),
            email: Email::parse("someone@pharmalink.test").unwrap(),
            role,
        })
        .unwrap();
        format!("Bearer {}", issued.token)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_require_credentials() {
        let response = app()
            .oneshot(
                Request::delete("/api/account/delete-user?userName=pharm1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app()
            .oneshot(
                Request::post("/api/account/register/1")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_refuse_other_roles() {
        for role in [Role::Pharmacy, Role::Company] {
            let response = app()
                .oneshot(
                    Request::delete("/api/account/delete-user?userName=pharm1")
                        .header(header::AUTHORIZATION, bearer_for(role))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }
}
