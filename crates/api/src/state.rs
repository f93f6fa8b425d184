//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::accounts::Notifier;
use crate::services::artifacts::FsArtifactStore;
use crate::services::tokens::TokenIssuer;

/// Application state shared across all handlers.
///
/// Repositories borrow the pool per request; everything else is built once.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenIssuer,
    notifier: Arc<dyn Notifier>,
    artifacts: FsArtifactStore,
    login_url: String,
}

impl AppState {
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        let tokens = TokenIssuer::new(
            &config.jwt.secret,
            config.jwt.issuer.clone(),
            chrono::Duration::minutes(config.jwt.ttl_minutes),
        );
        let artifacts = FsArtifactStore::new(config.artifact_root.clone());
        let login_url = config.login_url();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                notifier,
                artifacts,
                login_url,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn Notifier {
        self.inner.notifier.as_ref()
    }

    #[must_use]
    pub fn artifacts(&self) -> &FsArtifactStore {
        &self.inner.artifacts
    }

    /// Sign-in link included in account emails.
    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.inner.login_url
    }
}
