//! Integration tests for Pharma Link accounts.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pharma-link-integration-tests
//! ```
//!
//! The scenarios run whole account lifecycles (provision, log in, deactivate)
//! against the in-memory stores, so no database or SMTP server is needed.

use chrono::Duration;
use secrecy::SecretString;

use pharma_link_api::models::{CompanyRegistration, PendingRequest};
use pharma_link_api::services::TokenIssuer;
use pharma_link_api::services::accounts::memory::{
    MemoryArtifactStore, MemoryCartStore, MemoryCredentialStore, MemoryPendingRequestStore,
    MemoryReviewStore, RecordingNotifier,
};
use pharma_link_api::services::accounts::{
    AccountDeactivator, AccountProvisioner, Authenticator, LoginRequest, Notifier,
};
use pharma_link_core::PendingRequestId;

/// Sign-in link placed in account emails.
pub const LOGIN_URL: &str = "https://pharmalink.test/login";

/// Username that can never be deactivated.
pub const RESERVED_ADMIN: &str = "admin";

const TOKEN_SECRET: &str = "k7Qm2xVr9LpT4sWz8NcB3hYf6JdG1aEu";

/// One set of in-memory stores shared by every service under test.
pub struct Harness<N: Notifier = RecordingNotifier> {
    pub credentials: MemoryCredentialStore,
    pub requests: MemoryPendingRequestStore,
    pub carts: MemoryCartStore,
    pub reviews: MemoryReviewStore,
    pub artifacts: MemoryArtifactStore,
    pub notifier: N,
    pub tokens: TokenIssuer,
}

impl Default for Harness<RecordingNotifier> {
    fn default() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }
}

impl<N: Notifier> Harness<N> {
    /// Fresh stores around the given notifier.
    pub fn with_notifier(notifier: N) -> Self {
        Self {
            credentials: MemoryCredentialStore::default(),
            requests: MemoryPendingRequestStore::default(),
            carts: MemoryCartStore::default(),
            reviews: MemoryReviewStore::default(),
            artifacts: MemoryArtifactStore::default(),
            notifier,
            tokens: TokenIssuer::new(
                &SecretString::from(TOKEN_SECRET),
                "pharma-link",
                Duration::minutes(60),
            ),
        }
    }

    pub fn provisioner(&self) -> AccountProvisioner<'_> {
        AccountProvisioner::new(
            &self.credentials,
            &self.requests,
            &self.carts,
            &self.notifier,
            LOGIN_URL,
        )
    }

    pub fn authenticator(&self) -> Authenticator<'_> {
        Authenticator::new(&self.credentials, &self.tokens)
    }

    pub fn deactivator(&self) -> AccountDeactivator<'_> {
        AccountDeactivator::new(
            &self.credentials,
            &self.reviews,
            &self.artifacts,
            RESERVED_ADMIN,
        )
    }

    /// Store a pending pharmacy request and return its id.
    pub fn submit_request(
        &self,
        id: i32,
        username: &str,
        email: &str,
        password: Option<&str>,
    ) -> PendingRequestId {
        let id = PendingRequestId::new(id);
        self.requests.insert(PendingRequest {
            id,
            username: username.to_owned(),
            email: email.to_owned(),
            phone: Some("+20 100 000 0000".to_owned()),
            password: password.map(|p| SecretString::from(p.to_owned())),
            license_number: Some("PH-2291".to_owned()),
            pharmacy_name: format!("{username} pharmacy"),
            street: Some("12 Tahrir St".to_owned()),
            city: Some("Cairo".to_owned()),
            state: Some("Cairo".to_owned()),
            contact_name: Some("Dr. Salma Adel".to_owned()),
        });
        id
    }
}

/// Company registration payload with sensible defaults.
#[must_use]
pub fn company(username: &str, email: &str, password: &str) -> CompanyRegistration {
    CompanyRegistration {
        user_name: username.to_owned(),
        email: email.to_owned(),
        phone_number: Some("+20 2 2345 6789".to_owned()),
        license_number: Some("CO-7781".to_owned()),
        street: Some("5 Industrial Zone".to_owned()),
        city: Some("Giza".to_owned()),
        state: Some("Giza".to_owned()),
        name: format!("{username} Pharmaceuticals"),
        password: Some(password.to_owned()),
        min_order_value: None,
    }
}

/// Login form for `user_name` / `password`.
#[must_use]
pub fn login(user_name: &str, password: &str) -> LoginRequest {
    LoginRequest {
        user_name: user_name.to_owned(),
        password: SecretString::from(password.to_owned()),
        remember_me: false,
    }
}
