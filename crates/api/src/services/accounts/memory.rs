//! In-memory capability implementations for tests.
//!
//! Each store can be told to fail so degraded paths can be exercised. Passwords
//! are kept in plain text here; only the `PostgreSQL` store hashes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};

use pharma_link_core::{AccountId, CartId, Email, PendingRequestId, ReviewId, Role};

use super::stores::{
    ArtifactStore, CartStore, CreateAccountError, CredentialStore, Notifier, PendingRequestStore,
    ReviewStore, SessionChannel, SessionError,
};
use crate::db::RepositoryError;
use crate::models::{Account, Cart, CurrentAccount, NewAccount, PendingRequest, Review};
use crate::services::artifacts::ArtifactError;
use crate::services::credentials::{self, PasswordPolicy, Uniqueness};
use crate::services::email::{EmailError, Mailer, Notification};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(what: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("injected {what} failure"))
}

// =============================================================================
// Credentials
// =============================================================================

#[derive(Default)]
struct CredentialState {
    accounts: Vec<(Account, String)>,
    roles: BTreeSet<(AccountId, Role)>,
    next_id: i32,
}

/// Credential store backed by a single mutex, so check-and-insert is atomic.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<CredentialState>,
    policy: PasswordPolicy,
    fail_role_assignment: AtomicBool,
    fail_deactivate: AtomicBool,
    yield_after_lookup: AtomicBool,
    password_checks: AtomicUsize,
}

impl MemoryCredentialStore {
    /// Make every `assign_role` call fail.
    pub fn fail_role_assignment(&self) {
        self.fail_role_assignment.store(true, Ordering::SeqCst);
    }

    /// Make every `deactivate` call fail.
    pub fn fail_deactivate(&self) {
        self.fail_deactivate.store(true, Ordering::SeqCst);
    }

    /// Yield to the scheduler after every `find_by_username`, so concurrent
    /// callers can act on the same snapshot before either writes.
    pub fn yield_after_lookup(&self) {
        self.yield_after_lookup.store(true, Ordering::SeqCst);
    }

    /// Insert an account directly, skipping validation. Grants its role.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address.
    #[allow(clippy::expect_used)]
    pub fn seed(&self, role: Role, username: &str, email: &str, password: &str) -> Account {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(state.next_id),
            username: username.to_owned(),
            email: Email::parse(email).expect("seeded email must be valid"),
            phone: None,
            role,
            name: username.to_owned(),
            street: None,
            city: None,
            state: None,
            license_number: None,
            contact_name: None,
            min_order_value: None,
            email_confirmed: true,
            active: true,
            document_path: None,
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert((account.id, role));
        state.accounts.push((account.clone(), password.to_owned()));
        account
    }

    /// Attach document and image paths to an account.
    pub fn set_artifacts(&self, username: &str, document: Option<&str>, image: Option<&str>) {
        let mut state = lock(&self.state);
        if let Some((account, _)) = state
            .accounts
            .iter_mut()
            .find(|(a, _)| a.username.eq_ignore_ascii_case(username))
        {
            account.document_path = document.map(str::to_owned);
            account.image_path = image.map(str::to_owned);
        }
    }

    #[must_use]
    pub fn account(&self, username: &str) -> Option<Account> {
        lock(&self.state)
            .accounts
            .iter()
            .find(|(a, _)| a.username.eq_ignore_ascii_case(username))
            .map(|(a, _)| a.clone())
    }

    #[must_use]
    pub fn roles_of(&self, account_id: AccountId) -> Vec<Role> {
        lock(&self.state)
            .roles
            .iter()
            .filter(|(id, _)| *id == account_id)
            .map(|(_, role)| *role)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `check_password` calls, including unknown usernames.
    #[must_use]
    pub fn password_checks(&self) -> usize {
        self.password_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        let account = self.account(username);
        if self.yield_after_lookup.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(lock(&self.state)
            .accounts
            .iter()
            .find(|(a, _)| a.email.matches(email))
            .map(|(a, _)| a.clone()))
    }

    async fn create(
        &self,
        account: NewAccount,
        password: &SecretString,
    ) -> Result<Account, CreateAccountError> {
        let mut state = lock(&self.state);
        let uniqueness = Uniqueness {
            username_taken: state
                .accounts
                .iter()
                .any(|(a, _)| a.username.eq_ignore_ascii_case(&account.username)),
            email_taken: state
                .accounts
                .iter()
                .any(|(a, _)| a.email.matches(&account.email)),
        };
        let messages = credentials::validate_new_account(
            &account,
            password.expose_secret(),
            uniqueness,
            &self.policy,
        );
        if !messages.is_empty() {
            return Err(CreateAccountError::Validation(messages));
        }

        let email = Email::parse(&account.email)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        state.next_id += 1;
        let now = Utc::now();
        let created = Account {
            id: AccountId::new(state.next_id),
            username: account.username,
            email,
            phone: account.phone,
            role: account.role,
            name: account.name,
            street: account.street,
            city: account.city,
            state: account.state,
            license_number: account.license_number,
            contact_name: account.contact_name,
            min_order_value: account.min_order_value,
            email_confirmed: account.email_confirmed,
            active: true,
            document_path: None,
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        state
            .accounts
            .push((created.clone(), password.expose_secret().to_owned()));
        Ok(created)
    }

    async fn assign_role(&self, account_id: AccountId, role: Role) -> Result<(), RepositoryError> {
        if self.fail_role_assignment.load(Ordering::SeqCst) {
            return Err(injected("role assignment"));
        }
        lock(&self.state).roles.insert((account_id, role));
        Ok(())
    }

    async fn check_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<bool, RepositoryError> {
        self.password_checks.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.state)
            .accounts
            .iter()
            .find(|(a, _)| a.username.eq_ignore_ascii_case(username))
            .is_some_and(|(_, stored)| stored == password.expose_secret()))
    }

    async fn deactivate(&self, account_id: AccountId) -> Result<bool, RepositoryError> {
        if self.fail_deactivate.load(Ordering::SeqCst) {
            return Err(injected("deactivate"));
        }
        let mut state = lock(&self.state);
        let Some((account, _)) = state.accounts.iter_mut().find(|(a, _)| a.id == account_id) else {
            return Err(RepositoryError::NotFound);
        };
        if !account.active {
            return Ok(false);
        }
        account.active = false;
        account.updated_at = Utc::now();
        Ok(true)
    }
}

// =============================================================================
// Pending requests, carts, reviews
// =============================================================================

#[derive(Default)]
pub struct MemoryPendingRequestStore {
    requests: Mutex<BTreeMap<PendingRequestId, PendingRequest>>,
    fail_delete: AtomicBool,
}

impl MemoryPendingRequestStore {
    pub fn insert(&self, request: PendingRequest) {
        lock(&self.requests).insert(request.id, request);
    }

    /// Make every `delete` call fail.
    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn contains(&self, id: PendingRequestId) -> bool {
        lock(&self.requests).contains_key(&id)
    }
}

#[async_trait]
impl PendingRequestStore for MemoryPendingRequestStore {
    async fn get_by_id(
        &self,
        id: PendingRequestId,
    ) -> Result<Option<PendingRequest>, RepositoryError> {
        Ok(lock(&self.requests).get(&id).cloned())
    }

    async fn delete(&self, id: PendingRequestId) -> Result<bool, RepositoryError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("request delete"));
        }
        Ok(lock(&self.requests).remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryCartStore {
    carts: Mutex<Vec<Cart>>,
    fail_create: AtomicBool,
}

impl MemoryCartStore {
    /// Make every `create` call fail.
    pub fn fail_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn carts(&self) -> Vec<Cart> {
        lock(&self.carts).clone()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn create(&self, owner: AccountId, total_price: Decimal) -> Result<Cart, RepositoryError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected("cart creation"));
        }
        let mut carts = lock(&self.carts);
        if carts.iter().any(|c| c.owner_id == owner) {
            return Err(RepositoryError::Conflict(
                "account already has a cart".to_owned(),
            ));
        }
        let cart = Cart {
            id: CartId::new(i32::try_from(carts.len()).unwrap_or(i32::MAX) + 1),
            owner_id: owner,
            total_price,
        };
        carts.push(cart.clone());
        Ok(cart)
    }
}

#[derive(Default)]
struct ReviewState {
    reviews: Vec<Review>,
    next_id: i32,
}

#[derive(Default)]
pub struct MemoryReviewStore {
    state: Mutex<ReviewState>,
    fail_lookup: AtomicBool,
}

impl MemoryReviewStore {
    /// Record a review written by `author` about `subject`.
    pub fn add(&self, author: AccountId, subject: AccountId) -> ReviewId {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = ReviewId::new(state.next_id);
        state.reviews.push(Review {
            id,
            author_id: author,
            subject_id: subject,
            rating: 5,
            comment: None,
            created_at: Utc::now(),
        });
        id
    }

    /// Make every lookup fail.
    pub fn fail_lookups(&self) {
        self.fail_lookup.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn all(&self) -> Vec<Review> {
        lock(&self.state).reviews.clone()
    }

    fn matching(
        &self,
        predicate: impl Fn(&Review) -> bool,
    ) -> Result<Vec<Review>, RepositoryError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(injected("review lookup"));
        }
        Ok(lock(&self.state)
            .reviews
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn find_by_subject(&self, account: AccountId) -> Result<Vec<Review>, RepositoryError> {
        self.matching(|r| r.subject_id == account)
    }

    async fn find_by_author(&self, account: AccountId) -> Result<Vec<Review>, RepositoryError> {
        self.matching(|r| r.author_id == account)
    }

    async fn delete(&self, id: ReviewId) -> Result<bool, RepositoryError> {
        let mut state = lock(&self.state);
        let before = state.reviews.len();
        state.reviews.retain(|r| r.id != id);
        Ok(state.reviews.len() < before)
    }
}

// =============================================================================
// Artifacts, notifications, sessions
// =============================================================================

#[derive(Default)]
pub struct MemoryArtifactStore {
    files: Mutex<BTreeSet<String>>,
    failing: Mutex<BTreeSet<String>>,
}

impl MemoryArtifactStore {
    pub fn add(&self, path: &str) {
        lock(&self.files).insert(path.to_owned());
    }

    /// Make deleting `path` fail with an I/O error.
    pub fn fail_on(&self, path: &str) {
        lock(&self.failing).insert(path.to_owned());
    }

    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        lock(&self.files).contains(path)
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn delete_if_exists(&self, path: &str) -> Result<bool, ArtifactError> {
        if path.split(['/', '\\']).any(|part| part == "..") {
            return Err(ArtifactError::OutsideRoot(path.to_owned()));
        }
        if lock(&self.failing).contains(path) {
            return Err(ArtifactError::Io {
                path: path.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(lock(&self.files).remove(path))
    }
}

/// Notifier that records instead of sending.
#[derive(Default)]
pub struct RecordingNotifier {
    detached: Mutex<Vec<Notification>>,
    sent: Mutex<Vec<Notification>>,
    fail_send: AtomicBool,
}

impl RecordingNotifier {
    /// A notifier whose awaited `send` always fails.
    #[must_use]
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail_send.store(true, Ordering::SeqCst);
        notifier
    }

    #[must_use]
    pub fn detached(&self) -> Vec<Notification> {
        lock(&self.detached).clone()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn send_detached(&self, notification: Notification) {
        lock(&self.detached).push(notification);
    }

    async fn send(&self, notification: Notification) -> Result<(), EmailError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(EmailError::Unavailable("injected send failure".to_owned()));
        }
        lock(&self.sent).push(notification);
        Ok(())
    }
}

/// Mailer that records deliveries, or fails every one of them.
#[derive(Default)]
pub struct RecordingMailer {
    delivered: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingMailer {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        lock(&self.delivered).clone()
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(&self, notification: &Notification) -> Result<(), EmailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmailError::Unavailable("smtp relay down".to_owned()));
        }
        lock(&self.delivered).push(notification.clone());
        Ok(())
    }
}

/// Session that remembers who was bound to it.
#[derive(Default)]
pub struct MemorySession {
    current: Mutex<Option<(CurrentAccount, bool)>>,
    ends: AtomicUsize,
    fail: AtomicBool,
}

impl MemorySession {
    /// Make `establish` and `end` fail.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn current(&self) -> Option<CurrentAccount> {
        lock(&self.current).as_ref().map(|(a, _)| a.clone())
    }

    #[must_use]
    pub fn remember_me(&self) -> Option<bool> {
        lock(&self.current).as_ref().map(|(_, r)| *r)
    }

    #[must_use]
    pub fn end_calls(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionChannel for MemorySession {
    async fn establish(
        &self,
        account: &CurrentAccount,
        remember_me: bool,
    ) -> Result<(), SessionError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError("session store unavailable".to_owned()));
        }
        *lock(&self.current) = Some((account.clone(), remember_me));
        Ok(())
    }

    async fn end(&self) -> Result<(), SessionError> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError("session store unavailable".to_owned()));
        }
        *lock(&self.current) = None;
        Ok(())
    }
}
