//! Account lifecycle: provisioning, authentication and deactivation.
//!
//! The operations here are written against the capability traits in
//! [`stores`], so they run the same way over `PostgreSQL` and in memory.
//!
//! - [`AccountProvisioner`] creates Pharmacy accounts from pending requests and
//!   Company accounts from administrator payloads.
//! - [`Authenticator`] logs accounts in (session + bearer token) and out.
//! - [`AccountDeactivator`] soft-deletes an account and cascades to its
//!   artifacts and reviews.

mod authenticator;
mod deactivator;
mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
mod provisioner;
pub mod stores;

pub use authenticator::{Authenticator, LoginRequest};
pub use deactivator::{AccountDeactivator, DeactivationOutcome, DeactivationReport};
pub use error::AccountError;
pub use provisioner::AccountProvisioner;
pub use stores::{
    ArtifactStore, CartStore, CreateAccountError, CredentialStore, Notifier, PendingRequestStore,
    ReviewStore, SessionChannel, SessionError,
};
