//! Business logic services.
//!
//! # Services
//!
//! - `accounts` - Provisioning, login/logout and deactivation
//! - `artifacts` - Uploaded documents and images on disk
//! - `credentials` - Password policy, hashing and account validation
//! - `email` - Account emails over SMTP, with a background delivery queue
//! - `tokens` - Bearer token issuance and verification

pub mod accounts;
pub mod artifacts;
pub mod credentials;
pub mod email;
pub mod tokens;

pub use artifacts::{ArtifactError, FsArtifactStore};
pub use credentials::PasswordPolicy;
pub use email::{EmailError, EmailService, Mailer, Notification, QueuedNotifier};
pub use tokens::{IssuedToken, TokenError, TokenIssuer};
