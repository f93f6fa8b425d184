//! Domain models for the account service.

pub mod account;
pub mod pending_request;
pub mod review;
pub mod session;

pub use account::{Account, CompanyRegistration, NewAccount, ProvisionedAccount};
pub use pending_request::PendingRequest;
pub use review::{Cart, Review};
pub use session::{CurrentAccount, keys as session_keys};
