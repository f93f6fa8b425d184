//! Session-related types for account authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use pharma_link_core::{AccountId, Email, Role};

use super::account::Account;

/// Session-stored account identity.
///
/// Minimal data stored in the session (and encoded in bearer tokens) to
/// identify the logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAccount {
    /// Account's database ID.
    pub id: AccountId,
    /// Account's login name.
    pub username: String,
    /// Account's email address.
    pub email: Email,
    /// Account's role.
    pub role: Role,
}

impl From<&Account> for CurrentAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in account.
    pub const CURRENT_ACCOUNT: &str = "current_account";
}
