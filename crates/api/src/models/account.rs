//! Account domain types.
//!
//! These types represent validated domain objects separate from database row
//! types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharma_link_core::{AccountId, Email, Role};

/// A platform account (domain type).
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,
    /// Login name, unique case-insensitively.
    pub username: String,
    /// Email address, unique case-insensitively.
    pub email: Email,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Role the account was provisioned with.
    pub role: Role,
    /// Display name of the pharmacy, company or administrator.
    pub name: String,
    /// Street address.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or governorate.
    pub state: Option<String>,
    /// Pharmacy or company license number.
    pub license_number: Option<String>,
    /// Responsible pharmacist (pharmacies only).
    pub contact_name: Option<String>,
    /// Minimum order value accepted by a company.
    pub min_order_value: Option<Decimal>,
    /// Whether the email was verified.
    pub email_confirmed: bool,
    /// False once the account has been deactivated.
    pub active: bool,
    /// License document, relative to the artifact root.
    pub document_path: Option<String>,
    /// Profile image, relative to the artifact root.
    pub image_path: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Artifact paths owned by this account.
    pub fn artifact_paths(&self) -> impl Iterator<Item = &str> {
        [self.document_path.as_deref(), self.image_path.as_deref()]
            .into_iter()
            .flatten()
    }
}

/// Account fields supplied at creation time.
///
/// The email is kept as a raw string so the credential store can report an
/// invalid address alongside its other validation messages.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub name: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub license_number: Option<String>,
    pub contact_name: Option<String>,
    pub min_order_value: Option<Decimal>,
    pub email_confirmed: bool,
}

/// Company registration payload submitted by an administrator.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRegistration {
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub license_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub name: String,
    pub password: Option<String>,
    pub min_order_value: Option<Decimal>,
}

impl std::fmt::Debug for CompanyRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanyRegistration")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .field("min_order_value", &self.min_order_value)
            .finish_non_exhaustive()
    }
}

/// Result of a successful provisioning call.
///
/// Never carries the password back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedAccount {
    pub id: AccountId,
    pub username: String,
    pub role: Role,
}

impl From<&Account> for ProvisionedAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role,
        }
    }
}
