//! Pending pharmacy request (domain type).

use secrecy::SecretString;

use pharma_link_core::PendingRequestId;

/// An unapproved pharmacy application.
///
/// Created by the onboarding flow and consumed exactly once when an
/// administrator converts it into an account.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: PendingRequestId,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    /// Password chosen during onboarding, if any.
    pub password: Option<SecretString>,
    pub license_number: Option<String>,
    pub pharmacy_name: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Responsible pharmacist.
    pub contact_name: Option<String>,
}
