//! Account roles and the provisioning authorization predicate.
//!
//! The platform has exactly three roles. Everything that used to branch on a
//! role name matches on [`Role`] instead, so adding a role is a compile error
//! at every decision point.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role attached to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "pharma.account_role_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator. Provisions and deactivates other accounts.
    Admin,
    /// Pharmacy created from an approved pending request. Owns a cart.
    Pharmacy,
    /// Supplier company registered directly by an administrator.
    Company,
}

impl Role {
    /// All roles, in seeding order.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Pharmacy, Self::Company];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Pharmacy => "pharmacy",
            Self::Company => "company",
        }
    }

    /// Returns true if this role may provision and deactivate accounts.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns true if accounts with this role own a shopping cart.
    #[must_use]
    pub const fn receives_cart(self) -> bool {
        match self {
            Self::Pharmacy => true,
            Self::Admin | Self::Company => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "pharmacy" => Ok(Self::Pharmacy),
            "company" => Ok(Self::Company),
            _ => Err(RoleError::Unknown(s.to_owned())),
        }
    }
}

/// Errors produced by the role registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    /// The string does not name a role.
    #[error("invalid role: {0}")]
    Unknown(String),

    /// The caller's role does not allow the operation.
    #[error("role {actual} is not allowed to manage accounts")]
    NotAllowed {
        /// Role the caller holds.
        actual: Role,
    },
}

/// Authorization predicate for provisioning and deactivation.
///
/// # Errors
///
/// Returns `RoleError::NotAllowed` unless `caller` is [`Role::Admin`].
pub fn authorize_provisioning(caller: Role) -> Result<(), RoleError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(RoleError::NotAllowed { actual: caller })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!(
            "Admin".parse::<Role>(),
            Err(RoleError::Unknown("Admin".to_owned()))
        );
    }

    #[test]
    fn test_only_pharmacy_receives_cart() {
        assert!(Role::Pharmacy.receives_cart());
        assert!(!Role::Company.receives_cart());
        assert!(!Role::Admin.receives_cart());
    }

    #[test]
    fn test_authorize_provisioning() {
        assert!(authorize_provisioning(Role::Admin).is_ok());
        assert_eq!(
            authorize_provisioning(Role::Pharmacy),
            Err(RoleError::NotAllowed {
                actual: Role::Pharmacy
            })
        );
        assert!(authorize_provisioning(Role::Company).is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::Pharmacy).unwrap(),
            "\"pharmacy\""
        );
    }
}
