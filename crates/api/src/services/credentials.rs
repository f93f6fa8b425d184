//! Credential rules shared by every credential store.
//!
//! Validation produces human-readable messages that the provisioner joins into
//! a single `ValidationFailed` error. Passwords are hashed with Argon2id.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use pharma_link_core::Email;

use crate::models::NewAccount;

/// Characters accepted in usernames besides ASCII letters and digits.
const USERNAME_EXTRA_CHARS: &str = "-._@+";

/// Hash verified when the username is unknown, so a miss costs the same as a
/// wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("pharma-link-timing-equalizer").ok());

/// Password hashing failed.
#[derive(Debug, Error)]
#[error("password hashing failed")]
pub struct PasswordHashError;

/// Password complexity rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: false,
        }
    }
}

impl PasswordPolicy {
    /// Check a password, returning one message per violated rule.
    #[must_use]
    pub fn violations(&self, password: &str) -> Vec<String> {
        let mut messages = Vec::new();

        if password.chars().count() < self.min_length {
            messages.push(format!(
                "Passwords must be at least {} characters.",
                self.min_length
            ));
        }
        if self.require_non_alphanumeric && password.chars().all(char::is_alphanumeric) {
            messages.push("Passwords must have at least one non alphanumeric character.".to_owned());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            messages.push("Passwords must have at least one digit ('0'-'9').".to_owned());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            messages.push("Passwords must have at least one lowercase ('a'-'z').".to_owned());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            messages.push("Passwords must have at least one uppercase ('A'-'Z').".to_owned());
        }

        messages
    }
}

/// Which unique fields of a new account already belong to someone else.
///
/// Stores look these up themselves, case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Uniqueness {
    pub username_taken: bool,
    pub email_taken: bool,
}

/// Validate a new account and its password.
///
/// Messages come out in a fixed order: username, email, then password rules.
#[must_use]
pub fn validate_new_account(
    account: &NewAccount,
    password: &str,
    uniqueness: Uniqueness,
    policy: &PasswordPolicy,
) -> Vec<String> {
    let mut messages = Vec::new();

    if account.username.is_empty() {
        messages.push("Username is required.".to_owned());
    } else if !account
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || USERNAME_EXTRA_CHARS.contains(c))
    {
        messages.push(format!(
            "Username '{}' is invalid, can only contain letters or digits.",
            account.username
        ));
    } else if uniqueness.username_taken {
        messages.push(username_taken(&account.username));
    }

    if Email::parse(&account.email).is_err() {
        messages.push(format!("Email '{}' is invalid.", account.email));
    } else if uniqueness.email_taken {
        messages.push(email_taken(&account.email));
    }

    messages.extend(policy.violations(password));
    messages
}

/// Message for a duplicate username.
#[must_use]
pub fn username_taken(username: &str) -> String {
    format!("Username '{username}' is already taken.")
}

/// Message for a duplicate email.
#[must_use]
pub fn email_taken(email: &str) -> String {
    format!("Email '{email}' is already taken.")
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `PasswordHashError` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordHashError)
}

/// Verify a password against a stored hash.
///
/// Unparseable hashes never verify.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Burn one verification for an unknown username. Always returns false.
#[must_use]
pub fn verify_unknown_user(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}
