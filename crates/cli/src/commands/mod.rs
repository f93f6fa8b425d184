//! CLI subcommands.

pub mod admin;
pub mod migrate;

use secrecy::SecretString;

/// Database URL from `PHARMALINK_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Option<SecretString> {
    std::env::var("PHARMALINK_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
