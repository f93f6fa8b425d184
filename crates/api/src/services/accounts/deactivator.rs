//! Account deactivation (soft delete) with cascading cleanup.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::instrument;

use pharma_link_core::{AccountId, Role};

use super::error::AccountError;
use super::stores::{ArtifactStore, CredentialStore, ReviewStore};
use crate::db::RepositoryError;
use crate::models::{Account, Review};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationOutcome {
    /// This call cleared the active flag.
    Deactivated,
    /// The account was inactive already; nothing was removed.
    AlreadyInactive,
}

/// What a deactivation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivationReport {
    pub account_id: AccountId,
    pub username: String,
    pub outcome: DeactivationOutcome,
    pub reviews_removed: usize,
    /// Artifacts that could not be deleted, with the reason.
    pub artifact_failures: Vec<String>,
}

/// Soft-deletes accounts.
pub struct AccountDeactivator<'a> {
    credentials: &'a dyn CredentialStore,
    reviews: &'a dyn ReviewStore,
    artifacts: &'a dyn ArtifactStore,
    reserved_username: &'a str,
}

impl<'a> AccountDeactivator<'a> {
    #[must_use]
    pub const fn new(
        credentials: &'a dyn CredentialStore,
        reviews: &'a dyn ReviewStore,
        artifacts: &'a dyn ArtifactStore,
        reserved_username: &'a str,
    ) -> Self {
        Self {
            credentials,
            reviews,
            artifacts,
            reserved_username,
        }
    }

    /// Deactivate the account named `username`.
    ///
    /// Artifacts are removed best-effort, then the reviews tied to the
    /// account's role, then the active flag is cleared. A second call on the
    /// same account reports `AlreadyInactive` and removes nothing.
    ///
    /// # Errors
    ///
    /// - `Forbidden` for the reserved administrator username
    /// - `InvalidInput` if `username` is empty
    /// - `NotFound` if no account has that username
    /// - `Repository` if reviews could not be removed (the account stays active)
    #[instrument(skip(self))]
    pub async fn deactivate(&self, username: &str) -> Result<DeactivationReport, AccountError> {
        if username.eq_ignore_ascii_case(self.reserved_username) {
            return Err(AccountError::Forbidden(
                "You can't delete the admin account.".to_owned(),
            ));
        }
        if username.trim().is_empty() {
            return Err(AccountError::InvalidInput(
                "User name is required.".to_owned(),
            ));
        }

        let account = self
            .credentials
            .find_by_username(username)
            .await?
            .ok_or_else(|| AccountError::not_found("User not found."))?;

        if !account.active {
            tracing::info!(account_id = %account.id, "Account already inactive");
            return Ok(report(&account, DeactivationOutcome::AlreadyInactive, 0, Vec::new()));
        }

        let artifact_failures = self.remove_artifacts(&account).await;
        let reviews_removed = self.remove_reviews(&account).await?;

        let outcome = if self.credentials.deactivate(account.id).await? {
            tracing::info!(
                account_id = %account.id,
                role = %account.role,
                reviews_removed,
                artifact_failures = artifact_failures.len(),
                "Account deactivated"
            );
            DeactivationOutcome::Deactivated
        } else {
            DeactivationOutcome::AlreadyInactive
        };

        Ok(report(&account, outcome, reviews_removed, artifact_failures))
    }

    async fn remove_artifacts(&self, account: &Account) -> Vec<String> {
        let mut failures = Vec::new();
        for path in account.artifact_paths() {
            match self.artifacts.delete_if_exists(path).await {
                Ok(true) => tracing::debug!(path, "Artifact removed"),
                Ok(false) => tracing::debug!(path, "Artifact already absent"),
                Err(e) => {
                    tracing::warn!(path, error = %e, "Failed to remove artifact");
                    failures.push(e.to_string());
                }
            }
        }
        failures
    }

    /// Returns how many reviews this call removed.
    async fn remove_reviews(&self, account: &Account) -> Result<usize, RepositoryError> {
        let reviews = self.reviews_for(account).await?;

        let mut removed = 0;
        for review in reviews {
            if self.reviews.delete(review.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn reviews_for(&self, account: &Account) -> Result<Vec<Review>, RepositoryError> {
        let reviews = match account.role {
            Role::Pharmacy => {
                let mut reviews = self.reviews.find_by_subject(account.id).await?;
                reviews.extend(self.reviews.find_by_author(account.id).await?);
                reviews
            }
            Role::Company => self.reviews.find_by_subject(account.id).await?,
            Role::Admin => Vec::new(),
        };

        // Self-reviews show up on both sides.
        let unique: BTreeMap<_, _> = reviews.into_iter().map(|r| (r.id, r)).collect();
        Ok(unique.into_values().collect())
    }
}

fn report(
    account: &Account,
    outcome: DeactivationOutcome,
    reviews_removed: usize,
    artifact_failures: Vec<String>,
) -> DeactivationReport {
    DeactivationReport {
        account_id: account.id,
        username: account.username.clone(),
        outcome,
        reviews_removed,
        artifact_failures,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::accounts::memory::{
        MemoryArtifactStore, MemoryCredentialStore, MemoryReviewStore,
    };

    #[derive(Default)]
    struct Fixture {
        credentials: MemoryCredentialStore,
        reviews: MemoryReviewStore,
        artifacts: MemoryArtifactStore,
    }

    impl Fixture {
        fn deactivator(&self) -> AccountDeactivator<'_> {
            AccountDeactivator::new(&self.credentials, &self.reviews, &self.artifacts, "admin")
        }
    }

    #[tokio::test]
    async fn test_pharmacy_cascade() {
        let fx = Fixture::default();
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let company = fx
            .credentials
            .seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        fx.credentials
            .set_artifacts("pharm1", Some("licenses/p1.pdf"), Some("images/p1.png"));
        fx.artifacts.add("licenses/p1.pdf");
        fx.artifacts.add("images/p1.png");

        fx.reviews.add(pharmacy.id, company.id);
        fx.reviews.add(company.id, pharmacy.id);
        let unrelated = fx.reviews.add(company.id, company.id);

        let report = fx.deactivator().deactivate("pharm1").await.unwrap();

        assert_eq!(report.outcome, DeactivationOutcome::Deactivated);
        assert_eq!(report.account_id, pharmacy.id);
        assert_eq!(report.reviews_removed, 2);
        assert!(report.artifact_failures.is_empty());
        assert!(!fx.credentials.account("pharm1").unwrap().active);
        assert!(!fx.artifacts.exists("licenses/p1.pdf"));
        assert!(!fx.artifacts.exists("images/p1.png"));

        let remaining = fx.reviews.all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, unrelated);
    }

    #[tokio::test]
    async fn test_company_keeps_reviews_it_wrote() {
        let fx = Fixture::default();
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let company = fx
            .credentials
            .seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        fx.reviews.add(pharmacy.id, company.id);
        let written = fx.reviews.add(company.id, pharmacy.id);

        let report = fx.deactivator().deactivate("comp1").await.unwrap();

        assert_eq!(report.reviews_removed, 1);
        let remaining = fx.reviews.all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, written);
    }

    #[tokio::test]
    async fn test_admin_has_no_review_cascade() {
        let fx = Fixture::default();
        let other_admin = fx
            .credentials
            .seed(Role::Admin, "ops", "ops@x.com", "Secret1");
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        fx.reviews.add(pharmacy.id, other_admin.id);

        let report = fx.deactivator().deactivate("ops").await.unwrap();

        assert_eq!(report.outcome, DeactivationOutcome::Deactivated);
        assert_eq!(report.reviews_removed, 0);
        assert_eq!(fx.reviews.all().len(), 1);
    }

    #[tokio::test]
    async fn test_self_review_is_removed_once() {
        let fx = Fixture::default();
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        fx.reviews.add(pharmacy.id, pharmacy.id);

        let report = fx.deactivator().deactivate("pharm1").await.unwrap();

        assert_eq!(report.reviews_removed, 1);
        assert!(fx.reviews.all().is_empty());
    }

    #[tokio::test]
    async fn test_second_call_is_already_inactive() {
        let fx = Fixture::default();
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let company = fx
            .credentials
            .seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        fx.reviews.add(company.id, pharmacy.id);
        let deactivator = fx.deactivator();

        deactivator.deactivate("pharm1").await.unwrap();
        // A review that appears afterwards is left alone.
        fx.reviews.add(company.id, pharmacy.id);
        let report = deactivator.deactivate("pharm1").await.unwrap();

        assert_eq!(report.outcome, DeactivationOutcome::AlreadyInactive);
        assert_eq!(report.reviews_removed, 0);
        assert_eq!(fx.reviews.all().len(), 1);
    }

    #[tokio::test]
    async fn test_reserved_admin_is_forbidden_first() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Admin, "admin", "admin@x.com", "Secret1");

        for name in ["admin", "Admin"] {
            let err = fx.deactivator().deactivate(name).await.unwrap_err();
            assert!(matches!(err, AccountError::Forbidden(_)));
        }
        assert!(fx.credentials.account("admin").unwrap().active);
    }

    #[tokio::test]
    async fn test_empty_and_unknown_usernames() {
        let fx = Fixture::default();

        let err = fx.deactivator().deactivate("").await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(ref m) if m == "User name is required."));

        let err = fx.deactivator().deactivate("ghost").await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound(ref m) if m == "User not found."));
    }

    #[tokio::test]
    async fn test_artifact_failures_are_reported_not_fatal() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        fx.credentials
            .set_artifacts("comp1", Some("../../etc/passwd"), Some("images/c1.png"));
        fx.artifacts.add("images/c1.png");
        fx.artifacts.fail_on("images/c1.png");

        let report = fx.deactivator().deactivate("comp1").await.unwrap();

        assert_eq!(report.outcome, DeactivationOutcome::Deactivated);
        assert_eq!(report.artifact_failures.len(), 2);
        assert!(report.artifact_failures[0].contains("escapes the artifact root"));
        assert!(!fx.credentials.account("comp1").unwrap().active);
    }

    #[tokio::test]
    async fn test_missing_artifacts_are_not_failures() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        fx.credentials
            .set_artifacts("pharm1", Some("licenses/gone.pdf"), None);

        let report = fx.deactivator().deactivate("pharm1").await.unwrap();

        assert!(report.artifact_failures.is_empty());
    }

    #[tokio::test]
    async fn test_review_failure_aborts_before_flag_flip() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        fx.reviews.fail_lookups();

        let err = fx.deactivator().deactivate("pharm1").await.unwrap_err();

        assert!(matches!(err, AccountError::Repository(_)));
        assert!(fx.credentials.account("pharm1").unwrap().active);
    }

    #[tokio::test]
    async fn test_flag_failure_after_review_cleanup_keeps_account_active() {
        let fx = Fixture::default();
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let company = fx
            .credentials
            .seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        fx.reviews.add(company.id, pharmacy.id);
        fx.credentials.fail_deactivate();

        let err = fx.deactivator().deactivate("pharm1").await.unwrap_err();

        assert!(matches!(err, AccountError::Repository(_)));
        assert!(fx.credentials.account("pharm1").unwrap().active);
        // Reviews went before the flag flip was attempted.
        assert!(fx.reviews.all().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_deactivation_has_one_winner() {
        let fx = Fixture::default();
        let pharmacy = fx
            .credentials
            .seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let company = fx
            .credentials
            .seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        fx.reviews.add(company.id, pharmacy.id);
        fx.reviews.add(pharmacy.id, company.id);
        // Both calls read the account as active before either writes.
        fx.credentials.yield_after_lookup();
        let deactivator = fx.deactivator();

        let (a, b) = tokio::join!(
            deactivator.deactivate("pharm1"),
            deactivator.deactivate("pharm1")
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let mut outcomes = [a.outcome, b.outcome];
        outcomes.sort_by_key(|o| *o == DeactivationOutcome::AlreadyInactive);
        assert_eq!(
            outcomes,
            [
                DeactivationOutcome::Deactivated,
                DeactivationOutcome::AlreadyInactive
            ]
        );
        // Each review is counted by whichever call deleted it, never twice.
        assert_eq!(a.reviews_removed + b.reviews_removed, 2);
        assert!(fx.reviews.all().is_empty());
        assert!(!fx.credentials.account("pharm1").unwrap().active);
    }
}
