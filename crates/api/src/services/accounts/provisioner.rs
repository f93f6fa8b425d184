//! Account provisioning.
//!
//! Checks run before anything is written. Once the account row exists it is
//! never rolled back: the remaining steps are all attempted, and any that fail
//! are reported together as [`AccountError::Incomplete`].

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use pharma_link_core::{PendingRequestId, Role};

use super::error::AccountError;
use super::stores::{CartStore, CredentialStore, Notifier, PendingRequestStore};
use crate::models::{Account, CompanyRegistration, NewAccount, ProvisionedAccount};
use crate::services::email::Notification;

/// Creates Pharmacy and Company accounts.
pub struct AccountProvisioner<'a> {
    credentials: &'a dyn CredentialStore,
    requests: &'a dyn PendingRequestStore,
    carts: &'a dyn CartStore,
    notifier: &'a dyn Notifier,
    login_url: &'a str,
}

impl<'a> AccountProvisioner<'a> {
    #[must_use]
    pub const fn new(
        credentials: &'a dyn CredentialStore,
        requests: &'a dyn PendingRequestStore,
        carts: &'a dyn CartStore,
        notifier: &'a dyn Notifier,
        login_url: &'a str,
    ) -> Self {
        Self {
            credentials,
            requests,
            carts,
            notifier,
            login_url,
        }
    }

    /// Turn a pending pharmacy request into an active Pharmacy account.
    ///
    /// Grants the Pharmacy role, opens an empty cart, consumes the request and
    /// queues the welcome email. Email delivery failures are never reported.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request does not exist
    /// - `InvalidCredential` if the request carries no usable password
    /// - `ValidationFailed` if the credential store refuses the account
    /// - `Incomplete` if the account was created but a follow-up step failed
    #[instrument(skip_all, fields(request_id = %request_id))]
    pub async fn from_pending_request(
        &self,
        request_id: PendingRequestId,
    ) -> Result<ProvisionedAccount, AccountError> {
        let request = self
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| AccountError::not_found("Request not found."))?;
        let password = require_password(request.password.as_ref())?;

        let account = self
            .create_account(
                NewAccount {
                    username: request.username.clone(),
                    email: request.email.clone(),
                    phone: request.phone.clone(),
                    role: Role::Pharmacy,
                    name: request.pharmacy_name.clone(),
                    street: request.street.clone(),
                    city: request.city.clone(),
                    state: request.state.clone(),
                    license_number: request.license_number.clone(),
                    contact_name: request.contact_name.clone(),
                    min_order_value: None,
                    email_confirmed: true,
                },
                password,
            )
            .await?;

        let mut failures = Vec::new();
        self.grant_role(&account, &mut failures).await;
        self.provision_dependents(&account, &mut failures).await;

        match self.requests.delete(request_id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Pending request was already removed"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to delete pending request");
                failures.push("request deletion".to_owned());
            }
        }

        match Notification::account_created(
            account.role,
            &account.email,
            &account.username,
            password.expose_secret(),
            self.login_url,
        ) {
            Ok(notification) => self.notifier.send_detached(notification),
            Err(e) => tracing::warn!(error = %e, "Failed to render welcome email"),
        }

        finish(&account, failures)
    }

    /// Register a Company account from an administrator payload.
    ///
    /// The welcome email is sent before returning and its failure is reported.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the email already belongs to an account
    /// - `InvalidCredential` if the payload carries no usable password
    /// - `ValidationFailed` if the credential store refuses the account
    /// - `Notification` if the welcome email could not be sent
    /// - `Incomplete` if the account was created but a follow-up step failed
    #[instrument(skip_all, fields(username = %payload.user_name))]
    pub async fn from_company_payload(
        &self,
        payload: CompanyRegistration,
    ) -> Result<ProvisionedAccount, AccountError> {
        if self.credentials.find_by_email(&payload.email).await?.is_some() {
            return Err(AccountError::Conflict("Email is already in use".to_owned()));
        }

        let CompanyRegistration {
            user_name,
            email,
            phone_number,
            license_number,
            street,
            city,
            state,
            name,
            password,
            min_order_value,
        } = payload;
        let password = password.map(SecretString::from);
        let password = require_password(password.as_ref())?;

        let account = self
            .create_account(
                NewAccount {
                    username: user_name,
                    email,
                    phone: phone_number,
                    role: Role::Company,
                    name,
                    street,
                    city,
                    state,
                    license_number,
                    contact_name: None,
                    min_order_value,
                    email_confirmed: true,
                },
                password,
            )
            .await?;

        let mut failures = Vec::new();
        self.grant_role(&account, &mut failures).await;
        self.provision_dependents(&account, &mut failures).await;

        let notification = Notification::account_created(
            account.role,
            &account.email,
            &account.username,
            password.expose_secret(),
            self.login_url,
        )?;
        self.notifier.send(notification).await?;

        finish(&account, failures)
    }

    async fn create_account(
        &self,
        account: NewAccount,
        password: &SecretString,
    ) -> Result<Account, AccountError> {
        let account = self.credentials.create(account, password).await?;
        tracing::info!(
            account_id = %account.id,
            username = %account.username,
            role = %account.role,
            "Account created"
        );
        Ok(account)
    }

    async fn grant_role(&self, account: &Account, failures: &mut Vec<String>) {
        if let Err(e) = self.credentials.assign_role(account.id, account.role).await {
            tracing::error!(account_id = %account.id, error = %e, "Failed to assign role");
            failures.push("role assignment".to_owned());
        }
    }

    /// Records a role owns from the moment it exists.
    async fn provision_dependents(&self, account: &Account, failures: &mut Vec<String>) {
        if !account.role.receives_cart() {
            return;
        }
        match self.carts.create(account.id, Decimal::ZERO).await {
            Ok(cart) => tracing::debug!(cart_id = %cart.id, "Cart created"),
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Failed to create cart");
                failures.push("cart creation".to_owned());
            }
        }
    }
}

/// Passwords that are missing, empty or start with a space are refused.
fn require_password(password: Option<&SecretString>) -> Result<&SecretString, AccountError> {
    match password {
        Some(p) if !p.expose_secret().is_empty() && !p.expose_secret().starts_with(' ') => Ok(p),
        _ => Err(AccountError::invalid_credential("Password is required.")),
    }
}

fn finish(account: &Account, failures: Vec<String>) -> Result<ProvisionedAccount, AccountError> {
    if failures.is_empty() {
        Ok(ProvisionedAccount::from(account))
    } else {
        Err(AccountError::Incomplete {
            username: account.username.clone(),
            failures,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pharma_link_core::AccountId;

    use super::*;
    use crate::models::PendingRequest;
    use crate::services::accounts::memory::{
        MemoryCartStore, MemoryCredentialStore, MemoryPendingRequestStore, RecordingNotifier,
    };

    const LOGIN_URL: &str = "https://pharmalink.test/login";

    #[derive(Default)]
    struct Fixture {
        credentials: MemoryCredentialStore,
        requests: MemoryPendingRequestStore,
        carts: MemoryCartStore,
        notifier: RecordingNotifier,
    }

    impl Fixture {
        fn with_notifier(notifier: RecordingNotifier) -> Self {
            Self {
                notifier,
                ..Self::default()
            }
        }

        fn provisioner(&self) -> AccountProvisioner<'_> {
            AccountProvisioner::new(
                &self.credentials,
                &self.requests,
                &self.carts,
                &self.notifier,
                LOGIN_URL,
            )
        }
    }

    fn request(id: i32, password: Option<&str>) -> PendingRequest {
        PendingRequest {
            id: PendingRequestId::new(id),
            username: "pharm1".to_owned(),
            email: "p1@x.com".to_owned(),
            phone: Some("+20 100 000 0000".to_owned()),
            password: password.map(|p| SecretString::from(p.to_owned())),
            license_number: Some("LIC-7".to_owned()),
            pharmacy_name: "Nile Pharmacy".to_owned(),
            street: Some("1 Corniche".to_owned()),
            city: Some("Cairo".to_owned()),
            state: None,
            contact_name: Some("Dr. Amal".to_owned()),
        }
    }

    fn company(email: &str, password: Option<&str>) -> CompanyRegistration {
        CompanyRegistration {
            user_name: "comp1".to_owned(),
            email: email.to_owned(),
            phone_number: None,
            license_number: Some("CO-1".to_owned()),
            street: None,
            city: Some("Giza".to_owned()),
            state: None,
            name: "Delta Supplies".to_owned(),
            password: password.map(str::to_owned),
            min_order_value: Some(Decimal::new(50_000, 2)),
        }
    }

    #[tokio::test]
    async fn test_pharmacy_from_request() {
        let fx = Fixture::default();
        fx.requests.insert(request(7, Some("Secret1")));

        let provisioned = fx
            .provisioner()
            .from_pending_request(PendingRequestId::new(7))
            .await
            .unwrap();

        assert_eq!(provisioned.username, "pharm1");
        assert_eq!(provisioned.role, Role::Pharmacy);

        let account = fx.credentials.account("pharm1").unwrap();
        assert!(account.email_confirmed);
        assert!(account.active);
        assert_eq!(account.contact_name.as_deref(), Some("Dr. Amal"));
        assert_eq!(fx.credentials.roles_of(account.id), vec![Role::Pharmacy]);

        let carts = fx.carts.carts();
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].owner_id, account.id);
        assert_eq!(carts[0].total_price, Decimal::ZERO);

        assert!(!fx.requests.contains(PendingRequestId::new(7)));

        let detached = fx.notifier.detached();
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].to, "p1@x.com");
        assert!(detached[0].text_body.contains("Secret1"));
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_request_is_not_found() {
        let fx = Fixture::default();

        let err = fx
            .provisioner()
            .from_pending_request(PendingRequestId::new(99))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::NotFound(ref m) if m == "Request not found."));
        assert!(fx.credentials.is_empty());
    }

    #[tokio::test]
    async fn test_request_password_must_be_usable() {
        for password in [None, Some(""), Some(" Secret1")] {
            let fx = Fixture::default();
            fx.requests.insert(request(7, password));

            let err = fx
                .provisioner()
                .from_pending_request(PendingRequestId::new(7))
                .await
                .unwrap_err();

            assert!(
                matches!(err, AccountError::InvalidCredential(ref m) if m == "Password is required."),
                "password {password:?} gave {err:?}"
            );
            assert!(fx.credentials.is_empty());
            assert!(fx.requests.contains(PendingRequestId::new(7)));
        }
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_request_in_place() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Company, "pharm1", "other@x.com", "Secret1");
        fx.requests.insert(request(7, Some("weak")));

        let err = fx
            .provisioner()
            .from_pending_request(PendingRequestId::new(7))
            .await
            .unwrap_err();

        let AccountError::ValidationFailed(message) = err else {
            panic!("expected ValidationFailed, got {err:?}");
        };
        assert!(message.starts_with("Username 'pharm1' is already taken. | "));
        assert!(message.contains("at least 6 characters"));
        assert!(fx.requests.contains(PendingRequestId::new(7)));
        assert!(fx.carts.carts().is_empty());
        assert!(fx.notifier.detached().is_empty());
    }

    #[tokio::test]
    async fn test_role_failure_is_incomplete_but_still_notifies() {
        let fx = Fixture::default();
        fx.credentials.fail_role_assignment();
        fx.requests.insert(request(7, Some("Secret1")));

        let err = fx
            .provisioner()
            .from_pending_request(PendingRequestId::new(7))
            .await
            .unwrap_err();

        let AccountError::Incomplete { username, failures } = err else {
            panic!("expected Incomplete, got {err:?}");
        };
        assert_eq!(username, "pharm1");
        assert_eq!(failures, vec!["role assignment".to_owned()]);

        // The account and its dependents still exist.
        assert!(fx.credentials.account("pharm1").is_some());
        assert_eq!(fx.carts.carts().len(), 1);
        assert!(!fx.requests.contains(PendingRequestId::new(7)));
        assert_eq!(fx.notifier.detached().len(), 1);
    }

    #[tokio::test]
    async fn test_cart_and_request_failures_are_collected() {
        let fx = Fixture::default();
        fx.carts.fail_creates();
        fx.requests.fail_deletes();
        fx.requests.insert(request(7, Some("Secret1")));

        let err = fx
            .provisioner()
            .from_pending_request(PendingRequestId::new(7))
            .await
            .unwrap_err();

        let AccountError::Incomplete { failures, .. } = err else {
            panic!("expected Incomplete, got {err:?}");
        };
        assert_eq!(
            failures,
            vec!["cart creation".to_owned(), "request deletion".to_owned()]
        );
        let account = fx.credentials.account("pharm1").unwrap();
        assert_eq!(fx.credentials.roles_of(account.id), vec![Role::Pharmacy]);
    }

    #[tokio::test]
    async fn test_company_from_payload() {
        let fx = Fixture::default();

        let provisioned = fx
            .provisioner()
            .from_company_payload(company("c1@x.com", Some("Secret1")))
            .await
            .unwrap();

        assert_eq!(provisioned.role, Role::Company);
        let account = fx.credentials.account("comp1").unwrap();
        assert_eq!(account.min_order_value, Some(Decimal::new(50_000, 2)));
        assert!(account.email_confirmed);
        assert_eq!(fx.credentials.roles_of(account.id), vec![Role::Company]);

        assert!(fx.carts.carts().is_empty());
        assert!(fx.notifier.detached().is_empty());
        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "c1@x.com");
    }

    #[tokio::test]
    async fn test_company_email_conflict_is_case_insensitive() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Pharmacy, "pharm1", "c1@x.com", "Secret1");

        let err = fx
            .provisioner()
            .from_company_payload(company("C1@X.com", Some("Secret1")))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::Conflict(ref m) if m == "Email is already in use"));
        assert_eq!(fx.credentials.len(), 1);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_company_conflict_checked_before_password() {
        let fx = Fixture::default();
        fx.credentials
            .seed(Role::Pharmacy, "pharm1", "c1@x.com", "Secret1");

        let err = fx
            .provisioner()
            .from_company_payload(company("c1@x.com", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_company_password_required() {
        let fx = Fixture::default();

        let err = fx
            .provisioner()
            .from_company_payload(company("c1@x.com", Some("")))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::InvalidCredential(_)));
        assert!(fx.credentials.is_empty());
    }

    #[tokio::test]
    async fn test_company_notification_failure_propagates_after_creation() {
        let fx = Fixture::with_notifier(RecordingNotifier::failing());

        let err = fx
            .provisioner()
            .from_company_payload(company("c1@x.com", Some("Secret1")))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::Notification(_)));
        let account = fx.credentials.account("comp1").unwrap();
        assert_eq!(fx.credentials.roles_of(account.id), vec![Role::Company]);
    }

    #[tokio::test]
    async fn test_repeated_request_conversion_is_not_found() {
        let fx = Fixture::default();
        fx.requests.insert(request(7, Some("Secret1")));
        let provisioner = fx.provisioner();

        provisioner
            .from_pending_request(PendingRequestId::new(7))
            .await
            .unwrap();
        let err = provisioner
            .from_pending_request(PendingRequestId::new(7))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::NotFound(_)));
        assert_eq!(fx.credentials.len(), 1);
        assert_eq!(fx.carts.carts().len(), 1);
        assert_eq!(fx.carts.carts()[0].owner_id, AccountId::new(1));
    }
}
