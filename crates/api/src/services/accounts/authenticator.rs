//! Login and logout.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::error::AccountError;
use super::stores::{CredentialStore, SessionChannel};
use crate::models::CurrentAccount;
use crate::services::tokens::{IssuedToken, TokenIssuer};

/// Login form. `user_name` may also be an email address.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: SecretString,
    #[serde(default)]
    pub remember_me: bool,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Verifies credentials, opens sessions and issues bearer tokens.
pub struct Authenticator<'a> {
    credentials: &'a dyn CredentialStore,
    tokens: &'a TokenIssuer,
}

impl<'a> Authenticator<'a> {
    #[must_use]
    pub const fn new(credentials: &'a dyn CredentialStore, tokens: &'a TokenIssuer) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    /// Log an account in.
    ///
    /// The identifier is tried as an email first and, if one matches, replaced
    /// by that account's username. Failed attempts never lock the account.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the identifier or password is empty
    /// - `InvalidCredential` if the username/password pair does not match
    /// - `NotFound` if the account vanished after the password check
    /// - `AccountDisabled` if the account has been deactivated
    /// - `Session` or `Token` if the session or token could not be created
    #[instrument(skip_all, fields(identifier = %request.user_name))]
    pub async fn login(
        &self,
        request: &LoginRequest,
        session: &dyn SessionChannel,
    ) -> Result<IssuedToken, AccountError> {
        if request.user_name.trim().is_empty() {
            return Err(AccountError::InvalidInput("User name is required.".to_owned()));
        }
        if request.password.expose_secret().is_empty() {
            return Err(AccountError::InvalidInput("Password is required.".to_owned()));
        }

        let username = match self.credentials.find_by_email(&request.user_name).await? {
            Some(account) => account.username,
            None => request.user_name.clone(),
        };

        if !self
            .credentials
            .check_password(&username, &request.password)
            .await?
        {
            tracing::info!("Login rejected");
            return Err(AccountError::invalid_credential(
                "Invalid User Name or Password",
            ));
        }

        let account = self
            .credentials
            .find_by_username(&username)
            .await?
            .ok_or_else(|| AccountError::not_found("User not found."))?;
        if !account.active {
            tracing::info!(account_id = %account.id, "Login refused for deactivated account");
            return Err(AccountError::AccountDisabled);
        }

        let current = CurrentAccount::from(&account);
        session.establish(&current, request.remember_me).await?;
        let token = self.tokens.issue(&current)?;

        tracing::info!(account_id = %account.id, role = %account.role, "Login succeeded");
        Ok(token)
    }

    /// End the caller's session. Always succeeds.
    pub async fn logout(&self, session: &dyn SessionChannel) {
        if let Err(e) = session.end().await {
            tracing::warn!(error = %e, "Failed to end session");
        }
    }

    /// Decode a bearer token into the account it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Token` if the token is rejected.
    pub fn verify_token(&self, token: &str) -> Result<CurrentAccount, AccountError> {
        Ok(self.tokens.verify(token)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use pharma_link_core::Role;

    use super::*;
    use crate::services::accounts::memory::{MemoryCredentialStore, MemorySession};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            &SecretString::from("k7Qm2xVr9LpT4sWz8NcB3hYf6JdG1aEu"),
            "pharma-link",
            Duration::minutes(60),
        )
    }

    fn login(user_name: &str, password: &str, remember_me: bool) -> LoginRequest {
        LoginRequest {
            user_name: user_name.to_owned(),
            password: SecretString::from(password.to_owned()),
            remember_me,
        }
    }

    #[tokio::test]
    async fn test_login_by_username() {
        let credentials = MemoryCredentialStore::default();
        let seeded = credentials.seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let tokens = issuer();
        let session = MemorySession::default();

        let issued = Authenticator::new(&credentials, &tokens)
            .login(&login("pharm1", "Secret1", false), &session)
            .await
            .unwrap();

        let current = tokens.verify(&issued.token).unwrap();
        assert_eq!(current.id, seeded.id);
        assert_eq!(current.role, Role::Pharmacy);
        assert_eq!(session.current().unwrap().username, "pharm1");
        assert_eq!(session.remember_me(), Some(false));
    }

    #[tokio::test]
    async fn test_login_by_email_uses_account_username() {
        let credentials = MemoryCredentialStore::default();
        credentials.seed(Role::Company, "comp1", "c1@x.com", "Secret1");
        let tokens = issuer();
        let session = MemorySession::default();

        let issued = Authenticator::new(&credentials, &tokens)
            .login(&login("C1@x.com", "Secret1", true), &session)
            .await
            .unwrap();

        assert_eq!(tokens.verify(&issued.token).unwrap().username, "comp1");
        assert_eq!(session.remember_me(), Some(true));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let credentials = MemoryCredentialStore::default();
        credentials.seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        let tokens = issuer();
        let session = MemorySession::default();
        let authenticator = Authenticator::new(&credentials, &tokens);

        let wrong = authenticator
            .login(&login("pharm1", "Wrong1", false), &session)
            .await
            .unwrap_err();
        let unknown = authenticator
            .login(&login("ghost", "Secret1", false), &session)
            .await
            .unwrap_err();

        assert_eq!(wrong.to_string(), "Invalid User Name or Password");
        assert_eq!(unknown.to_string(), wrong.to_string());
        // Unknown usernames still go through the password check.
        assert_eq!(credentials.password_checks(), 2);
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_deactivated_account_is_refused_after_password_check() {
        let credentials = MemoryCredentialStore::default();
        let seeded = credentials.seed(Role::Pharmacy, "pharm1", "p1@x.com", "Secret1");
        credentials.deactivate(seeded.id).await.unwrap();
        let tokens = issuer();
        let session = MemorySession::default();
        let authenticator = Authenticator::new(&credentials, &tokens);

        let err = authenticator
            .login(&login("pharm1", "Secret1", false), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::AccountDisabled));
        assert!(session.current().is_none());

        // A wrong password on a disabled account is still just a bad credential.
        let err = authenticator
            .login(&login("pharm1", "Wrong1", false), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn test_empty_fields_are_invalid_input() {
        let credentials = MemoryCredentialStore::default();
        let tokens = issuer();
        let session = MemorySession::default();
        let authenticator = Authenticator::new(&credentials, &tokens);

        let err = authenticator
            .login(&login(" ", "Secret1", false), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(_)));

        let err = authenticator
            .login(&login("pharm1", "", false), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(_)));
        assert_eq!(credentials.password_checks(), 0);
    }

    #[tokio::test]
    async fn test_session_failure_fails_login() {
        let credentials = MemoryCredentialStore::default();
        credentials.seed(Role::Admin, "admin", "admin@x.com", "Secret1");
        let tokens = issuer();
        let session = MemorySession::default();
        session.fail();

        let err = Authenticator::new(&credentials, &tokens)
            .login(&login("admin", "Secret1", false), &session)
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::Session(_)));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let credentials = MemoryCredentialStore::default();
        credentials.seed(Role::Admin, "admin", "admin@x.com", "Secret1");
        let tokens = issuer();
        let session = MemorySession::default();
        let authenticator = Authenticator::new(&credentials, &tokens);

        authenticator
            .login(&login("admin", "Secret1", false), &session)
            .await
            .unwrap();
        authenticator.logout(&session).await;
        authenticator.logout(&session).await;

        assert!(session.current().is_none());
        assert_eq!(session.end_calls(), 2);

        session.fail();
        authenticator.logout(&session).await;
        assert_eq!(session.end_calls(), 3);
    }

    #[test]
    fn test_login_request_json_and_debug() {
        let request: LoginRequest = serde_json::from_str(
            r#"{"userName":"pharm1","password":"Secret1","rememberMe":true}"#,
        )
        .unwrap();
        assert_eq!(request.user_name, "pharm1");
        assert!(request.remember_me);

        let request: LoginRequest =
            serde_json::from_str(r#"{"userName":"pharm1","password":"Secret1"}"#).unwrap();
        assert!(!request.remember_me);
        assert!(!format!("{request:?}").contains("Secret1"));
    }

    #[test]
    fn test_verify_token_maps_errors() {
        let credentials = MemoryCredentialStore::default();
        let tokens = issuer();
        let err = Authenticator::new(&credentials, &tokens)
            .verify_token("garbage")
            .unwrap_err();
        assert!(matches!(err, AccountError::Token(_)));
    }
}
