//! Account notification emails.
//!
//! Uses SMTP via lettre for delivery with Askama templates. [`QueuedNotifier`]
//! runs deliveries on a background task so provisioning never waits on SMTP
//! unless it asks to.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pharma_link_core::{Email, Role};

use crate::config::EmailConfig;
use crate::services::accounts::Notifier;

/// HTML template for the account-created email.
#[derive(Template)]
#[template(path = "email/account_created.html")]
struct AccountCreatedHtml<'a> {
    subject: &'a str,
    intro: &'a str,
    username: &'a str,
    password: &'a str,
    login_url: &'a str,
}

/// Plain text template for the account-created email.
#[derive(Template)]
#[template(path = "email/account_created.txt")]
struct AccountCreatedText<'a> {
    intro: &'a str,
    username: &'a str,
    password: &'a str,
    login_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Delivery could not be attempted.
    #[error("Delivery unavailable: {0}")]
    Unavailable(String),
}

/// A rendered email ready for delivery.
#[derive(Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bodies carry the initial password.
        f.debug_struct("Notification")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl Notification {
    /// Welcome email for a newly provisioned account, carrying its initial password.
    ///
    /// Wording depends on the role: pharmacies were approved from a request,
    /// companies were added by an administrator.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if rendering fails.
    pub fn account_created(
        role: Role,
        to: &Email,
        username: &str,
        password: &str,
        login_url: &str,
    ) -> Result<Self, EmailError> {
        let (subject, intro) = match role {
            Role::Pharmacy => (
                "Your Pharma Link pharmacy account is ready",
                "Your pharmacy registration request has been accepted.",
            ),
            Role::Company => (
                "Your Pharma Link company account is ready",
                "Your company account has been added to Pharma Link.",
            ),
            Role::Admin => (
                "Your Pharma Link administrator account is ready",
                "An administrator account has been created for you.",
            ),
        };

        let html_body = AccountCreatedHtml {
            subject,
            intro,
            username,
            password,
            login_url,
        }
        .render()?;
        let text_body = AccountCreatedText {
            intro,
            username,
            password,
            login_url,
        }
        .render()?;

        Ok(Self {
            to: to.as_str().to_owned(),
            subject: subject.to_owned(),
            text_body,
            html_body,
        })
    }
}

/// Something that can put a [`Notification`] on the wire.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), EmailError>;
}

/// Email service for sending transactional emails over SMTP.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn deliver(&self, notification: &Notification) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(notification
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(notification.to.clone()))?)
            .subject(&notification.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(notification.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(notification.html_body.clone()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %notification.to, subject = %notification.subject, "Email sent successfully");
        Ok(())
    }
}

/// [`Notifier`] that hands detached sends to a background delivery task.
#[derive(Clone)]
pub struct QueuedNotifier {
    mailer: Arc<dyn Mailer>,
    queue: mpsc::UnboundedSender<Notification>,
}

impl QueuedNotifier {
    /// Start the delivery task.
    ///
    /// The task exits once every `QueuedNotifier` clone is dropped and the
    /// queue has drained.
    #[must_use]
    pub fn spawn(mailer: Arc<dyn Mailer>) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_delivery(Arc::clone(&mailer), rx));
        (Self { mailer, queue }, worker)
    }
}

async fn run_delivery(mailer: Arc<dyn Mailer>, mut rx: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        if let Err(e) = mailer.deliver(&notification).await {
            tracing::warn!(
                to = %notification.to,
                subject = %notification.subject,
                error = %e,
                "Detached notification failed"
            );
        }
    }
    tracing::debug!("Notification queue closed");
}

#[async_trait]
impl Notifier for QueuedNotifier {
    fn send_detached(&self, notification: Notification) {
        if let Err(e) = self.queue.send(notification) {
            tracing::warn!(to = %e.0.to, "Notification queue closed, dropping email");
        }
    }

    async fn send(&self, notification: Notification) -> Result<(), EmailError> {
        self.mailer.deliver(&notification).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::services::accounts::memory::RecordingMailer;

    use super::*;

    fn notification(to: &str) -> Notification {
        Notification::account_created(
            Role::Pharmacy,
            &Email::parse(to).unwrap(),
            "pharm1",
            "Secret1",
            "https://pharmalink.test/login",
        )
        .unwrap()
    }

    #[test]
    fn test_account_created_renders_credentials() {
        let n = notification("p1@x.com");
        assert_eq!(n.to, "p1@x.com");
        assert!(n.subject.contains("pharmacy"));
        assert!(n.text_body.contains("Username: pharm1"));
        assert!(n.text_body.contains("Password: Secret1"));
        assert!(n.text_body.contains("https://pharmalink.test/login"));
    }

    #[test]
    fn test_account_created_wording_follows_role() {
        let to = Email::parse("c1@x.com").unwrap();
        let company =
            Notification::account_created(Role::Company, &to, "comp1", "Secret1", "/login").unwrap();
        assert!(company.subject.contains("company"));
        assert!(company.text_body.contains("added to Pharma Link"));
    }

    #[test]
    fn test_html_body_escapes_username() {
        let to = Email::parse("p1@x.com").unwrap();
        let n = Notification::account_created(Role::Pharmacy, &to, "<b>x</b>", "Secret1", "/login")
            .unwrap();
        assert!(!n.html_body.contains("<b>x</b>"));
        assert!(n.text_body.contains("<b>x</b>"));
    }

    #[test]
    fn test_debug_hides_bodies() {
        let debug_output = format!("{:?}", notification("p1@x.com"));
        assert!(debug_output.contains("p1@x.com"));
        assert!(!debug_output.contains("Secret1"));
    }

    #[tokio::test]
    async fn test_detached_send_is_delivered_by_worker() {
        let mailer = Arc::new(RecordingMailer::default());
        let (notifier, worker) = QueuedNotifier::spawn(mailer.clone());

        notifier.send_detached(notification("p1@x.com"));
        drop(notifier);
        worker.await.unwrap();

        assert_eq!(mailer.delivered().len(), 1);
        assert_eq!(mailer.delivered()[0].to, "p1@x.com");
    }

    #[tokio::test]
    async fn test_detached_failure_is_swallowed() {
        let mailer = Arc::new(RecordingMailer::failing());
        let (notifier, worker) = QueuedNotifier::spawn(mailer.clone());

        notifier.send_detached(notification("p1@x.com"));
        notifier.send_detached(notification("p2@x.com"));
        drop(notifier);
        worker.await.unwrap();

        assert_eq!(mailer.attempts(), 2);
        assert!(mailer.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_send_reports_failure() {
        let mailer = Arc::new(RecordingMailer::failing());
        let (notifier, _worker) = QueuedNotifier::spawn(mailer);

        let result = notifier.send(notification("c1@x.com")).await;
        assert!(matches!(result, Err(EmailError::Unavailable(_))));
    }
}
