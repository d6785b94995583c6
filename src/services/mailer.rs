use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

static ACTIVATION_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/accounts/activate/)\S+").expect("activation path pattern"));

/// Masks the uid and token of activation links so bodies can be logged.
pub fn redact_activation_links(body: &str) -> String {
    ACTIVATION_PATH_RE
        .replace_all(body, "${1}[redacted]/")
        .into_owned()
}

/// Outgoing email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Delivery seam for account emails
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    smtp_host: String,
    smtp_port: u16,
}

impl LogMailer {
    pub fn new(smtp_host: impl Into<String>, smtp_port: u16) -> Self {
        Self {
            smtp_host: smtp_host.into(),
            smtp_port,
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::InvalidRecipient(message.to));
        }
        info!(
            smtp_host = %self.smtp_host,
            smtp_port = self.smtp_port,
            subject = %message.subject,
            "Email queued"
        );
        debug!(body = %redact_activation_links(&message.body), "Email body");
        Ok(())
    }
}

/// Builds the account activation email
pub fn activation_email(from: &str, to: &str, username: &str, link: &str) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Email confirmation".to_string(),
        body: format!(
            "Hi {username},\n\nPlease click on the link below to confirm your registration:\n{link}\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn log_mailer_accepts_valid_recipient() {
        let mailer = LogMailer::new("smtp.gmail.com", 587);
        let msg = activation_email("shop@example.com", "user@example.com", "user", "http://x/y");
        assert!(mailer.send(msg).await.is_ok());
    }

    #[tokio::test]
    async fn log_mailer_rejects_recipient_without_at() {
        let mailer = LogMailer::default();
        let msg = activation_email("shop@example.com", "nobody", "user", "http://x/y");
        assert_matches!(mailer.send(msg).await, Err(MailError::InvalidRecipient(_)));
    }

    #[test]
    fn logged_bodies_hide_activation_tokens() {
        let msg = activation_email(
            "shop@example.com",
            "user@example.com",
            "olena",
            "https://shop.example.com/accounts/activate/MTIz/c3x-9f2e1b7a4d/",
        );
        let logged = redact_activation_links(&msg.body);
        assert!(!logged.contains("c3x-9f2e1b7a4d"));
        assert!(!logged.contains("MTIz"));
        assert!(logged.contains("https://shop.example.com/accounts/activate/[redacted]/"));
        assert!(logged.starts_with("Hi olena"));
    }

    #[test]
    fn activation_email_contains_link() {
        let msg = activation_email(
            "shop@example.com",
            "user@example.com",
            "olena",
            "https://shop.example.com/accounts/activate/abc/token/",
        );
        assert_eq!(msg.subject, "Email confirmation");
        assert!(msg.body.contains("Hi olena"));
        assert!(msg
            .body
            .contains("https://shop.example.com/accounts/activate/abc/token/"));
    }
}
