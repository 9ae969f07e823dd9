//! Mailer trait and SMTP / in-memory implementations.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{NotifyError, Result};

/// A fully composed email, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Trait for sending composed emails.
///
/// The dispatcher hands over recipients, subject and body; the mailer owns
/// the transport. Connection configuration is supplied externally.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers the message to all recipients.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// SMTP connection configuration, supplied by the environment.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address placed in the `From` header.
    pub from: String,
}

/// Mailer delivering over SMTP with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Creates a mailer from the given configuration.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let from: Mailbox = config.from.parse().map_err(NotifyError::Address)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&message.subject);
        for recipient in &message.to {
            builder = builder.to(recipient.parse()?);
        }
        let email = builder.body(message.body.clone())?;

        self.transport.send(email).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<EmailMessage>,
    fail_on_send: bool,
}

/// In-memory mailer for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<RwLock<InMemoryMailerState>>,
}

impl InMemoryMailer {
    /// Creates a new in-memory mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mailer to fail on subsequent send calls.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns all sent messages.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(NotifyError::Mailer("simulated delivery failure".to_string()));
        }

        state.sent.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["admin@example.com".to_string()],
            subject: "subject".to_string(),
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn records_sent_messages() {
        let mailer = InMemoryMailer::new();

        mailer.send(&message()).await.unwrap();

        assert_eq!(mailer.sent_count(), 1);
        assert_eq!(mailer.sent()[0].subject, "subject");
    }

    #[tokio::test]
    async fn fail_toggle_rejects_sends() {
        let mailer = InMemoryMailer::new();
        mailer.set_fail_on_send(true);

        let result = mailer.send(&message()).await;
        assert!(result.is_err());
        assert_eq!(mailer.sent_count(), 0);
    }
}
