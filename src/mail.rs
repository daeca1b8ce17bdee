//! Outgoing email.
//!
//! `LogMailer` is the default sender and only writes messages to the log.
//! `InMemoryMailer` keeps an outbox so tests and local tooling can read what
//! would have been sent.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::shared::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Link the recipient follows to finish the flow
    pub action_url: String,
}

impl EmailMessage {
    pub fn reset_password(to: &str, client_url: &str, token: &str) -> Self {
        let action_url = format!("{}/reset-password?token={}", client_url, token);
        Self {
            to: to.to_string(),
            subject: "Reset password".to_string(),
            body: format!(
                "To reset your password, open the following link: {}\nIf you did not request a password reset, ignore this email.",
                action_url
            ),
            action_url,
        }
    }

    pub fn verify_email(to: &str, client_url: &str, token: &str) -> Self {
        let action_url = format!("{}/verify-email?token={}", client_url, token);
        Self {
            to: to.to_string(),
            subject: "Email verification".to_string(),
            body: format!(
                "To verify your email, open the following link: {}\nIf you did not create an account, ignore this email.",
                action_url
            ),
            action_url,
        }
    }

    /// Extracts the token query parameter from the action link
    pub fn token(&self) -> Option<&str> {
        self.action_url
            .split_once("token=")
            .map(|(_, token)| token)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError>;
}

/// Writes outgoing messages to the log without delivering them
#[derive(Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        info!(to = %message.to, "Email queued for delivery");
        Ok(())
    }
}

/// Records every message in an outbox
#[derive(Default)]
pub struct InMemoryMailer {
    outbox: RwLock<Vec<EmailMessage>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self {
            outbox: RwLock::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.read().await.clone()
    }

    pub async fn last_sent_to(&self, to: &str) -> Option<EmailMessage> {
        self.outbox
            .read()
            .await
            .iter()
            .rev()
            .find(|message| message.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        self.outbox.write().await.push(message);
        Ok(())
    }
}
