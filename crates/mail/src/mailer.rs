//! Mail transport boundary.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    #[error("invalid mail payload: {0}")]
    InvalidPayload(String),

    #[error("mail transport failed: {0}")]
    Transport(String),
}

impl MailError {
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// A rendered-template request: the transport picks `template` and fills it
/// with `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Recipient as `"Name <email>"`.
    pub to: String,
    pub subject: String,
    pub template: String,
    pub context: JsonValue,
}

/// Sends one message. Implementations must be shareable across worker threads.
pub trait Mailer: Send + Sync {
    fn send_mail(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_mail(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            template = %message.template,
            "mail sent"
        );
        debug!(context = %message.context, "mail context");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Outbox {
    sent: Vec<MailMessage>,
    attempts: usize,
    failure: Option<String>,
}

/// Records messages in memory; can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct InMemoryMailer {
    outbox: Mutex<Outbox>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        let mailer = Self::new();
        mailer.set_failure(Some(reason.into()));
        mailer
    }

    pub fn set_failure(&self, failure: Option<String>) {
        self.lock().failure = failure;
    }

    /// Messages delivered so far, in send order.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.lock().sent.clone()
    }

    /// Every call to `send_mail`, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Mailer for InMemoryMailer {
    fn send_mail(&self, message: &MailMessage) -> Result<(), MailError> {
        let mut outbox = self.lock();
        outbox.attempts += 1;
        if let Some(reason) = &outbox.failure {
            return Err(MailError::transport(reason.clone()));
        }
        outbox.sent.push(message.clone());
        Ok(())
    }
}
