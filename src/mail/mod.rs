//! Outgoing notification mail.
//!
//! Requests hand a rendered [`OutgoingMail`] to a [`MailQueue`]; the queue
//! only reports whether the hand-off succeeded. Delivery happens later on
//! a worker task through a [`Mailer`].

pub mod smtp;
pub mod templates;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

pub use smtp::SmtpMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub recipient: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),
    #[error("mail error: {0}")]
    Other(String),
}

/// Synchronous hand-off of a message for asynchronous delivery.
pub trait MailQueue: Send + Sync {
    fn enqueue(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Mailer used when no SMTP relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.recipient,
            subject = %mail.subject,
            body_length = mail.body.len(),
            "Mail logged (not sent)"
        );
        tracing::debug!(body = %mail.body, "Mail body");
        Ok(())
    }
}

/// Bounded in-process queue drained by a tokio worker.
pub struct ChannelQueue {
    sender: mpsc::Sender<OutgoingMail>,
}

impl ChannelQueue {
    /// Spawns the delivery worker; must be called inside a tokio runtime.
    pub fn spawn(mailer: Arc<dyn Mailer>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<OutgoingMail>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(mail) = receiver.recv().await {
                match mailer.send(&mail).await {
                    Ok(()) => tracing::debug!(to = %mail.recipient, "Mail delivered"),
                    Err(e) => tracing::error!(to = %mail.recipient, "Mail delivery failed: {e}"),
                }
            }
            tracing::info!("Mail queue closed");
        });

        Self { sender }
    }
}

impl MailQueue for ChannelQueue {
    fn enqueue(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sender.try_send(mail).map_err(|e| match e {
            TrySendError::Full(_) => MailError::Transport("mail queue is full".to_string()),
            TrySendError::Closed(_) => MailError::Other("mail queue is closed".to_string()),
        })
    }
}

/// Keeps every enqueued message in memory instead of delivering it.
#[doc(hidden)]
#[derive(Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl MailQueue for RecordingQueue {
    fn enqueue(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::Other("recording queue poisoned".to_string()))?
            .push(mail);
        Ok(())
    }
}

/// Rejects every message with the configured error.
#[doc(hidden)]
pub struct FailingQueue {
    error: MailError,
}

impl FailingQueue {
    pub fn new(error: MailError) -> Self {
        Self { error }
    }

    pub fn transport() -> Self {
        Self::new(MailError::Transport("connection refused".to_string()))
    }
}

impl MailQueue for FailingQueue {
    fn enqueue(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::warn!(to = %mail.recipient, "FailingQueue: rejecting mail");
        Err(self.error.clone())
    }
}
