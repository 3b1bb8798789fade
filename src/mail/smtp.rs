use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{MailError, Mailer, OutgoingMail};
use crate::config::SmtpConfig;

/// Delivers mail through an SMTP relay (STARTTLS).
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| MailError::Other(format!("Invalid from address: {e}")))?;

        let has_username = !config.username.is_empty();
        if has_username != !config.password.is_empty() {
            return Err(MailError::Other(
                "SMTP username and password must both be provided or both be empty".to_string(),
            ));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(format!("Failed to create SMTP transport: {e}")))?
            .port(config.port);

        if has_username {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, "SMTP mailer configured");

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let to: Mailbox = mail
            .recipient
            .parse()
            .map_err(|e| MailError::Other(format!("Invalid recipient email: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str())
            .body(mail.body.clone())
            .map_err(|e| MailError::Other(format!("Failed to build email message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(format!("Failed to send email: {e}")))?;

        tracing::info!("Email sent to {} with subject: {}", mail.recipient, mail.subject);
        Ok(())
    }
}
