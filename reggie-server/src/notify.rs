//! Delivery of login verification codes.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("failed to deliver message: {0}")]
    Transport(String),
}

#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send_code(&self, recipient: &str, code: &str) -> Result<(), NotifyError>;
}

/// Writes codes to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send_code(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        info!("Verification code for {}: {}", recipient, code);
        Ok(())
    }
}

/// Sends codes by email over STARTTLS.
pub struct SmtpCodeSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpCodeSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.port);
        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl CodeSender for SmtpCodeSender {
    async fn send_code(&self, recipient: &str, code: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from.clone()))?,
            )
            .to(recipient
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(recipient.to_string()))?)
            .subject("Your Reggie Takeout login code")
            .header(ContentType::TEXT_HTML)
            .body(code_email_body(code))
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        info!("Sent verification code to {}", recipient);
        Ok(())
    }
}

pub fn code_email_body(code: &str) -> String {
    format!(
        "<p>Welcome to Reggie Takeout.</p>\
         <p>Your login code is <strong>{}</strong>. It expires in 5 minutes.</p>\
         <p>If you did not request it, ignore this email.</p>",
        code
    )
}
