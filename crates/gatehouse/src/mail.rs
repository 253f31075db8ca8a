//! Outbound mail.
//!
//! Delivery is behind the `Mailer` trait. `SmtpMailer` relays through an
//! SMTP server with STARTTLS when credentials are configured; `LogMailer`
//! writes messages to the log instead, for development setups without SMTP.

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use crate::config::MailConfig;

/// A plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;

    /// Short transport name for logs
    fn transport_name(&self) -> &'static str;
}

/// Pick the SMTP relay when a login is configured, else log-only delivery
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.smtp_credentials() {
        Some((username, password)) => {
            let mailer = SmtpMailer::new(&config.smtp_host, config.smtp_port, username, password)?;
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::warn!("No SMTP username configured, mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Mailer relaying through an authenticated SMTP server
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the relay. Connections are opened per message, not here.
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("Invalid SMTP relay {}", host))?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        tracing::info!(host = %host, port = port, "SMTP mailer configured");
        Ok(Self { transport })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let email = Message::builder()
            .from(message.from.parse().context("Invalid sender address")?)
            .to(message.to.parse().context("Invalid recipient address")?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("Failed to build mail")?;

        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;

        tracing::info!(to = %message.to, subject = %message.subject, "Mail sent");
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}

/// Mailer that only logs
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        tracing::info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "Mail delivery (log only)"
        );
        tracing::debug!(body = %message.body, "Mail body");
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "log"
    }
}

/// Password reset mail carrying the signed link
pub fn reset_password_mail(
    sender: &str,
    recipient: &str,
    public_base_url: &str,
    token: &str,
    valid_for_secs: u64,
) -> MailMessage {
    let link = format!(
        "{}/reset_password/{}",
        public_base_url.trim_end_matches('/'),
        token
    );
    MailMessage {
        from: sender.to_string(),
        to: recipient.to_string(),
        subject: "Password Reset - Flash Notes".to_string(),
        body: format!(
            "Hello,\n\nClick below to reset your password:\n{}\n\nLink valid for {} minutes.\n\n- Flash Notes Team",
            link,
            valid_for_secs / 60
        ),
    }
}

/// OTP mail, sent to the email address registered for the mobile number
pub fn otp_mail(sender: &str, recipient: &str, otp: &str, valid_for_secs: u64) -> MailMessage {
    MailMessage {
        from: sender.to_string(),
        to: recipient.to_string(),
        subject: "Your Flash Notes OTP".to_string(),
        body: format!("Your OTP is: {} (valid {} minutes).", otp, valid_for_secs / 60),
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every message it is asked to send
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &MailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn transport_name(&self) -> &'static str {
            "recording"
        }
    }

    /// Always fails, to exercise error paths
    pub struct BrokenMailer;

    #[async_trait::async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _message: &MailMessage) -> Result<()> {
            anyhow::bail!("SMTP unavailable")
        }

        fn transport_name(&self) -> &'static str {
            "broken"
        }
    }
}
