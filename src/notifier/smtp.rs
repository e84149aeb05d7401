use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::error::NotifyError;
use super::message::OutcomeMessage;
use super::Transport;
use crate::config::SmtpConfig;

/// Sends outcome messages through an SMTP relay with STARTTLS and login.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from config. Fails if the relay or sender address is unusable.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        if config.host.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        let from: Mailbox = config.from_address.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

/// Assemble the MIME message for `outcome`.
pub fn build_email(from: &Mailbox, outcome: &OutcomeMessage) -> Result<Message, NotifyError> {
    let address: Address = outcome.to_address.parse()?;
    let name = if outcome.to_name.trim().is_empty() {
        None
    } else {
        Some(outcome.to_name.clone())
    };
    let email = Message::builder()
        .from(from.clone())
        .to(Mailbox::new(name, address))
        .subject(outcome.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(outcome.html_body.clone())?;
    Ok(email)
}

#[async_trait]
impl Transport for SmtpMailer {
    async fn send(&self, outcome: &OutcomeMessage) -> Result<(), NotifyError> {
        let email = build_email(&self.from, outcome)?;
        self.transport.send(email).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(to: &str) -> OutcomeMessage {
        OutcomeMessage {
            to_name: "Alice Example".into(),
            to_address: to.into(),
            subject: "Print Job Completed - report.pdf".into(),
            html_body: "<p>done</p>".into(),
        }
    }

    #[test]
    fn empty_host_is_not_configured() {
        let err = SmtpMailer::from_config(&SmtpConfig::default()).err().unwrap();
        assert!(matches!(err, NotifyError::NotConfigured));
    }

    #[test]
    fn bad_sender_address_is_rejected() {
        let config = SmtpConfig {
            host: "mail.example.com".into(),
            from_address: "nope".into(),
            ..SmtpConfig::default()
        };
        let err = SmtpMailer::from_config(&config).err().unwrap();
        assert!(matches!(err, NotifyError::InvalidAddress(_)));
    }

    #[test]
    fn builds_html_message() {
        let from: Mailbox = "Printer <printer@example.com>".parse().unwrap();
        let email = build_email(&from, &outcome("alice@example.com")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: Print Job Completed - report.pdf"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("alice@example.com"));
    }

    #[test]
    fn bad_recipient_fails_to_build() {
        let from: Mailbox = "printer@example.com".parse().unwrap();
        let err = build_email(&from, &outcome("not-an-address")).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress(_)));
    }
}
