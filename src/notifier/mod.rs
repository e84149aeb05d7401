//! Best-effort outcome notification to the job's submitter.
//!
//! [`OutcomeNotifier`] renders one of two templates and hands the result to a
//! [`Transport`]. Delivery errors are logged here and returned for the audit
//! record; they never change a job's outcome.

pub mod error;
pub mod message;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

pub use error::NotifyError;
pub use message::{MessageContext, OutcomeMessage};
pub use smtp::SmtpMailer;

use crate::config::PaygConfig;

/// The notification channel: send one message, report ok or failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &OutcomeMessage) -> Result<(), NotifyError>;
}

/// Transport used when no mail server is configured.
pub struct UnconfiguredTransport;

#[async_trait]
impl Transport for UnconfiguredTransport {
    async fn send(&self, _message: &OutcomeMessage) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

/// Recipient of an outcome message.
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    pub name: &'a str,
    pub address: &'a str,
}

pub struct OutcomeNotifier {
    transport: Arc<dyn Transport>,
    site_location: String,
    printer_name: String,
    success_subject: String,
    error_subject: String,
    support_address: Option<String>,
}

impl OutcomeNotifier {
    pub fn new(transport: Arc<dyn Transport>, config: &PaygConfig) -> Self {
        Self {
            transport,
            site_location: config.site_location.clone(),
            printer_name: config.printer_name.clone(),
            success_subject: config.smtp.success_subject.clone(),
            error_subject: config.smtp.error_subject.clone(),
            support_address: config.smtp.support_address.clone(),
        }
    }

    fn context<'a>(&'a self, recipient: Recipient<'a>, file_name: &'a str) -> MessageContext<'a> {
        MessageContext {
            recipient_name: recipient.name,
            file_name,
            site_location: &self.site_location,
            printer_name: &self.printer_name,
            support_address: self.support_address.as_deref(),
        }
    }

    /// Tell the submitter their file was printed.
    pub async fn notify_success(
        &self,
        recipient: Recipient<'_>,
        file_name: &str,
    ) -> Result<(), NotifyError> {
        let ctx = self.context(recipient, file_name);
        let message = OutcomeMessage {
            to_name: recipient.name.to_string(),
            to_address: recipient.address.to_string(),
            subject: message::render_subject(&self.success_subject, file_name),
            html_body: message::success_body(&ctx),
        };
        self.deliver(message, "success").await
    }

    /// Tell the submitter their file failed, and why.
    pub async fn notify_failure(
        &self,
        recipient: Recipient<'_>,
        file_name: &str,
        reason: &str,
    ) -> Result<(), NotifyError> {
        let ctx = self.context(recipient, file_name);
        let message = OutcomeMessage {
            to_name: recipient.name.to_string(),
            to_address: recipient.address.to_string(),
            subject: message::render_subject(&self.error_subject, file_name),
            html_body: message::failure_body(&ctx, reason),
        };
        self.deliver(message, "failure").await
    }

    async fn deliver(&self, message: OutcomeMessage, template: &str) -> Result<(), NotifyError> {
        match self.transport.send(&message).await {
            Ok(()) => {
                info!(to = %message.to_address, template, "notification sent");
                Ok(())
            }
            Err(e) => {
                warn!(to = %message.to_address, template, error = %e, "notification failed");
                Err(e)
            }
        }
    }
}
