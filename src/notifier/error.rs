//! Error types for outcome notification.
//!
//! None of these ever changes a job's outcome; the orchestrator only records
//! and logs them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// No mail server configured; notifications are dropped.
    #[error("mail transport is not configured")]
    NotConfigured,

    /// Sender or recipient address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    /// The message could not be assembled.
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    /// The SMTP exchange failed (connection, TLS, authentication, rejection).
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_display() {
        assert_eq!(
            NotifyError::NotConfigured.to_string(),
            "mail transport is not configured"
        );
    }

    #[test]
    fn invalid_address_from_parse() {
        let err: NotifyError = "not an address"
            .parse::<lettre::Address>()
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("invalid address"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NotifyError>();
    }
}
