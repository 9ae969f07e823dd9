//! Notification error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur while composing or delivering a notification.
///
/// These are always recovered by the caller that spawned the notification:
/// logged and swallowed, never surfaced as an order-placement failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A recipient or sender address could not be parsed.
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The message could not be built.
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// SMTP delivery failed.
    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Reading recipients or the feature flag failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Generic mailer failure (used by the in-memory mailer).
    #[error("mailer failure: {0}")]
    Mailer(String),
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
