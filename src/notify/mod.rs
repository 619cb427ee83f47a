//! Notification gateway
//!
//! Single-attempt outbound delivery of one message to a student. Every failure
//! aborts the caller's decision the same way; there is no retry or queueing here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{SessionContext, SessionError};

pub mod http;

pub use http::HttpNotificationGateway;

/// Wire shape accepted by the delivery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub message: String,
}

impl Notification {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Authentication required to send email: {0}")]
    Unauthorized(#[from] SessionError),
    #[error("Another email is already being sent")]
    Busy,
    #[error("Recipient address is missing")]
    MissingRecipient,
    #[error("Network error: {message}")]
    Transport { message: String },
    #[error("Delivery endpoint returned HTTP {status}{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Rejected { status: u16, detail: Option<String> },
}

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Sends one message using the session's bearer token.
    async fn send(&self, session: &SessionContext, notification: &Notification) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_includes_detail() {
        let err = NotifyError::Rejected {
            status: 502,
            detail: Some("mail relay down".to_string()),
        };
        assert_eq!(err.to_string(), "Delivery endpoint returned HTTP 502: mail relay down");

        let bare = NotifyError::Rejected { status: 500, detail: None };
        assert_eq!(bare.to_string(), "Delivery endpoint returned HTTP 500");
    }

    #[test]
    fn test_notification_wire_shape() {
        let json = serde_json::to_value(Notification::new("a@b.c", "Hi", "Body")).unwrap();
        assert_eq!(json, serde_json::json!({"to": "a@b.c", "subject": "Hi", "message": "Body"}));
    }
}
