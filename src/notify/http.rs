// HTTP transport for the notification gateway: POST {to, subject, message} with a bearer token

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{Notification, NotificationGateway, NotifyError};
use crate::session::SessionContext;
use crate::single_flight::SingleFlight;

#[derive(Debug)]
pub struct HttpNotificationGateway {
    client: reqwest::Client,
    endpoint: String,
    in_flight: SingleFlight,
}

impl HttpNotificationGateway {
    /// `timeout` of `None` leaves the transport's default in place.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, NotifyError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| NotifyError::Transport {
            message: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            in_flight: SingleFlight::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_busy()
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send(&self, session: &SessionContext, notification: &Notification) -> Result<(), NotifyError> {
        let _flight = self.in_flight.try_begin().ok_or(NotifyError::Busy)?;

        session.ensure_valid()?;
        if notification.to.trim().is_empty() {
            return Err(NotifyError::MissingRecipient);
        }

        debug!(endpoint = %self.endpoint, to = %notification.to, "Sending notification");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&session.access_token)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Notification transport failed");
                NotifyError::Transport { message: e.to_string() }
            })?;

        let status = response.status();
        let body: Option<serde_json::Value> = response.json().await.ok();

        if !status.is_success() {
            let detail = body
                .as_ref()
                .and_then(|b| b.get("error"))
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .or_else(|| status.canonical_reason().map(str::to_string));
            error!(status = status.as_u16(), detail = ?detail, "Notification rejected");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        info!(to = %notification.to, subject = %notification.subject, "Email sent successfully");
        Ok(())
    }
}
