//! Reqwest-backed webhook event consumer.
//!
//! This adapter owns transport details only: envelope serialisation, timeout
//! and HTTP error mapping. Receivers deduplicate on the envelope's event id,
//! which the delivery worker may send more than once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::json;

use crate::domain::OutboxEvent;
use crate::domain::ports::{EventConsumer, EventConsumerError};

/// Event consumer that POSTs a JSON envelope to one webhook endpoint.
pub struct WebhookEventConsumer {
    client: Client,
    endpoint: Url,
}

impl WebhookEventConsumer {
    /// Build a consumer using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl EventConsumer for WebhookEventConsumer {
    async fn consume(&self, event: &OutboxEvent) -> Result<(), EventConsumerError> {
        let envelope = json!({
            "eventId": event.id,
            "eventType": event.event_type.as_str(),
            "aggregateType": event.aggregate_type,
            "aggregateId": event.aggregate_id,
            "occurredAt": event.created_at,
            "payload": event.payload,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(map_status_error(status, body.as_ref()));
        }

        Ok(())
    }
}

fn map_transport_error(error: reqwest::Error) -> EventConsumerError {
    EventConsumerError::unreachable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> EventConsumerError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    if status.is_server_error() {
        EventConsumerError::unreachable(message)
    } else {
        EventConsumerError::rejected(message)
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
