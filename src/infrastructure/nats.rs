//! Domain event publishing over NATS.

use crate::domain::events::DomainEvent;

/// Publishes events when a NATS client is configured; otherwise events are only logged.
#[derive(Clone, Default)]
pub struct EventPublisher { client: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(client: Option<async_nats::Client>) -> Self { Self { client } }

    pub fn disabled() -> Self { Self::default() }

    pub async fn connect(url: &str) -> Self {
        match async_nats::connect(url).await {
            Ok(client) => { tracing::info!(%url, "connected to NATS"); Self::new(Some(client)) }
            Err(e) => { tracing::warn!(%url, error = %e, "NATS unavailable, events will only be logged"); Self::disabled() }
        }
    }

    /// Best effort: a failed publish is logged and never fails the request.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { tracing::error!(subject, error = %e, "failed to encode event"); continue; }
            };
            tracing::debug!(subject, "domain event");
            let Some(client) = &self.client else { continue };
            if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                tracing::warn!(subject, error = %e, "failed to publish event");
            }
        }
    }
}
