//! NATS delivery of rumor notifications.
//!
//! Every successful spread publishes the listener's
//! [`RumorNotification`] as JSON on `{prefix}.rumors.{entity_id}`, so NPC
//! memory and dialogue services can subscribe per entity or to
//! `{prefix}.rumors.>` for all of them.

use hearsay_rumor::RumorNotifier;
use hearsay_types::{EntityId, RumorNotification};
use tracing::{info, warn};

use crate::error::EngineError;

/// Publishes rumor notifications to NATS (fire-and-forget).
pub struct NatsNotifier {
    client: async_nats::Client,
    prefix: String,
}

impl NatsNotifier {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, EngineError> {
        info!(url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to connect to {url}: {e}"),
            })?;
        info!(prefix, "NATS rumor notifications enabled");
        Ok(Self {
            client,
            prefix: prefix.to_owned(),
        })
    }
}

/// The subject a notification for `entity_id` is published on.
pub fn subject_for(prefix: &str, entity_id: EntityId) -> String {
    format!("{prefix}.rumors.{entity_id}")
}

impl RumorNotifier for NatsNotifier {
    fn push_rumor(&self, entity_id: EntityId, notification: &RumorNotification) {
        let subject = subject_for(&self.prefix, entity_id);
        match serde_json::to_vec(notification) {
            Ok(payload) => {
                let client = self.client.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                        warn!(subject, error = %e, "failed to publish rumor notification");
                    }
                });
            }
            Err(e) => {
                warn!(
                    entity_id = %entity_id,
                    rumor_id = %notification.rumor_id,
                    error = %e,
                    "failed to serialize rumor notification"
                );
            }
        }
    }
}
