//! NATS `JetStream` publisher adapter.
//!
//! Each message goes to subject `{topic}.{partition}`, where the partition is
//! derived from the message key. One stream covers `{topic}.>`, so every
//! partition subject is persisted and replicated before it is acknowledged.
//!
//! Messages carry their outbox entry id as `Nats-Msg-Id`. A batch redelivered
//! after a relay crash is therefore de-duplicated by the broker within the
//! stream's duplicate window.

use std::num::NonZeroU32;

use async_nats::HeaderMap;
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::jetstream::stream::{Config as StreamConfig, StorageType};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use outbox_core::error::PublishError;
use outbox_core::publisher::{OutboundMessage, Publisher};

use crate::partition::partition_for;

/// Header carrying the bus-side de-duplication id.
pub const MESSAGE_ID_HEADER: &str = "Nats-Msg-Id";

/// Header carrying the partition key, for consumers that re-partition.
pub const KEY_HEADER: &str = "Outbox-Key";

/// Publishes outbox batches to `JetStream`, waiting for every ack.
#[derive(Debug, Clone)]
pub struct NatsPublisher {
    jetstream: JetStreamContext,
    partitions: NonZeroU32,
}

impl NatsPublisher {
    /// Connects to the NATS server at `url`.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if the connection cannot be established.
    pub async fn connect(url: &str, partitions: NonZeroU32) -> Result<Self, PublishError> {
        let client = async_nats::connect(url).await.map_err(PublishError::new)?;
        info!(url, "connected to NATS");
        Ok(Self::new(client, partitions))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: async_nats::Client, partitions: NonZeroU32) -> Self {
        Self {
            jetstream: jetstream::new(client),
            partitions,
        }
    }

    /// Looks up or creates the stream that stores `topic`.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if the stream can be neither found nor created.
    pub async fn ensure_stream(&self, topic: &str, replicas: usize) -> Result<(), PublishError> {
        let name = stream_name(topic);
        let config = StreamConfig {
            name: name.clone(),
            subjects: vec![format!("{topic}.>")],
            num_replicas: replicas,
            storage: StorageType::File,
            ..Default::default()
        };

        self.jetstream
            .get_or_create_stream(config)
            .await
            .map_err(PublishError::new)?;
        info!(stream = %name, topic, replicas, "JetStream stream ready");
        Ok(())
    }

    /// Returns the subject `message` is published to.
    #[must_use]
    pub fn subject_for(&self, message: &OutboundMessage) -> String {
        subject(message, self.partitions)
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, batch: &[OutboundMessage]) -> Result<(), PublishError> {
        // Send in slice order first so same-key messages reach the broker in
        // order, then collect the acks.
        let mut pending = Vec::with_capacity(batch.len());
        for message in batch {
            let ack = self
                .jetstream
                .publish_with_headers(
                    self.subject_for(message),
                    headers(message),
                    Bytes::copy_from_slice(&message.body),
                )
                .await
                .map_err(PublishError::new)?;
            pending.push(ack);
        }

        for ack in pending {
            ack.await.map_err(PublishError::new)?;
        }

        debug!(count = batch.len(), "batch acknowledged by JetStream");
        Ok(())
    }
}

fn subject(message: &OutboundMessage, partitions: NonZeroU32) -> String {
    let partition = partition_for(message.key.as_bytes(), partitions);
    format!("{}.{partition}", message.topic)
}

fn headers(message: &OutboundMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(MESSAGE_ID_HEADER, message.entry_id.to_string().as_str());
    headers.insert(KEY_HEADER, message.key.as_str());
    headers
}

/// Stream names may not contain `.`, `*`, `>` or whitespace.
fn stream_name(topic: &str) -> String {
    topic
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
