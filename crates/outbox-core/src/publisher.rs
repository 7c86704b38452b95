//! Publisher contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entry::OutboxEntry;
use crate::error::PublishError;

/// A message ready for the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The outbox entry this message was built from. Used as the bus-side
    /// de-duplication id.
    pub entry_id: Uuid,
    /// Bus topic.
    pub topic: String,
    /// Partition/routing key: the stringified `entity_id`.
    pub key: String,
    /// Message body, the entry payload verbatim.
    pub body: Vec<u8>,
}

impl From<&OutboxEntry> for OutboundMessage {
    fn from(entry: &OutboxEntry) -> Self {
        Self {
            entry_id: entry.id,
            topic: entry.topic.clone(),
            key: entry.entity_id.to_string(),
            body: entry.payload.as_bytes().to_vec(),
        }
    }
}

/// Delivers one dispatcher batch to the bus as a single acknowledged unit.
///
/// Implementations must hand messages sharing a key to the bus in slice
/// order.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `batch`, returning only once every message is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if any message is not acknowledged.
    async fn publish(&self, batch: &[OutboundMessage]) -> Result<(), PublishError>;
}
