//! Outbox entry model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;

/// An entry about to be appended to the outbox, inside the same transaction
/// as the domain mutation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxEntry {
    /// Globally unique, time-ordered identifier.
    pub id: Uuid,
    /// The record that produced the event. Used as the partition key.
    pub entity_id: i64,
    /// Event category; one bus topic per category.
    pub topic: String,
    /// Serialized event envelope.
    pub payload: String,
    /// Defines global delivery order.
    pub created_at: DateTime<Utc>,
}

impl NewOutboxEntry {
    /// Serializes `event` as the payload of a new entry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Encoding` if the event cannot be serialized.
    pub fn encode<E: Serialize>(
        entity_id: i64,
        topic: impl Into<String>,
        event: &E,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let payload = serde_json::to_string(event)?;
        Ok(Self {
            id: Uuid::now_v7(),
            entity_id,
            topic: topic.into(),
            payload,
            created_at,
        })
    }
}

/// A pending entry as returned by a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Partition key source.
    pub entity_id: i64,
    /// Event category.
    pub topic: String,
    /// Serialized event envelope, published verbatim.
    pub payload: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Publish attempts that already failed.
    pub attempts: u32,
}

impl From<NewOutboxEntry> for OutboxEntry {
    fn from(entry: NewOutboxEntry) -> Self {
        Self {
            id: entry.id,
            entity_id: entry.entity_id,
            topic: entry.topic,
            payload: entry.payload,
            created_at: entry.created_at,
            attempts: 0,
        }
    }
}
