//! Domain events for the payments context.

use outbox_core::entry::NewOutboxEntry;
use outbox_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::payment::Payment;

/// Bus topic carrying every payment event.
pub const PAYMENT_EVENTS_TOPIC: &str = "payment-events";

/// Event envelope, serialized as `{"type": ..., "data": <payment>}`. The
/// payment is the post-mutation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// A payment was created.
    PaymentCreated(Payment),
    /// A payment's status changed.
    PaymentUpdated(Payment),
}

impl PaymentEvent {
    /// Returns the event type tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PaymentCreated(_) => "payment_created",
            Self::PaymentUpdated(_) => "payment_updated",
        }
    }

    /// The payment snapshot carried by the event.
    #[must_use]
    pub fn payment(&self) -> &Payment {
        match self {
            Self::PaymentCreated(payment) | Self::PaymentUpdated(payment) => payment,
        }
    }

    /// Builds the outbox entry announcing this event. The entry is keyed by
    /// the payment id and stamped with the mutation time.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Encoding` if serialization fails.
    pub fn to_outbox_entry(&self) -> Result<NewOutboxEntry, DomainError> {
        let payment = self.payment();
        NewOutboxEntry::encode(
            payment.id,
            PAYMENT_EVENTS_TOPIC,
            self,
            payment.updated_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use chrono::{TimeZone, Utc};

    fn payment() -> Payment {
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();
        Payment {
            id: 41,
            user_id: 7,
            amount: 1_999,
            status: PaymentStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_envelope_uses_type_and_data_fields() {
        let event = PaymentEvent::PaymentCreated(payment());

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "payment_created");
        assert_eq!(value["data"]["id"], 41);
        assert_eq!(value["data"]["status"], "pending");
        assert_eq!(value["data"]["amount"], 1_999);
    }

    #[test]
    fn test_event_type_matches_serialized_tag() {
        let event = PaymentEvent::PaymentUpdated(payment());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
    }

    #[test]
    fn test_outbox_entry_is_keyed_by_payment_and_stamped_with_update_time() {
        let snapshot = payment();
        let event = PaymentEvent::PaymentUpdated(snapshot.clone());

        let entry = event.to_outbox_entry().unwrap();

        assert_eq!(entry.entity_id, snapshot.id);
        assert_eq!(entry.topic, PAYMENT_EVENTS_TOPIC);
        assert_eq!(entry.created_at, snapshot.updated_at);
        let decoded: PaymentEvent = serde_json::from_str(&entry.payload).unwrap();
        assert_eq!(decoded, event);
    }
}
