//! Shared test doubles for the outbox workspace.

mod clock;
mod outbox;
mod payments;
mod publisher;

pub use clock::{FixedClock, SteppingClock};
pub use outbox::{InMemoryOutboxStore, StoredEntry};
pub use payments::{FailingPaymentRepository, InMemoryPaymentRepository};
pub use publisher::{FailingPublisher, RecordingPublisher, StalledPublisher};
