//! Command handlers for the payments context.
//!
//! Each handler validates the command, then hands the repository both the
//! mutation and the encoder for its event so they commit as one unit.

use outbox_core::clock::Clock;
use outbox_core::error::DomainError;

use crate::domain::commands::{CreatePayment, UpdatePaymentStatus};
use crate::domain::events::PaymentEvent;
use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::domain::repository::PaymentRepository;

/// Handles the `CreatePayment` command: validates it, then persists the
/// payment together with its `payment_created` outbox entry.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed input (nothing is
/// written), `DomainError::Encoding` if the event cannot be serialized, or
/// `DomainError::Infrastructure` if persistence fails.
pub async fn handle_create_payment(
    command: &CreatePayment,
    clock: &dyn Clock,
    repo: &dyn PaymentRepository,
) -> Result<Payment, DomainError> {
    let draft = NewPayment::new(
        command.user_id,
        command.amount,
        command.status.unwrap_or(PaymentStatus::Pending),
        clock.now(),
    )?;

    repo.insert_with_event(&draft, &|payment: &Payment| {
        PaymentEvent::PaymentCreated(payment.clone()).to_outbox_entry()
    })
    .await
}

/// Handles the `UpdatePaymentStatus` command: persists the new status
/// together with a `payment_updated` outbox entry carrying the updated
/// record.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the payment does not exist (nothing is
/// written), `DomainError::Encoding` if the event cannot be serialized, or
/// `DomainError::Infrastructure` if persistence fails.
pub async fn handle_update_payment_status(
    command: &UpdatePaymentStatus,
    clock: &dyn Clock,
    repo: &dyn PaymentRepository,
) -> Result<Payment, DomainError> {
    repo.update_status_with_event(
        command.payment_id,
        command.status,
        clock.now(),
        &|payment: &Payment| PaymentEvent::PaymentUpdated(payment.clone()).to_outbox_entry(),
    )
    .await
}
