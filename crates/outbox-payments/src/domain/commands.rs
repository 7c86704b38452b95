//! Commands for the payments context.

use uuid::Uuid;

use super::payment::PaymentStatus;

/// Command to create a payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Paying user.
    pub user_id: i64,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Initial status; `pending` when absent.
    pub status: Option<PaymentStatus>,
}

/// Command to move a payment to a new status.
#[derive(Debug, Clone)]
pub struct UpdatePaymentStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The payment to update.
    pub payment_id: i64,
    /// Target status.
    pub status: PaymentStatus,
}
