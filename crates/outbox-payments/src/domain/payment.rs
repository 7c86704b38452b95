//! The payment record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use outbox_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Accepted, not yet authorized.
    Pending,
    /// Funds reserved.
    Authorized,
    /// Funds captured.
    Completed,
    /// Declined or errored.
    Failed,
    /// Funds returned.
    Refunded,
}

impl PaymentStatus {
    /// Returns the stored/wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "authorized" => Ok(Self::Authorized),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(DomainError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// A persisted payment. Also the snapshot carried by every payment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Store-assigned identifier; the outbox partition key.
    pub id: i64,
    /// Paying user.
    pub user_id: i64,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Current status.
    pub status: PaymentStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the latest mutation.
    pub updated_at: DateTime<Utc>,
}

/// A validated payment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Paying user.
    pub user_id: i64,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Initial status.
    pub status: PaymentStatus,
    /// Creation time; also the initial `updated_at`.
    pub created_at: DateTime<Utc>,
}

impl NewPayment {
    /// Validates and builds a new payment.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `user_id` or `amount` is not
    /// positive.
    pub fn new(
        user_id: i64,
        amount: i64,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if user_id <= 0 {
            return Err(DomainError::Validation(format!(
                "user_id must be positive, got {user_id}"
            )));
        }
        if amount <= 0 {
            return Err(DomainError::Validation(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            user_id,
            amount,
            status,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Authorized,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let err = "settled".parse::<PaymentStatus>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::Authorized).unwrap();
        assert_eq!(json, r#""authorized""#);
    }

    #[test]
    fn test_new_payment_rejects_non_positive_amount() {
        let err = NewPayment::new(1, 0, PaymentStatus::Pending, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("amount")));
    }

    #[test]
    fn test_new_payment_rejects_non_positive_user() {
        let err = NewPayment::new(-3, 100, PaymentStatus::Pending, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("user_id")));
    }

    #[test]
    fn test_new_payment_accepts_valid_input() {
        let now = Utc::now();
        let draft = NewPayment::new(9, 2_500, PaymentStatus::Pending, now).unwrap();
        assert_eq!(draft.user_id, 9);
        assert_eq!(draft.amount, 2_500);
        assert_eq!(draft.created_at, now);
    }
}
