use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::qr::BorrowQrPayload;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Failed => "failed",
        }
    }
}

/// A `borrow_transactions` row. Redeemed at most once: pending -> approved.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BorrowTransaction {
    pub transaction_id: String,
    pub user_id: i64,
    pub thesis_id: i64,
    pub status: TransactionStatus,
    pub qr_data: BorrowQrPayload,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl BorrowTransaction {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The raw string decoded by the kiosk scanner.
    pub payload: String,
}

/// Kiosk-facing confirmation of a successful redemption.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BorrowReceipt {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,
    pub thesis_title: String,
    pub user_name: String,
}
