//! Scannable payload wire formats shared with the kiosk and printed labels.

use serde::{Deserialize, Serialize};

pub const THESIS_QR_VERSION: &str = "1.0";

/// Borrow token rendered on the phone and redeemed by the kiosk.
///
/// Field order matters to the kiosk firmware; keep it as declared.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BorrowQrPayload {
    #[serde(rename = "type")]
    pub kind: BorrowKind,
    pub transaction_id: String,
    pub user_id: i64,
    pub thesis_id: i64,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Expiry, epoch milliseconds.
    pub expires: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BorrowKind {
    Borrow,
}

/// View-navigation code printed on a thesis.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ThesisQrPayload {
    #[serde(rename = "type")]
    pub kind: ThesisKind,
    pub thesis_id: i64,
    pub action: QrAction,
    pub timestamp: i64,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThesisKind {
    Thesis,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QrAction {
    #[default]
    View,
    Borrow,
}

/// `BORROW_<epoch_ms>_<user_id>_<thesis_id>`
pub fn borrow_transaction_id(epoch_ms: i64, user_id: i64, thesis_id: i64) -> String {
    format!("BORROW_{}_{}_{}", epoch_ms, user_id, thesis_id)
}
