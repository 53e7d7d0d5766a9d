use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::theses::Thesis;

/// Scan history row; one per (user, thesis).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScannedThesis {
    pub id: i64,
    pub user_id: i64,
    pub thesis_id: i64,
    pub scanned_at: DateTime<Utc>,
}

/// How a raw scanned payload was resolved.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    QrPayload,
    StorageUrl,
    RawIdentifier,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub thesis: Thesis,
    pub source: ScanSource,
    /// The time written to the history row.
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct RecentScan {
    pub scanned_at: DateTime<Utc>,
    pub thesis: Thesis,
}
