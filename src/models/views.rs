use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record written when a document finished downloading for display.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThesisView {
    pub user_id: i64,
    pub thesis_id: i64,
    pub viewed_at: DateTime<Utc>,
}
