use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

/// A `borrowing_requests` row: a time-limited grant to view a full document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccessRequest {
    pub id: i64,
    pub user_id: i64,
    pub thesis_id: i64,
    pub status: RequestStatus,
    pub request_date: DateTime<Utc>,
    pub approved_date: Option<DateTime<Utc>>,
    pub duration_days: i64,
    pub borrow_method: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewAccessRequest {
    pub user_id: i64,
    pub thesis_id: i64,
    pub status: RequestStatus,
    pub request_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_date: Option<DateTime<Utc>>,
    pub duration_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrow_method: Option<String>,
}

/// Where a (user, thesis) pair stands, as the viewer screen classifies it.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    None,
    Pending,
    Approved,
    Expired,
    Denied,
}

/// Latest request plus the read-time derived fields. Nothing here is persisted.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AccessStatus {
    pub state: AccessState,
    pub request: Option<AccessRequest>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub has_access: bool,
}

impl AccessStatus {
    pub fn none() -> Self {
        Self {
            state: AccessState::None,
            request: None,
            expiry_date: None,
            is_expired: false,
            has_access: false,
        }
    }

    /// Derive expiry and access from the most recent request at `now`.
    ///
    /// An approved row without `approved_date`, or whose duration puts the
    /// expiry outside the representable range, never grants access.
    pub fn evaluate(request: Option<AccessRequest>, now: DateTime<Utc>) -> Self {
        let Some(request) = request else {
            return Self::none();
        };

        let expiry_date = request
            .approved_date
            .and_then(|approved| {
                Duration::try_days(request.duration_days)
                    .and_then(|duration| approved.checked_add_signed(duration))
            });
        let is_expired = request.status == RequestStatus::Approved
            && expiry_date.map_or(true, |expiry| now > expiry);
        let has_access = request.status == RequestStatus::Approved && !is_expired;

        let state = match request.status {
            RequestStatus::Approved if is_expired => AccessState::Expired,
            RequestStatus::Approved => AccessState::Approved,
            RequestStatus::Pending => AccessState::Pending,
            RequestStatus::Denied => AccessState::Denied,
        };

        Self {
            state,
            request: Some(request),
            expiry_date,
            is_expired,
            has_access,
        }
    }
}
