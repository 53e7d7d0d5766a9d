//! Remote Data Gateway: row-oriented access to the backend's collections and
//! object storage.
//!
//! The core never talks to a concrete backend. It reads and writes JSON rows
//! through [`Gateway`], so any store that can filter, update, insert with a
//! returned row, count and issue signed URLs can sit behind it.

mod memory;
mod postgrest;

pub use memory::InMemoryGateway;
pub use postgrest::PostgrestGateway;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Theses,
    ScannedTheses,
    BorrowingRequests,
    BorrowTransactions,
    AdminNotifications,
    ThesisViews,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Theses => "thesestwo",
            Self::ScannedTheses => "scanned_theses",
            Self::BorrowingRequests => "borrowing_requests",
            Self::BorrowTransactions => "borrow_transactions",
            Self::AdminNotifications => "admin_notifications",
            Self::ThesisViews => "thesis_views",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Lt,
    /// Case-insensitive pattern match, `%` matches any run of characters.
    ILike,
    In,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::ILike => "ilike",
            Self::In => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lt, value)
    }

    pub fn ilike(column: &str, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOp::ILike, Value::String(pattern.into()))
    }

    pub fn one_of(column: &str, values: Vec<Value>) -> Self {
        Self::new(column, FilterOp::In, Value::Array(values))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with {status}: {body}")]
    Status { status: u16, body: String },
    /// A unique constraint on the backend rejected the write.
    #[error("write conflicts with an existing row: {0}")]
    Conflict(String),
    #[error("unexpected backend payload: {0}")]
    Decode(String),
    #[error("storage object not found: {0}")]
    ObjectNotFound(String),
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, GatewayError>;

    /// Insert one row and return it as stored (with generated columns).
    async fn insert(&self, table: Table, row: Value) -> Result<Value, GatewayError>;

    /// Apply `patch` to every row matching `filters`, returning the updated rows.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, GatewayError>;

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, GatewayError>;

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, GatewayError>;

    /// Conditional update: set `column` to `new` only where it still equals
    /// `expected`. Returns whether a row was swapped.
    async fn compare_and_swap(
        &self,
        table: Table,
        key: &[Filter],
        column: &str,
        expected: Value,
        new: Value,
    ) -> Result<bool, GatewayError> {
        let mut filters = key.to_vec();
        filters.push(Filter::eq(column, expected));
        let mut patch = serde_json::Map::new();
        patch.insert(column.to_string(), new);
        let swapped = self.update(table, &filters, Value::Object(patch)).await?;
        Ok(!swapped.is_empty())
    }
}
