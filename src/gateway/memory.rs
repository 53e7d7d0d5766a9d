use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{Filter, FilterOp, Gateway, GatewayError, Query, Table};

#[derive(Debug, Clone)]
struct UniqueConstraint {
    columns: Vec<String>,
    only_when: Option<Filter>,
}

#[derive(Default)]
struct Store {
    rows: HashMap<Table, Vec<Map<String, Value>>>,
    next_id: HashMap<Table, i64>,
    unique: HashMap<Table, Vec<UniqueConstraint>>,
    objects: HashSet<(String, String)>,
    failing_writes: HashSet<Table>,
}

/// Process-local gateway with the same filter semantics as the REST backend.
///
/// Every inserted row without an `id` gets an auto-incremented one. Unique
/// constraints are opt-in, mirroring a backend that may or may not carry a
/// unique index.
#[derive(Default)]
pub struct InMemoryGateway {
    store: Mutex<Store>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts that would duplicate `columns` on an existing row.
    pub fn with_unique(self, table: Table, columns: &[&str]) -> Self {
        self.add_unique(table, columns, None)
    }

    /// Partial unique index: only rows matching `only_when` take part.
    pub fn with_unique_where(self, table: Table, columns: &[&str], only_when: Filter) -> Self {
        self.add_unique(table, columns, Some(only_when))
    }

    fn add_unique(self, table: Table, columns: &[&str], only_when: Option<Filter>) -> Self {
        if let Ok(mut store) = self.store.lock() {
            store.unique.entry(table).or_default().push(UniqueConstraint {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                only_when,
            });
        }
        self
    }

    /// Seed a row as-is, bypassing constraints and failure injection.
    pub fn seed(&self, table: Table, row: Value) {
        if let (Ok(mut store), Value::Object(row)) = (self.store.lock(), row) {
            if let Some(id) = row.get("id").and_then(Value::as_i64) {
                let next = store.next_id.entry(table).or_insert(0);
                *next = (*next).max(id);
            }
            store.rows.entry(table).or_default().push(row);
        }
    }

    pub fn put_object(&self, bucket: &str, path: &str) {
        if let Ok(mut store) = self.store.lock() {
            store.objects.insert((bucket.to_string(), path.to_string()));
        }
    }

    /// Make every subsequent insert or update on `table` fail.
    pub fn fail_writes_to(&self, table: Table) {
        if let Ok(mut store) = self.store.lock() {
            store.failing_writes.insert(table);
        }
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.store
            .lock()
            .map(|store| {
                store
                    .rows
                    .get(&table)
                    .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Store>, GatewayError> {
        self.store
            .lock()
            .map_err(|_| GatewayError::Decode("in-memory store poisoned".to_string()))
    }
}

fn injected_failure(table: Table) -> GatewayError {
    GatewayError::Status {
        status: 503,
        body: format!("writes to {} are unavailable", table.as_str()),
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, GatewayError> {
        let store = self.lock()?;
        let mut rows: Vec<&Map<String, Value>> = store
            .rows
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(field(a, &order.column), field(b, &order.column))
                    .unwrap_or(Ordering::Equal);
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .cloned()
            .map(Value::Object)
            .collect())
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, GatewayError> {
        let mut store = self.lock()?;
        if store.failing_writes.contains(&table) {
            return Err(injected_failure(table));
        }

        let mut row = match row {
            Value::Object(row) => row,
            other => return Err(GatewayError::Decode(format!("row must be an object, got {}", other))),
        };

        if let Some(constraints) = store.unique.get(&table) {
            let existing = store.rows.get(&table).map(Vec::as_slice).unwrap_or_default();
            for constraint in constraints {
                if violates(constraint, &row, existing) {
                    return Err(GatewayError::Conflict(format!(
                        "duplicate key on {}({})",
                        table.as_str(),
                        constraint.columns.join(", ")
                    )));
                }
            }
        }

        if !row.contains_key("id") {
            let next = store.next_id.entry(table).or_insert(0);
            *next += 1;
            row.insert("id".to_string(), Value::from(*next));
        }

        store.rows.entry(table).or_default().push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut store = self.lock()?;
        if store.failing_writes.contains(&table) {
            return Err(injected_failure(table));
        }

        let patch = match patch {
            Value::Object(patch) => patch,
            other => return Err(GatewayError::Decode(format!("patch must be an object, got {}", other))),
        };

        let mut updated = Vec::new();
        if let Some(rows) = store.rows.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| filters.iter().all(|f| matches(row, f))) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(Value::Object(row.clone()));
            }
        }
        Ok(updated)
    }

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, GatewayError> {
        let store = self.lock()?;
        Ok(store
            .rows
            .get(&table)
            .map(|rows| rows.iter().filter(|row| filters.iter().all(|f| matches(row, f))).count())
            .unwrap_or(0) as u64)
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, GatewayError> {
        let store = self.lock()?;
        if !store.objects.contains(&(bucket.to_string(), path.to_string())) {
            return Err(GatewayError::ObjectNotFound(format!("{}/{}", bucket, path)));
        }
        Ok(format!(
            "memory://{}/{}?token=signed&expires_in={}",
            bucket,
            path,
            expires_in.as_secs()
        ))
    }
}

fn field<'a>(row: &'a Map<String, Value>, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn violates(constraint: &UniqueConstraint, row: &Map<String, Value>, existing: &[Map<String, Value>]) -> bool {
    if let Some(only_when) = &constraint.only_when {
        if !matches(row, only_when) {
            return false;
        }
    }
    existing.iter().any(|other| {
        constraint.only_when.as_ref().map_or(true, |f| matches(other, f))
            && constraint
                .columns
                .iter()
                .all(|c| values_equal(field(row, c), field(other, c)))
    })
}

fn matches(row: &Map<String, Value>, filter: &Filter) -> bool {
    let actual = field(row, &filter.column);
    match filter.op {
        FilterOp::Eq => values_equal(actual, &filter.value),
        FilterOp::Neq => !values_equal(actual, &filter.value),
        FilterOp::Gt => compare_values(actual, &filter.value) == Some(Ordering::Greater),
        FilterOp::Lt => compare_values(actual, &filter.value) == Some(Ordering::Less),
        FilterOp::ILike => match (actual, &filter.value) {
            (Value::String(text), Value::String(pattern)) => ilike(text, pattern),
            _ => false,
        },
        FilterOp::In => match &filter.value {
            Value::Array(candidates) => candidates.iter().any(|c| values_equal(actual, c)),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    compare_values(a, b) == Some(Ordering::Equal)
}

/// Timestamps compare chronologically, numbers numerically (numeric strings
/// included, as a REST backend would coerce them), everything else lexically.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_timestamp(a), as_timestamp(b)) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (as_number(a), as_number(b)) {
        return a.partial_cmp(&b);
    }
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn ilike(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    let anchored_start = !pattern.starts_with('%');
    let anchored_end = !pattern.ends_with('%');

    let mut cursor = 0;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 && anchored_start {
            if !text.starts_with(part) {
                return false;
            }
            cursor = part.len();
            continue;
        }
        match text[cursor..].find(part) {
            Some(found) => cursor += found + part.len(),
            None => return false,
        }
    }
    if anchored_end {
        if let Some(last) = parts.last().filter(|p| !p.is_empty()) {
            return text.ends_with(last) && cursor <= text.len();
        }
    }
    true
}
