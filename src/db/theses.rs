use serde_json::{json, Value};

use crate::core::AppError;
use crate::db::{decode_rows, first_row};
use crate::gateway::{Filter, Gateway, Query, Table};
use crate::models::theses::Thesis;

pub async fn get_thesis_by_id(
    gateway: &dyn Gateway,
    thesis_id: i64,
) -> Result<Option<Thesis>, AppError> {
    let rows = gateway
        .select(Table::Theses, &Query::new().eq("thesis_id", thesis_id).limit(1))
        .await?;
    first_row(rows)
}

/// Partial, case-insensitive match on `file_url`, so stored values carrying a
/// signed-URL prefix or query string still resolve.
pub async fn get_thesis_by_file_name(
    gateway: &dyn Gateway,
    file_name: &str,
) -> Result<Option<Thesis>, AppError> {
    let rows = gateway
        .select(
            Table::Theses,
            &Query::new()
                .filter(Filter::ilike("file_url", format!("%{}%", file_name)))
                .order_by("thesis_id", true)
                .limit(1),
        )
        .await?;
    first_row(rows)
}

pub async fn get_theses_by_ids(
    gateway: &dyn Gateway,
    thesis_ids: &[i64],
) -> Result<Vec<Thesis>, AppError> {
    if thesis_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Value> = thesis_ids.iter().map(|id| json!(id)).collect();
    let rows = gateway
        .select(Table::Theses, &Query::new().filter(Filter::one_of("thesis_id", ids)))
        .await?;
    decode_rows(rows)
}

/// Set `available_copies` to `expected - 1` only if it still reads `expected`.
pub async fn swap_available_copies(
    gateway: &dyn Gateway,
    thesis_id: i64,
    expected: i64,
) -> Result<bool, AppError> {
    let swapped = gateway
        .compare_and_swap(
            Table::Theses,
            &[Filter::eq("thesis_id", thesis_id)],
            "available_copies",
            json!(expected),
            json!(expected - 1),
        )
        .await?;
    Ok(swapped)
}
