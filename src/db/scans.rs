use chrono::{DateTime, Utc};
use serde_json::json;

use crate::core::AppError;
use crate::db::{decode_rows, first_row};
use crate::gateway::{Filter, Gateway, GatewayError, Query, Table};
use crate::models::scans::ScannedThesis;

pub async fn get_scan(
    gateway: &dyn Gateway,
    user_id: i64,
    thesis_id: i64,
) -> Result<Option<ScannedThesis>, AppError> {
    let rows = gateway
        .select(
            Table::ScannedTheses,
            &Query::new()
                .eq("user_id", user_id)
                .eq("thesis_id", thesis_id)
                .limit(1),
        )
        .await?;
    first_row(rows)
}

/// Record that `user_id` scanned `thesis_id` at `scanned_at`.
///
/// Read-then-write: two clients upserting the same pair at the same instant can
/// both miss the existing row and both insert. A unique index on
/// (user_id, thesis_id) closes the window; its conflict is handled by falling
/// back to the update path.
pub async fn upsert_scan(
    gateway: &dyn Gateway,
    user_id: i64,
    thesis_id: i64,
    scanned_at: DateTime<Utc>,
) -> Result<(), AppError> {
    if let Some(existing) = get_scan(gateway, user_id, thesis_id).await? {
        touch_scan(gateway, existing.id, scanned_at).await?;
        tracing::debug!(thesis_id, "updated existing scan timestamp");
        return Ok(());
    }

    let inserted = gateway
        .insert(
            Table::ScannedTheses,
            json!({
                "user_id": user_id,
                "thesis_id": thesis_id,
                "scanned_at": scanned_at,
            }),
        )
        .await;

    match inserted {
        Ok(_) => {
            tracing::debug!(thesis_id, "created new scan record");
            Ok(())
        }
        Err(GatewayError::Conflict(_)) => {
            let existing = get_scan(gateway, user_id, thesis_id)
                .await?
                .ok_or_else(|| AppError::internal_error("scan conflict without a visible row"))?;
            touch_scan(gateway, existing.id, scanned_at).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn touch_scan(
    gateway: &dyn Gateway,
    scan_id: i64,
    scanned_at: DateTime<Utc>,
) -> Result<(), AppError> {
    gateway
        .update(
            Table::ScannedTheses,
            &[Filter::eq("id", scan_id)],
            json!({ "scanned_at": scanned_at }),
        )
        .await?;
    Ok(())
}

pub async fn get_recent_scans(
    gateway: &dyn Gateway,
    user_id: i64,
    limit: usize,
) -> Result<Vec<ScannedThesis>, AppError> {
    let rows = gateway
        .select(
            Table::ScannedTheses,
            &Query::new()
                .eq("user_id", user_id)
                .order_by("scanned_at", false)
                .limit(limit),
        )
        .await?;
    decode_rows(rows)
}
