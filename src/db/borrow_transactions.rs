use chrono::{DateTime, Utc};
use serde_json::json;

use crate::core::AppError;
use crate::db::{decode_row, first_row};
use crate::gateway::{Filter, Gateway, Query, Table};
use crate::models::borrow::{BorrowTransaction, TransactionStatus};

pub async fn insert_transaction(
    gateway: &dyn Gateway,
    transaction: &BorrowTransaction,
) -> Result<BorrowTransaction, AppError> {
    let row = gateway
        .insert(Table::BorrowTransactions, serde_json::to_value(transaction)?)
        .await?;
    decode_row(row)
}

pub async fn get_transaction(
    gateway: &dyn Gateway,
    transaction_id: &str,
) -> Result<Option<BorrowTransaction>, AppError> {
    let rows = gateway
        .select(
            Table::BorrowTransactions,
            &Query::new().eq("transaction_id", transaction_id).limit(1),
        )
        .await?;
    first_row(rows)
}

/// Flip pending -> approved. Only a row still pending is touched, so a
/// concurrent redemption that won the race leaves nothing to approve here.
pub async fn approve_transaction(
    gateway: &dyn Gateway,
    transaction_id: &str,
    approved_at: DateTime<Utc>,
) -> Result<bool, AppError> {
    let updated = gateway
        .update(
            Table::BorrowTransactions,
            &[
                Filter::eq("transaction_id", transaction_id),
                Filter::eq("status", TransactionStatus::Pending.as_str()),
            ],
            json!({
                "status": TransactionStatus::Approved.as_str(),
                "approved_at": approved_at,
            }),
        )
        .await?;
    Ok(!updated.is_empty())
}

pub async fn mark_transaction_failed(
    gateway: &dyn Gateway,
    transaction_id: &str,
) -> Result<(), AppError> {
    gateway
        .update(
            Table::BorrowTransactions,
            &[Filter::eq("transaction_id", transaction_id)],
            json!({ "status": TransactionStatus::Failed.as_str() }),
        )
        .await?;
    Ok(())
}

/// Fail every pending transaction whose QR code has lapsed. Returns how many.
pub async fn fail_lapsed_transactions(
    gateway: &dyn Gateway,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    let updated = gateway
        .update(
            Table::BorrowTransactions,
            &[
                Filter::eq("status", TransactionStatus::Pending.as_str()),
                Filter::lt("expires_at", json!(now)),
            ],
            json!({ "status": TransactionStatus::Failed.as_str() }),
        )
        .await?;
    Ok(updated.len())
}
