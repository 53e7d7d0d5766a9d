use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use crate::core::{AppError, AppErrorType};
use crate::db::{access_requests, borrow_transactions, theses, users};
use crate::models::access_requests::{NewAccessRequest, RequestStatus};
use crate::models::borrow::{BorrowReceipt, BorrowTransaction, TransactionStatus};
use crate::models::notifications::NotificationEvent;
use crate::models::qr::{borrow_transaction_id, BorrowKind, BorrowQrPayload};
use crate::models::theses::Thesis;
use crate::models::users::CurrentUser;
use crate::services::notifications::notify_admin;
use crate::services::AppContext;

pub const BORROW_METHOD_QR: &str = "qr_scan";

fn now_millis() -> Result<DateTime<Utc>, AppError> {
    Utc.timestamp_millis_opt(Utc::now().timestamp_millis())
        .single()
        .ok_or_else(|| AppError::internal_error("clock out of range"))
}

/// Issue a single-use borrow token and persist it as a pending transaction.
///
/// Nothing is written when the thesis is missing or has no copies.
#[tracing::instrument(name = "Create borrow QR", skip(ctx, user), fields(user_id = user.id))]
pub async fn create_borrow_qr(
    ctx: &AppContext,
    user: &CurrentUser,
    thesis_id: i64,
) -> Result<BorrowQrPayload, AppError> {
    let gateway = ctx.gateway.as_ref();

    let thesis = theses::get_thesis_by_id(gateway, thesis_id)
        .await?
        .ok_or_else(|| AppError::not_found("Thesis not found"))?;
    if thesis.available_copies <= 0 {
        return Err(AppError::no_copies());
    }

    let now = now_millis()?;
    let expires_at = now + Duration::minutes(ctx.settings.borrowing.borrow_qr_ttl_minutes);
    let payload = BorrowQrPayload {
        kind: BorrowKind::Borrow,
        transaction_id: borrow_transaction_id(now.timestamp_millis(), user.id, thesis_id),
        user_id: user.id,
        thesis_id,
        timestamp: now.timestamp_millis(),
        expires: expires_at.timestamp_millis(),
    };

    borrow_transactions::insert_transaction(
        gateway,
        &BorrowTransaction {
            transaction_id: payload.transaction_id.clone(),
            user_id: user.id,
            thesis_id,
            status: TransactionStatus::Pending,
            qr_data: payload.clone(),
            expires_at,
            approved_at: None,
        },
    )
    .await?;

    tracing::info!(transaction_id = %payload.transaction_id, "borrow QR issued");
    Ok(payload)
}

/// Pull the transaction id out of whatever the kiosk scanner decoded.
pub fn parse_kiosk_payload(raw: &str) -> Result<String, AppError> {
    let invalid = || AppError::invalid_format("This is not a valid borrow QR code");

    let fields = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(fields)) => fields,
        _ => return Err(invalid()),
    };
    if fields.get("type").and_then(Value::as_str) != Some("borrow") {
        return Err(invalid());
    }
    fields
        .get("transaction_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(invalid)
}

/// Kiosk entry point: parse the scanned string, then redeem it.
pub async fn redeem_scanned_code(ctx: &AppContext, raw: &str) -> Result<BorrowReceipt, AppError> {
    let transaction_id = parse_kiosk_payload(raw)?;
    process_borrow(ctx, &transaction_id).await
}

/// Redeem a pending transaction: approve it, grant access, take a copy off
/// the shelf, tell the admins.
///
/// Precondition failures leave the transaction as it was. A failure once
/// redemption has started marks it failed, except when a concurrent
/// redemption already approved it.
#[tracing::instrument(name = "Process borrow", skip(ctx))]
pub async fn process_borrow(ctx: &AppContext, transaction_id: &str) -> Result<BorrowReceipt, AppError> {
    let gateway = ctx.gateway.as_ref();

    let transaction = borrow_transactions::get_transaction(gateway, transaction_id)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;
    if transaction.status != TransactionStatus::Pending {
        return Err(AppError::already_processed());
    }

    let now = Utc::now();
    if transaction.is_expired_at(now) {
        return Err(AppError::expired());
    }

    let thesis = theses::get_thesis_by_id(gateway, transaction.thesis_id)
        .await?
        .ok_or_else(|| AppError::not_found("Thesis not found"))?;
    let borrower: CurrentUser = users::get_user_by_id(gateway, transaction.user_id)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::not_found("Borrower not found"))?;
    if thesis.available_copies <= 0 {
        return Err(AppError::no_copies());
    }

    match redeem(ctx, &transaction, &thesis, now).await {
        Ok(()) => {
            tracing::info!(thesis_id = thesis.thesis_id, user_id = borrower.id, "thesis borrowed");
            Ok(BorrowReceipt {
                success: true,
                message: "Thesis borrowed successfully".to_string(),
                transaction_id: transaction.transaction_id,
                thesis_title: thesis.title,
                user_name: borrower.display_name().to_string(),
            })
        }
        Err(e) if e.is(AppErrorType::AlreadyProcessedError) => Err(e),
        Err(e) => {
            tracing::error!(error.message = %e, error.cause = ?e.cause, "borrow failed, marking transaction failed");
            if let Err(mark_error) =
                borrow_transactions::mark_transaction_failed(gateway, transaction_id).await
            {
                tracing::error!(error.cause = ?mark_error.cause, "could not mark transaction failed");
            }
            Err(e)
        }
    }
}

async fn redeem(
    ctx: &AppContext,
    transaction: &BorrowTransaction,
    thesis: &Thesis,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let gateway = ctx.gateway.as_ref();

    if !borrow_transactions::approve_transaction(gateway, &transaction.transaction_id, now).await? {
        return Err(AppError::already_processed());
    }

    let grant = access_requests::insert_request(
        gateway,
        &NewAccessRequest {
            user_id: transaction.user_id,
            thesis_id: transaction.thesis_id,
            status: RequestStatus::Approved,
            request_date: now,
            approved_date: Some(now),
            duration_days: ctx.settings.borrowing.access_duration_days,
            borrow_method: Some(BORROW_METHOD_QR.to_string()),
        },
    )
    .await?;

    // The grant must not outlive a copy lost to a concurrent borrower.
    if let Err(e) = take_copy(ctx, thesis).await {
        if let Err(revoke_error) = access_requests::deny_request(gateway, grant.id).await {
            tracing::error!(request_id = grant.id, error.cause = ?revoke_error.cause, "could not revoke access grant");
        }
        return Err(e);
    }

    notify_admin(
        ctx,
        NotificationEvent::ThesisBorrowed,
        json!({
            "user_id": transaction.user_id,
            "thesis_id": transaction.thesis_id,
            "transaction_id": transaction.transaction_id,
        }),
    );
    Ok(())
}

/// Decrement `available_copies` by exactly one, re-reading and retrying when
/// another writer changed the count in between.
async fn take_copy(ctx: &AppContext, thesis: &Thesis) -> Result<(), AppError> {
    let gateway = ctx.gateway.as_ref();
    let retries = ctx.settings.borrowing.copy_decrement_retries;
    let mut expected = thesis.available_copies;

    for attempt in 0..=retries {
        if expected <= 0 {
            return Err(AppError::no_copies());
        }
        if theses::swap_available_copies(gateway, thesis.thesis_id, expected).await? {
            return Ok(());
        }

        tracing::info!(attempt, expected, "available copies changed concurrently, re-reading");
        expected = theses::get_thesis_by_id(gateway, thesis.thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("Thesis not found"))?
            .available_copies;
    }

    Err(AppError::internal_error(
        "Could not update available copies, please try again",
    ))
}
