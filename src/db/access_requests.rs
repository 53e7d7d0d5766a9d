use serde_json::json;

use crate::core::AppError;
use crate::db::{decode_row, first_row};
use crate::gateway::{Filter, Gateway, GatewayError, Query, Table};
use crate::models::access_requests::{AccessRequest, NewAccessRequest, RequestStatus};

pub async fn count_pending_requests(
    gateway: &dyn Gateway,
    user_id: i64,
    thesis_id: i64,
) -> Result<u64, AppError> {
    let count = gateway
        .count(
            Table::BorrowingRequests,
            &[
                Filter::eq("user_id", user_id),
                Filter::eq("thesis_id", thesis_id),
                Filter::eq("status", RequestStatus::Pending.as_str()),
            ],
        )
        .await?;
    Ok(count)
}

/// Insert a request. A backend unique index on pending (user_id, thesis_id)
/// rejecting the row is reported as a duplicate pending request.
pub async fn insert_request(
    gateway: &dyn Gateway,
    request: &NewAccessRequest,
) -> Result<AccessRequest, AppError> {
    match gateway
        .insert(Table::BorrowingRequests, serde_json::to_value(request)?)
        .await
    {
        Ok(row) => decode_row(row),
        Err(GatewayError::Conflict(_)) => Err(AppError::duplicate_pending()),
        Err(e) => Err(e.into()),
    }
}

/// Withdraw a grant, e.g. one issued for a borrow that then lost its copy.
pub async fn deny_request(gateway: &dyn Gateway, request_id: i64) -> Result<(), AppError> {
    gateway
        .update(
            Table::BorrowingRequests,
            &[Filter::eq("id", request_id)],
            json!({ "status": RequestStatus::Denied.as_str() }),
        )
        .await?;
    Ok(())
}

pub async fn get_latest_request(
    gateway: &dyn Gateway,
    user_id: i64,
    thesis_id: i64,
) -> Result<Option<AccessRequest>, AppError> {
    let rows = gateway
        .select(
            Table::BorrowingRequests,
            &Query::new()
                .eq("user_id", user_id)
                .eq("thesis_id", thesis_id)
                .order_by("request_date", false)
                .limit(1),
        )
        .await?;
    first_row(rows)
}
