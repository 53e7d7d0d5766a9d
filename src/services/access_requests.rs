use chrono::Utc;
use serde_json::json;

use crate::core::AppError;
use crate::db::access_requests;
use crate::models::access_requests::{AccessRequest, AccessStatus, NewAccessRequest, RequestStatus};
use crate::models::notifications::NotificationEvent;
use crate::models::theses::Thesis;
use crate::models::users::CurrentUser;
use crate::services::notifications::notify_admin;
use crate::services::AppContext;

/// File a pending request for full-document access and tell the admins.
///
/// The pending check and the insert are two calls; two racing requests can
/// both pass the check. A backend unique index on pending rows turns the
/// loser into `DuplicatePending`.
#[tracing::instrument(
    name = "Request thesis access",
    skip(ctx, user, thesis),
    fields(user_id = user.id, thesis_id = thesis.thesis_id)
)]
pub async fn request_access(
    ctx: &AppContext,
    user: &CurrentUser,
    thesis: &Thesis,
) -> Result<AccessRequest, AppError> {
    let gateway = ctx.gateway.as_ref();

    if access_requests::count_pending_requests(gateway, user.id, thesis.thesis_id).await? > 0 {
        return Err(AppError::duplicate_pending());
    }

    let now = Utc::now();
    let created = access_requests::insert_request(
        gateway,
        &NewAccessRequest {
            user_id: user.id,
            thesis_id: thesis.thesis_id,
            status: RequestStatus::Pending,
            request_date: now,
            approved_date: None,
            duration_days: ctx.settings.borrowing.access_duration_days,
            borrow_method: None,
        },
    )
    .await?;

    notify_admin(
        ctx,
        NotificationEvent::NewRequest,
        json!({
            "request_id": created.id,
            "user_id": user.id,
            "thesis_id": thesis.thesis_id,
            "timestamp": now,
        }),
    );

    tracing::info!(request_id = created.id, "access request filed");
    Ok(created)
}

/// Classify the latest request for the pair as of now.
pub async fn get_status(
    ctx: &AppContext,
    user_id: i64,
    thesis_id: i64,
) -> Result<AccessStatus, AppError> {
    let latest = access_requests::get_latest_request(ctx.gateway.as_ref(), user_id, thesis_id).await?;
    Ok(AccessStatus::evaluate(latest, Utc::now()))
}

/// Like [`get_status`], but anything short of live access is an error.
pub async fn require_access(
    ctx: &AppContext,
    user: &CurrentUser,
    thesis_id: i64,
) -> Result<AccessStatus, AppError> {
    let status = get_status(ctx, user.id, thesis_id).await?;
    if !status.has_access {
        return Err(AppError::permission_denied(if status.is_expired {
            "Your access to this thesis has expired"
        } else {
            "You do not have access to this thesis"
        }));
    }
    Ok(status)
}
