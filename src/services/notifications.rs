use chrono::Utc;
use serde_json::Value;

use crate::db::notifications;
use crate::models::notifications::{AdminNotification, NotificationEvent};
use crate::services::AppContext;

/// Queue an admin notification. Never fails the caller; a failed insert is
/// logged by the side-effect worker.
pub fn notify_admin(ctx: &AppContext, event: NotificationEvent, data: Value) {
    let gateway = ctx.gateway.clone();
    let notification = AdminNotification {
        event_type: event,
        data,
        created_at: Utc::now(),
        is_read: false,
    };

    tracing::info!(event = event.as_str(), "queueing admin notification");
    ctx.side_effects.submit("admin_notification", async move {
        notifications::insert_notification(gateway.as_ref(), &notification).await
    });
}
