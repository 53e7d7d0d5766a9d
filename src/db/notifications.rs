use crate::core::AppError;
use crate::gateway::{Gateway, Table};
use crate::models::notifications::AdminNotification;

pub async fn insert_notification(
    gateway: &dyn Gateway,
    notification: &AdminNotification,
) -> Result<(), AppError> {
    gateway
        .insert(Table::AdminNotifications, serde_json::to_value(notification)?)
        .await?;
    Ok(())
}
