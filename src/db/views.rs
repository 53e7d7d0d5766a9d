use crate::core::AppError;
use crate::gateway::{Gateway, Table};
use crate::models::views::ThesisView;

pub async fn insert_view(gateway: &dyn Gateway, view: &ThesisView) -> Result<(), AppError> {
    gateway
        .insert(Table::ThesisViews, serde_json::to_value(view)?)
        .await?;
    Ok(())
}
