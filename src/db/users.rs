use crate::core::AppError;
use crate::db::{decode_row, first_row};
use crate::gateway::{Gateway, GatewayError, Query, Table};
use crate::models::users::{NewUser, UserRecord};

pub async fn get_user_by_username(
    gateway: &dyn Gateway,
    username: &str,
) -> Result<Option<UserRecord>, AppError> {
    let rows = gateway
        .select(Table::Users, &Query::new().eq("username", username).limit(1))
        .await?;
    first_row(rows)
}

pub async fn get_active_user_by_id(
    gateway: &dyn Gateway,
    user_id: i64,
) -> Result<Option<UserRecord>, AppError> {
    let rows = gateway
        .select(
            Table::Users,
            &Query::new().eq("id", user_id).eq("status", "active").limit(1),
        )
        .await?;
    first_row(rows)
}

pub async fn get_user_by_id(
    gateway: &dyn Gateway,
    user_id: i64,
) -> Result<Option<UserRecord>, AppError> {
    let rows = gateway
        .select(Table::Users, &Query::new().eq("id", user_id).limit(1))
        .await?;
    first_row(rows)
}

pub async fn get_user_by_student_id(
    gateway: &dyn Gateway,
    student_id: &str,
) -> Result<Option<UserRecord>, AppError> {
    let rows = gateway
        .select(Table::Users, &Query::new().eq("student_id", student_id).limit(1))
        .await?;
    first_row(rows)
}

/// A unique index on `username` or `student_id` rejecting the row means the
/// account was taken between the lookup and the insert.
pub async fn insert_user(gateway: &dyn Gateway, user: &NewUser<'_>) -> Result<UserRecord, AppError> {
    match gateway.insert(Table::Users, serde_json::to_value(user)?).await {
        Ok(row) => decode_row(row),
        Err(GatewayError::Conflict(_)) => Err(AppError::duplicate_account(
            "Username or student ID already registered",
        )),
        Err(e) => Err(e.into()),
    }
}
