use secrecy::Secret;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

/// A `users` row as the backend stores it. `password` holds an argon2 PHC string.
#[derive(Debug, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password: Secret<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub college: Option<String>,
    pub course: Option<String>,
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub year_level: Option<String>,
}

/// The authenticated identity every flow runs as.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub college: Option<String>,
    pub course: Option<String>,
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub year_level: Option<String>,
}

impl From<UserRecord> for CurrentUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            full_name: user.full_name,
            email: user.email,
            student_id: user.student_id,
            college: user.college,
            course: user.course,
            year_level: user.year_level,
        }
    }
}

impl CurrentUser {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub student_id: String,
    #[validate(length(min = 1))]
    pub college: String,
    #[validate(length(min = 1))]
    pub course: String,
    #[validate(length(min = 1, max = 16))]
    pub year_level: String,
}

/// Row written for a self-registered student.
#[derive(Serialize)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: String,
    pub role: Role,
    pub status: AccountStatus,
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub student_id: &'a str,
    pub college: &'a str,
    pub course: &'a str,
    pub year_level: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: CurrentUser,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
