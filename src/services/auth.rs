use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use secrecy::ExposeSecret;

use crate::core::config::JwtAuthConfig;
use crate::core::jwt_auth::{generate_jwt_token, JwtClaims};
use crate::core::{AppError, AppErrorType};
use crate::db::users;
use crate::models::users::{
    AccountStatus, CurrentUser, LoginResponse, NewUser, RegisterRequest, Role,
};
use crate::services::AppContext;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Credential check against the `users` table. Only active students may use
/// the mobile portal.
#[tracing::instrument(name = "Authenticate user", skip(ctx, password))]
pub async fn authenticate(
    ctx: &AppContext,
    username: &str,
    password: &str,
) -> Result<CurrentUser, AppError> {
    let user = users::get_user_by_username(ctx.gateway.as_ref(), username)
        .await?
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    if user.status != AccountStatus::Active {
        return Err(AppError::permission_denied(
            "Your account is inactive. Please contact administrator.",
        ));
    }

    if !verify_password(password, user.password.expose_secret())? {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    if user.role != Role::User {
        return Err(AppError::permission_denied(
            "Access denied. This portal is for students only.",
        ));
    }

    Ok(user.into())
}

/// Create an active student account. Username and student id must both be
/// unused.
#[tracing::instrument(name = "Register user", skip(ctx, request), fields(username = %request.username))]
pub async fn register(ctx: &AppContext, request: &RegisterRequest) -> Result<CurrentUser, AppError> {
    let gateway = ctx.gateway.as_ref();
    let username = request.username.trim();
    let student_id = request.student_id.trim();

    if users::get_user_by_username(gateway, username).await?.is_some() {
        return Err(AppError::duplicate_account(
            "Username already exists. Please choose a different one.",
        ));
    }
    if users::get_user_by_student_id(gateway, student_id).await?.is_some() {
        return Err(AppError::duplicate_account(
            "Student ID already registered. Please use a different student ID.",
        ));
    }

    let user = users::insert_user(
        gateway,
        &NewUser {
            username,
            password: hash_password(&request.password)?,
            role: Role::User,
            status: AccountStatus::Active,
            full_name: request.full_name.trim(),
            email: request.email.trim(),
            phone: request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
            student_id,
            college: request.college.trim(),
            course: request.course.trim(),
            year_level: request.year_level.trim(),
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "student account created");
    Ok(user.into())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError {
            error_type: AppErrorType::HashingFailed,
            message: Some("Could not secure the password".to_string()),
            cause: Some(e.to_string()),
        })
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AppError {
        error_type: AppErrorType::HashingFailed,
        message: Some("Stored password hash is unreadable".to_string()),
        cause: Some(e.to_string()),
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// The user behind a session must still exist and be active.
pub async fn validate_session(ctx: &AppContext, user_id: i64) -> Result<CurrentUser, AppError> {
    users::get_active_user_by_id(ctx.gateway.as_ref(), user_id)
        .await?
        .map(CurrentUser::from)
        .ok_or_else(|| AppError::unauthorized("Session expired or user not found"))
}

pub fn issue_token(user: CurrentUser, config: &JwtAuthConfig) -> Result<LoginResponse, AppError> {
    let expires_at = Utc::now() + Duration::hours(config.token_expiration_time);
    let claims = JwtClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role,
        exp: expires_at.timestamp() as usize,
    };

    let token = generate_jwt_token(&claims, config)?;
    Ok(LoginResponse {
        user,
        token,
        expires_at,
    })
}
