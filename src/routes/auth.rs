use actix_web::{get, post, web, HttpResponse, Result};
use validator::Validate;

use crate::core::config::JwtAuthConfig;
use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::models::users::{LoginRequest, RegisterRequest};
use crate::services::{auth, AppContext};

#[tracing::instrument(name = "User Login", skip(ctx, jwt_config, request), fields(username = %request.username))]
#[post("/login")]
pub async fn login(
    ctx: web::Data<AppContext>,
    jwt_config: web::Data<JwtAuthConfig>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    let user = auth::authenticate(&ctx, request.username.trim(), &request.password).await?;
    let response = auth::issue_token(user, &jwt_config)?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(response, "Login successful")))
}

#[tracing::instrument(name = "User Registration", skip(ctx, request), fields(username = %request.username))]
#[post("/register")]
pub async fn register(
    ctx: web::Data<AppContext>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    let user = auth::register(&ctx, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(user, "Account created successfully")))
}

#[tracing::instrument(name = "Validate Session", skip(ctx, claims))]
#[get("/session")]
pub async fn get_session(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
) -> Result<HttpResponse, AppError> {
    let user = auth::validate_session(&ctx, claims.user_id()?).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(user, "Session is valid")))
}
