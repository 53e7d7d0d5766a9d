use actix_web::{get, post, web, HttpResponse, Result};
use serde::Serialize;

use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{storage, theses};
use crate::routes::current_user;
use crate::services::{access_requests, AppContext};

#[tracing::instrument(name = "Request Thesis Access", skip(ctx, claims))]
#[post("/{thesis_id}/access-requests")]
pub async fn request_access(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&ctx, &claims).await?;
    let thesis = theses::get_thesis_by_id(ctx.gateway.as_ref(), path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Thesis not found"))?;

    let request = access_requests::request_access(&ctx, &user, &thesis).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        request,
        "Access request submitted",
    )))
}

#[tracing::instrument(name = "Get Access Status", skip(ctx, claims))]
#[get("/{thesis_id}/access-status")]
pub async fn get_access_status(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&ctx, &claims).await?;
    let status = access_requests::get_status(&ctx, user.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(status, "Access status retrieved")))
}

#[derive(Debug, Serialize)]
pub struct DocumentUrl {
    pub url: String,
    pub expires_in: u64,
}

#[tracing::instrument(name = "Get Document URL", skip(ctx, claims))]
#[get("/{thesis_id}/document-url")]
pub async fn get_document_url(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&ctx, &claims).await?;
    let thesis_id = path.into_inner();

    access_requests::require_access(&ctx, &user, thesis_id).await?;
    let thesis = theses::get_thesis_by_id(ctx.gateway.as_ref(), thesis_id)
        .await?
        .ok_or_else(|| AppError::not_found("Thesis not found"))?;
    let file_url = thesis
        .file_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::not_found("No PDF file available for this thesis"))?;

    let storage_config = &ctx.settings.storage;
    let url = storage::signed_document_url(ctx.gateway.as_ref(), storage_config, file_url).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        DocumentUrl {
            url,
            expires_in: storage_config.signed_url_ttl_seconds,
        },
        "Document URL generated",
    )))
}
