use actix_web::{get, post, web, HttpResponse, Result};
use serde::Deserialize;

use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::theses;
use crate::models::qr::QrAction;
use crate::models::scans::ScanRequest;
use crate::routes::current_user;
use crate::services::{scan_resolver, AppContext};

#[tracing::instrument(name = "Scan Thesis QR", skip(ctx, claims, request))]
#[post("")]
pub async fn scan_thesis(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
    request: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&ctx, &claims).await?;
    let resolved = scan_resolver::scan(&ctx, &user, &request.payload).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(resolved, "Thesis found")))
}

#[tracing::instrument(name = "Get Recent Scans", skip(ctx, claims))]
#[get("/recent")]
pub async fn get_recent_scans(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&ctx, &claims).await?;
    let recent = scan_resolver::recent_scans(&ctx, &user).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        recent,
        "Recent scans retrieved successfully",
    )))
}

#[derive(Debug, Deserialize)]
pub struct QrQuery {
    #[serde(default)]
    pub action: QrAction,
}

#[tracing::instrument(name = "Get Thesis QR Payload", skip(ctx, claims))]
#[get("/{thesis_id}/qr")]
pub async fn get_thesis_qr(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
    path: web::Path<i64>,
    query: web::Query<QrQuery>,
) -> Result<HttpResponse, AppError> {
    current_user(&ctx, &claims).await?;
    let thesis_id = path.into_inner();

    theses::get_thesis_by_id(ctx.gateway.as_ref(), thesis_id)
        .await?
        .ok_or_else(|| AppError::not_found("Thesis not found"))?;
    let payload = scan_resolver::thesis_qr_payload(thesis_id, query.action);

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(payload, "QR payload generated")))
}
