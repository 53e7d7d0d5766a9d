use actix_web::{post, web, HttpResponse, Result};

use crate::core::jwt_auth::{JwtClaims, KioskKey};
use crate::core::{AppError, AppSuccessResponse};
use crate::models::borrow::RedeemRequest;
use crate::routes::current_user;
use crate::services::{borrow_engine, AppContext};

#[tracing::instrument(name = "Create Borrow QR", skip(ctx, claims))]
#[post("/{thesis_id}/borrow-qr")]
pub async fn create_borrow_qr(
    ctx: web::Data<AppContext>,
    claims: JwtClaims,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&ctx, &claims).await?;
    let payload = borrow_engine::create_borrow_qr(&ctx, &user, path.into_inner()).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        payload,
        "Show this QR code at the bookshelf kiosk",
    )))
}

#[tracing::instrument(name = "Kiosk Redeem Borrow QR", skip(ctx, _kiosk, request))]
#[post("/redeem")]
pub async fn redeem_borrow_qr(
    ctx: web::Data<AppContext>,
    _kiosk: KioskKey,
    request: web::Json<RedeemRequest>,
) -> Result<HttpResponse, AppError> {
    let receipt = borrow_engine::redeem_scanned_code(&ctx, &request.payload).await?;
    let message = receipt.message.clone();

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(receipt, message)))
}
