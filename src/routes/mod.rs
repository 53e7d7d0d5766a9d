use actix_web::web::{scope, ServiceConfig};
use actix_web::Scope;

use access_requests::{get_access_status, get_document_url, request_access};
use auth::{get_session, login, register};
use borrow::{create_borrow_qr, redeem_borrow_qr};
use scans::{get_recent_scans, get_thesis_qr, scan_thesis};

use crate::core::jwt_auth::JwtClaims;
use crate::core::AppError;
use crate::models::users::CurrentUser;
use crate::routes::health_check::*;
use crate::services::{auth as auth_service, AppContext};

mod access_requests;
mod auth;
mod borrow;
mod health_check;
mod scans;

/// The token only proves who the caller was; the account must still be active.
pub(crate) async fn current_user(
    ctx: &AppContext,
    claims: &JwtClaims,
) -> Result<CurrentUser, AppError> {
    auth_service::validate_session(ctx, claims.user_id()?).await
}

fn util_routes() -> Scope {
    scope("").service(health_check)
}

fn auth_routes() -> Scope {
    scope("auth")
        .service(login)
        .service(register)
        .service(get_session)
}

fn scans_routes() -> Scope {
    scope("scans")
        .service(get_recent_scans)
        .service(scan_thesis)
}

fn theses_routes() -> Scope {
    scope("theses")
        .service(get_thesis_qr)
        .service(request_access)
        .service(get_access_status)
        .service(get_document_url)
        .service(create_borrow_qr)
}

fn kiosk_routes() -> Scope {
    scope("kiosk").service(redeem_borrow_qr)
}

pub fn thesis_vault_routes(conf: &mut ServiceConfig) {
    conf.service(
        scope("api/v1")
            .service(auth_routes())
            .service(scans_routes())
            .service(theses_routes())
            .service(kiosk_routes())
            .service(util_routes()),
    );
}
