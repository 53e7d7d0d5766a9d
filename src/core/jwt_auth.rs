use actix_web::{dev::Payload, web, FromRequest, HttpMessage, HttpRequest};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use subtle::ConstantTimeEq;

use crate::core::config::{JwtAuthConfig, KioskConfig};
use crate::core::AppError;
use crate::models::users::Role;

pub const KIOSK_KEY_HEADER: &str = "x-kiosk-key";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user ID
    pub username: String,
    pub role: Role,
    pub exp: usize, // expiration time
}

impl JwtClaims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid user ID in token"))
    }
}

pub fn generate_jwt_token(claims: &JwtClaims, config: &JwtAuthConfig) -> Result<String, AppError> {
    let encoding_key = EncodingKey::from_secret(config.secret.expose_secret().as_bytes());

    encode(&Header::default(), claims, &encoding_key)
        .map_err(|_| AppError::internal_error("Failed to generate JWT token"))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn authenticate(req: &HttpRequest) -> Result<JwtClaims, AppError> {
    if let Some(claims) = req.extensions().get::<JwtClaims>() {
        return Ok(claims.clone());
    }

    let config = req
        .app_data::<web::Data<JwtAuthConfig>>()
        .ok_or_else(|| AppError::internal_error("JWT configuration missing"))?;
    let token = bearer_token(req).ok_or_else(|| AppError::unauthorized("Invalid login credentials"))?;

    let claims = decode::<JwtClaims>(
        &token,
        &DecodingKey::from_secret(config.secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::unauthorized("Invalid token"))?
    .claims;

    req.extensions_mut().insert(claims.clone());
    Ok(claims)
}

impl FromRequest for JwtClaims {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Proof that the caller is the bookshelf kiosk.
#[derive(Debug)]
pub struct KioskKey;

impl FromRequest for KioskKey {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let expected = match req.app_data::<web::Data<KioskConfig>>() {
            Some(config) => config,
            None => return ready(Err(AppError::internal_error("Kiosk configuration missing"))),
        };

        let presented = req
            .headers()
            .get(KIOSK_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        ready(match presented {
            Some(key) if keys_match(key, expected.api_key.expose_secret()) => Ok(KioskKey),
            _ => Err(AppError::permission_denied(
                "Only the bookshelf kiosk may redeem borrow codes",
            )),
        })
    }
}

/// Constant-time in the key contents; only the length comparison can short-circuit.
fn keys_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
