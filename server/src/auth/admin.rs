use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use super::jwt::verify;
use super::Role;
use crate::error::ApiError;

/// Admin routes (§6) accept either the static `X-API-Key` header or a dashboard JWT carrying
/// role `admin`. §9 notes the static key is a single shared secret across all admins —
/// rotation is explicitly undefined here.
pub struct AdminAuth;

impl FromRequest for AdminAuth {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req).map_err(actix_web::Error::from))
    }
}

fn extract(req: &HttpRequest) -> Result<AdminAuth, ApiError> {
    let config = req
        .app_data::<actix_web::web::Data<crate::config::ServerConfig>>()
        .ok_or_else(|| ApiError::Internal("server config not registered".into()))?;

    if let Some(key) = req.headers().get("X-API-Key").and_then(|h| h.to_str().ok()) {
        if key == config.admin_api_key {
            return Ok(AdminAuth);
        }
        return Err(ApiError::Unauthorized);
    }

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
    let claims = verify(token, &config.jwt_issuer, &config.jwt_secret)?;

    match claims.role.parse::<Role>() {
        Ok(Role::Admin) => Ok(AdminAuth),
        Ok(_) => Err(ApiError::Forbidden),
        Err(_) => Err(ApiError::Unauthorized),
    }
}
