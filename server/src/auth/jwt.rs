use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Role;
use crate::error::ApiError;

/// Dashboard JWT claims. Tokens themselves are minted by the interactive auth surface
/// (§1's external collaborator, out of scope here); this core only ever verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iss: String,
    pub exp: usize,
}

/// Minting is the interactive auth surface's job (§1); this core only verifies. Kept
/// test-only so the round-trip below can exercise [`verify`] without a second JWT crate.
#[cfg(test)]
pub fn issue(subject: &str, role: Role, issuer: &str, secret: &str, ttl_secs: i64) -> Result<String, ApiError> {
    let exp = (chrono::Utc::now() + chrono::Duration::seconds(ttl_secs)).timestamp() as usize;
    let claims = Claims {
        sub: subject.to_string(),
        role: role.as_str().to_string(),
        iss: issuer.to_string(),
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub fn verify(token: &str, issuer: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[issuer]);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized)
}

/// Extracted from a valid `Authorization: Bearer <jwt>` header. Any recognized role passes
/// this extractor; handlers that need a specific role call [`DashboardAuth::require`].
pub struct DashboardAuth {
    pub subject: String,
    pub role: Role,
}

impl DashboardAuth {
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

impl FromRequest for DashboardAuth {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req).map_err(actix_web::Error::from))
    }
}

fn extract(req: &HttpRequest) -> Result<DashboardAuth, ApiError> {
    let config = req
        .app_data::<actix_web::web::Data<crate::config::ServerConfig>>()
        .ok_or_else(|| ApiError::Internal("server config not registered".into()))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;

    let claims = verify(token, &config.jwt_issuer, &config.jwt_secret)?;
    let role = claims.role.parse::<Role>().map_err(|_| ApiError::Unauthorized)?;

    Ok(DashboardAuth { subject: claims.sub, role })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify_round_trip() {
        let token = issue("operator-1", Role::Operator, "fleet-control", "secret", 900).unwrap();
        let claims = verify(&token, "fleet-control", "secret").unwrap();
        assert_eq!(claims.sub, "operator-1");
        assert_eq!(claims.role, "operator");
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let token = issue("operator-1", Role::Operator, "fleet-control", "secret", 900).unwrap();
        assert!(verify(&token, "some-other-issuer", "secret").is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_secret() {
        let token = issue("operator-1", Role::Operator, "fleet-control", "secret", 900).unwrap();
        assert!(verify(&token, "fleet-control", "wrong-secret").is_err());
    }
}
