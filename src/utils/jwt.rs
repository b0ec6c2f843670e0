// src/utils/jwt.rs

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::Role};

/// Bearer token payload.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// User id, as a string.
    pub sub: String,
    /// Role at login time.
    pub role: String,
    /// Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }

    /// Unknown role strings degrade to a plain user.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }
}

/// Issues an HS256 token valid for `ttl_seconds`.
pub fn sign_jwt(user_id: i64, role: Role, secret: &str, ttl_seconds: u64) -> Result<String, AppError> {
    let ttl = i64::try_from(ttl_seconds)
        .map_err(|_| AppError::InternalServerError("JWT lifetime out of range".to_string()))?;
    let exp = (Utc::now() + Duration::seconds(ttl)).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_owned(),
        exp: exp as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Checks signature and expiry.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))
}

/// Requires `Authorization: Bearer <token>` and puts the `Claims` into the
/// request extensions. Anything else is a 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::AuthError("Missing bearer token".to_string()))?;

    let claims = verify_jwt(token, &config.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin gate, layered inside `auth_middleware`. Global and tenant admins
/// pass; tenant limits are the handlers' job.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let role = req
        .extensions()
        .get::<Claims>()
        .map(Claims::role)
        .ok_or(AppError::AuthError("Missing bearer token".to_string()))?;

    if !role.is_admin() {
        return Err(AppError::Forbidden("Administrators only".to_string()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let token = sign_jwt(42, Role::AdminSupertaxis, "k", 60).unwrap();
        let claims = verify_jwt(&token, "k").unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role(), Role::AdminSupertaxis);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(1, Role::User, "k", 60).unwrap();
        assert!(matches!(verify_jwt(&token, "other"), Err(AppError::AuthError(_))));
    }

    #[test]
    fn unknown_role_is_a_plain_user() {
        let claims = Claims {
            sub: "x".into(),
            role: "root".into(),
            exp: 0,
        };
        assert_eq!(claims.role(), Role::User);
        assert!(claims.user_id().is_err());
    }
}
