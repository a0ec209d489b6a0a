//! Session and admin authentication primitives.
//!
//! Two token kinds share one HS256 secret: form-session tokens bind a
//! browser session to its origin IP, admin tokens carry the admin id.
//! Password hashing is bcrypt; password-reset tokens are stored only as
//! sha256 hashes of the issued value.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::db_storage::AdminStorage;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::Admin;

/// Claims of a public form-session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Origin IP the session was started from.
    pub ip: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of an admin token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Admin id (UUID).
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a form-session token bound to the caller's IP.
pub fn issue_session_token(ip: &str, secret: &str, days: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = SessionClaims {
        ip: ip.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(days)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to sign session token: {}", e)))
}

/// Verify a form-session token. Invalid or expired tokens are Unauthorized.
pub fn verify_session_token(token: &str, secret: &str) -> Result<SessionClaims, AppError> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

/// Issue an admin token for the given account id.
pub fn issue_admin_token(admin_id: Uuid, secret: &str, hours: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = AdminClaims {
        sub: admin_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to sign admin token: {}", e)))
}

/// Verify an admin token. Invalid or expired tokens are Unauthorized.
pub fn verify_admin_token(token: &str, secret: &str) -> Result<AdminClaims, AppError> {
    decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
}

/// Bcrypt-hash a password with the configured cost factor.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(password, cost)
        .map_err(|e| AppError::InternalError(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Failed to verify password: {}", e)))
}

/// Generate a password-reset token.
///
/// Returns (raw, hash): the raw value goes to the admin once, only the
/// sha256 hex hash is stored.
pub fn new_reset_token() -> (String, String) {
    let raw = Uuid::new_v4().simple().to_string();
    let hash = hash_reset_token(&raw);
    (raw, hash)
}

/// sha256 hex of a reset token, for storage and lookup.
pub fn hash_reset_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Extractor for admin-protected endpoints.
///
/// Reads the `Authorization: Bearer` header, verifies the admin token,
/// loads the account and rejects blocked or deleted accounts.
pub struct AdminAuth(pub Admin);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        let claims = verify_admin_token(token, &state.config.jwt_secret)?;

        let admin_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let storage = AdminStorage::new(state.db.clone());
        let admin = storage
            .find_by_id(admin_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Admin account no longer exists".to_string()))?;

        if admin.is_blocked {
            return Err(AppError::Forbidden("Your account is blocked".to_string()));
        }

        Ok(AdminAuth(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-at-least-16-chars";

    #[test]
    fn test_session_token_roundtrip() {
        let token = issue_session_token("203.0.113.7", SECRET, 7).unwrap();
        let claims = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(claims.ip, "203.0.113.7");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_admin_token_roundtrip() {
        let id = Uuid::new_v4();
        let token = issue_admin_token(id, SECRET, 24).unwrap();
        let claims = verify_admin_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id.to_string());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_session_token("1.2.3.4", SECRET, 7).unwrap();
        assert!(verify_session_token(&token, "another-secret-16-chars").is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_session_token("not-a-jwt", SECRET).is_err());
        assert!(verify_admin_token("", SECRET).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Expired well past the default 60s validation leeway
        let now = Utc::now();
        let claims = SessionClaims {
            ip: "1.2.3.4".to_string(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_session_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_password_hash_roundtrip() {
        // Minimum cost keeps the test fast
        let hash = hash_password("hunter2!", 4).unwrap();
        assert!(verify_password("hunter2!", &hash).unwrap());
        assert!(!verify_password("hunter3!", &hash).unwrap());
    }

    #[test]
    fn test_reset_token_hashing() {
        let (raw, hash) = new_reset_token();
        assert_ne!(raw, hash);
        assert_eq!(hash, hash_reset_token(&raw));
        assert_eq!(hash.len(), 64); // sha256 hex

        let (raw2, _) = new_reset_token();
        assert_ne!(raw, raw2);
    }
}
