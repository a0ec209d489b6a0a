//! Admin authentication endpoints: registration, login, password reset and
//! self-service profile management.

use crate::auth::{
    hash_password, hash_reset_token, issue_admin_token, new_reset_token, verify_password, AdminAuth,
};
use crate::db_storage::AdminStorage;
use crate::errors::AppError;
use crate::handlers::{client_ip, AppState};
use crate::models::*;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// POST /api/auth/register
///
/// Create an admin account. Registration is open so the first admin can be
/// bootstrapped; lock the route down at the proxy once that is done.
pub async fn register_admin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::BadRequest("Name and email are required".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let storage = AdminStorage::new(state.db.clone());
    if storage.find_by_email(&payload.email).await?.is_some() {
        return Err(AppError::BadRequest("Admin already exists".to_string()));
    }

    let password_hash = hash_password(&payload.password, state.config.bcrypt_cost)?;
    let admin = storage
        .insert(payload.name.trim(), payload.email.trim(), &password_hash)
        .await?;

    tracing::info!("Admin created: {}", admin.email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Admin created successfully".to_string(),
            token: None,
            admin: AdminPublic::from(&admin),
        }),
    ))
}

/// POST /api/auth/login
///
/// Verify credentials, reject blocked accounts, issue an admin token and
/// record a login log row with the caller's IP and resolved country.
pub async fn login_admin(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let storage = AdminStorage::new(state.db.clone());

    let admin = storage
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;

    if !verify_password(&payload.password, &admin.password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    if admin.is_blocked {
        return Err(AppError::Forbidden("Your account is blocked".to_string()));
    }

    let token = issue_admin_token(admin.id, &state.config.jwt_secret, state.config.admin_token_hours)?;

    // Login log is best-effort: a logging failure must not block the login
    let ip = client_ip(&headers, &addr);
    let location = state.geo.lookup(&ip).await;
    if let Err(e) = storage
        .insert_login_log(admin.id, &admin.email, Some(&ip), Some(&location.country))
        .await
    {
        tracing::error!("Failed to record login log for {}: {}", admin.email, e);
    }

    tracing::info!("Admin login: {} from {}", admin.email, ip);

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token: Some(token),
        admin: AdminPublic::from(&admin),
    }))
}

/// POST /api/auth/forgot-password
///
/// Issue a one-time reset token valid for 15 minutes. Only the sha256 hash
/// is stored. Mail delivery is an external concern; the token is returned
/// in the response body for the operator to forward.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let storage = AdminStorage::new(state.db.clone());

    let admin = storage
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;

    let (raw_token, token_hash) = new_reset_token();
    let expires = Utc::now() + Duration::minutes(15);
    storage.set_reset_token(admin.id, &token_hash, expires).await?;

    tracing::info!("Password reset token issued for {}", admin.email);

    Ok(Json(json!({
        "message": "Password reset token issued",
        "resetToken": raw_token,
        "expiresAt": expires.to_rfc3339(),
    })))
}

/// PUT /api/auth/reset-password/:token
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if payload.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let storage = AdminStorage::new(state.db.clone());
    let admin = storage
        .find_by_reset_token(&hash_reset_token(&token))
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    let password_hash = hash_password(&payload.password, state.config.bcrypt_cost)?;
    storage.update_password(admin.id, &password_hash).await?;

    tracing::info!("Password reset completed for {}", admin.email);

    Ok(Json(json!({ "message": "Password reset successfully" })))
}

/// PUT /api/profile/update-profile
///
/// Update the authenticated admin's own name/email. Blank or absent fields
/// keep their current value.
pub async fn update_profile(
    AdminAuth(admin): AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&admin.name);
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&admin.email);

    let storage = AdminStorage::new(state.db.clone());
    let updated = storage.update_profile(admin.id, name, email).await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "admin": AdminPublic::from(&updated),
    })))
}

/// PUT /api/profile/change-password
pub async fn change_password(
    AdminAuth(admin): AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }

    if !verify_password(&payload.current_password, &admin.password_hash)? {
        return Err(AppError::Unauthorized(
            "Current password incorrect".to_string(),
        ));
    }

    // Prevent reusing the same password
    if verify_password(&payload.new_password, &admin.password_hash)? {
        return Err(AppError::BadRequest(
            "New password must be different".to_string(),
        ));
    }
    if payload.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.new_password, state.config.bcrypt_cost)?;
    let storage = AdminStorage::new(state.db.clone());
    storage.update_password(admin.id, &password_hash).await?;

    tracing::info!("Password changed for {}", admin.email);

    Ok(Json(json!({ "message": "Password changed successfully" })))
}
