//! Admin surface: lead review/management and account administration.
//! Every handler here requires a valid admin bearer token via `AdminAuth`.

use crate::auth::AdminAuth;
use crate::db_storage::{AdminStorage, LeadStorage};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// GET /api/admin/leads
///
/// Paginated lead listing for the admin table. Supports `status`,
/// `priority`, `budgetTier` and `search` filters; sorted newest
/// submissions first.
pub async fn get_all_leads(
    AdminAuth(_admin): AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<LeadListResponse>, AppError> {
    let storage = LeadStorage::new(state.db.clone());
    let (leads, total) = storage.list(&query).await?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(LeadListResponse {
        success: true,
        leads,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_leads: total,
            has_next: page < total_pages,
            has_prev: page > 1,
        },
    }))
}

/// PATCH /api/admin/leads/:id/status
///
/// Move a lead to a new lifecycle status and optionally attach notes.
/// Any status may follow any other; only vocabulary membership is checked.
pub async fn update_lead_status(
    AdminAuth(admin): AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_valid_status(&payload.status) {
        return Err(AppError::BadRequest("Invalid status".to_string()));
    }

    let storage = LeadStorage::new(state.db.clone());
    let lead = storage
        .update_status(lead_id, &payload.status, payload.admin_notes.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;

    tracing::info!(
        "Lead {} moved to {} by {}",
        lead_id,
        payload.status,
        admin.email
    );

    Ok(Json(json!({
        "success": true,
        "message": "Lead status updated",
        "lead": lead,
    })))
}

/// GET /api/admin/stats
pub async fn get_lead_stats(
    AdminAuth(_admin): AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, AppError> {
    let storage = LeadStorage::new(state.db.clone());
    let (by_status, total, today) = storage.stats().await?;

    Ok(Json(StatsResponse {
        success: true,
        by_status,
        total,
        today,
    }))
}

/// GET /api/admin/analytics
///
/// Aggregations over the derived fields: priority and channel breakdowns,
/// origin countries, average score, completion split.
pub async fn get_lead_analytics(
    AdminAuth(_admin): AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let storage = LeadStorage::new(state.db.clone());
    let analytics = storage.analytics().await?;

    Ok(Json(analytics))
}

/// GET /api/admin/admins
pub async fn get_all_admins(
    AdminAuth(_admin): AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Admin>>, AppError> {
    let storage = AdminStorage::new(state.db.clone());
    let admins = storage.list().await?;

    // Admin serialization skips password/reset fields
    Ok(Json(admins))
}

/// PUT /api/admin/block/:id
pub async fn block_admin(
    AdminAuth(admin): AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let storage = AdminStorage::new(state.db.clone());
    let blocked = storage.set_blocked(id, true).await?;

    if !blocked {
        return Err(AppError::NotFound("Admin not found".to_string()));
    }

    tracing::warn!("Admin {} blocked by {}", id, admin.email);

    Ok(Json(json!({ "message": "Admin blocked successfully" })))
}

/// GET /api/admin/login-logs
pub async fn get_login_logs(
    AdminAuth(_admin): AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoginLog>>, AppError> {
    let storage = AdminStorage::new(state.db.clone());
    let logs = storage.list_login_logs().await?;

    Ok(Json(logs))
}
