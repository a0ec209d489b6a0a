use crate::auth::{issue_session_token, verify_session_token};
use crate::config::Config;
use crate::db_storage::LeadStorage;
use crate::errors::{AppError, ResultExt};
use crate::geo::GeoService;
use crate::models::*;
use crate::scoring;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json as SqlJson;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;

/// The form step index that marks a completed submission.
const FINAL_STEP: i32 = 5;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// IP geolocation service (cached, circuit-broken).
    pub geo: GeoService,
}

/// Best-effort client IP: X-Forwarded-For (first hop) with the socket
/// address as fallback. The service runs behind a proxy in production.
pub fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-intake-api",
            "version": "0.1.0"
        })),
    )
}

/// Root route, kept alive for uptime probes pointed at "/".
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Server is running",
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// POST /api/form/start
///
/// Opens a new form session: mints a session token bound to the caller IP,
/// resolves the origin country, and creates the next lead for that token
/// with its provenance captured. The scoring engine runs before the insert
/// so even an empty draft carries consistent derived fields.
pub async fn start_form(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Option<Json<StartFormRequest>>,
) -> Result<Json<StartFormResponse>, AppError> {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    let ip = client_ip(&headers, &addr);

    let token = issue_session_token(&ip, &state.config.jwt_secret, state.config.session_token_days)?;

    let country = state.geo.lookup(&ip).await;
    let storage = LeadStorage::new(state.db.clone());
    let lead_number = storage.next_lead_number(&token).await?;

    let mut lead = Lead::draft(token.clone(), lead_number);
    lead.source = request.source;
    lead.utm = request.utm.map(SqlJson);
    lead.user_agent = user_agent(&headers);
    lead.ip_address = Some(ip.clone());
    lead.country = Some(country.country);

    scoring::apply(&mut lead);
    let stored = storage
        .insert(&lead)
        .await
        .context("Failed to store new lead")?;

    tracing::info!(
        "Form started: lead_number={}, ip={}, country={:?}",
        lead_number,
        ip,
        stored.country
    );

    Ok(Json(StartFormResponse {
        success: true,
        message: "Form started".to_string(),
        token,
        lead_number,
        form: stored,
    }))
}

/// POST /api/form/save
///
/// Saves one step of the multi-step form against the session's latest lead,
/// creating it if the start call never happened (e.g. resumed session).
/// Derived fields are recomputed before the persist, so every incremental
/// save leaves score/priority/tags consistent with the current answers.
pub async fn save_step(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SaveStepRequest>,
) -> Result<Json<FormResponse>, AppError> {
    if payload.token.is_empty() {
        return Err(AppError::Unauthorized("Token is required".to_string()));
    }
    verify_session_token(&payload.token, &state.config.jwt_secret)?;

    let storage = LeadStorage::new(state.db.clone());

    let (mut lead, is_new) = match storage.latest_by_token(&payload.token).await? {
        Some(lead) => (lead, false),
        None => {
            let lead_number = storage.next_lead_number(&payload.token).await?;
            (Lead::draft(payload.token.clone(), lead_number), true)
        }
    };

    if let Some(data) = &payload.data {
        lead.apply_fields(data);
    }
    lead.current_step = payload.step;
    if payload.step >= FINAL_STEP && !lead.is_completed {
        lead.is_completed = true;
        lead.submitted_at = Some(Utc::now());
    }

    scoring::apply(&mut lead);
    let stored = if is_new {
        storage.insert(&lead).await?
    } else {
        storage.save(&lead).await?
    };

    tracing::debug!(
        "Step {} saved for lead {} (score={}, priority={})",
        payload.step,
        stored.id,
        stored.score,
        stored.priority
    );

    Ok(Json(FormResponse {
        success: true,
        message: "Step saved successfully".to_string(),
        form: stored,
    }))
}

/// POST /api/form/submit
///
/// Terminal submission: merges any final fields, marks the lead completed
/// and stamps the submission time. The engine runs one last time so the
/// stored score reflects the full answer set.
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitFormRequest>,
) -> Result<Json<FormResponse>, AppError> {
    if payload.token.is_empty() {
        return Err(AppError::Unauthorized("Token is required".to_string()));
    }
    verify_session_token(&payload.token, &state.config.jwt_secret)?;

    let storage = LeadStorage::new(state.db.clone());
    let mut lead = storage
        .latest_by_token(&payload.token)
        .await?
        .ok_or_else(|| AppError::NotFound("No form in progress for this session".to_string()))?;

    if let Some(data) = &payload.data {
        lead.apply_fields(data);
    }
    lead.current_step = FINAL_STEP;
    lead.is_completed = true;
    if lead.submitted_at.is_none() {
        lead.submitted_at = Some(Utc::now());
    }

    scoring::apply(&mut lead);
    let stored = storage
        .save(&lead)
        .await
        .context("Failed to persist submission")?;

    tracing::info!(
        "Form submitted: lead={}, score={}, priority={}",
        stored.id,
        stored.score,
        stored.priority
    );

    Ok(Json(FormResponse {
        success: true,
        message: "Form submitted successfully".to_string(),
        form: stored,
    }))
}

/// POST /api/form/track-whatsapp
///
/// Records that the user opened the WhatsApp handoff link after submitting.
pub async fn track_whatsapp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackWhatsappRequest>,
) -> Result<Json<FormResponse>, AppError> {
    verify_session_token(&payload.token, &state.config.jwt_secret)?;

    let storage = LeadStorage::new(state.db.clone());
    let mut lead = storage
        .latest_by_token(&payload.token)
        .await?
        .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

    if !lead.whatsapp_opened {
        lead.whatsapp_opened = true;
        lead.whatsapp_opened_at = Some(Utc::now());
    }

    scoring::apply(&mut lead);
    let stored = storage.save(&lead).await?;

    Ok(Json(FormResponse {
        success: true,
        message: "WhatsApp open tracked".to_string(),
        form: stored,
    }))
}

/// GET /api/form/data?token=..&leadId=..
///
/// Fetch a specific lead (or the latest one) owned by the session token.
pub async fn get_form_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FormDataQuery>,
) -> Result<Json<FormResponse>, AppError> {
    if params.token.is_empty() {
        return Err(AppError::BadRequest("Token is required".to_string()));
    }
    verify_session_token(&params.token, &state.config.jwt_secret)?;

    let storage = LeadStorage::new(state.db.clone());
    let lead = match params.lead_id {
        Some(id) => storage.find_for_token(id, &params.token).await?,
        None => storage.latest_by_token(&params.token).await?,
    }
    .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

    Ok(Json(FormResponse {
        success: true,
        message: "Form fetched".to_string(),
        form: lead,
    }))
}

/// GET /api/form/user-forms?token=..
///
/// All leads submitted by this session, newest first.
pub async fn get_user_forms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserFormsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.token.is_empty() {
        return Err(AppError::BadRequest("Token is required".to_string()));
    }
    verify_session_token(&params.token, &state.config.jwt_secret)?;

    let storage = LeadStorage::new(state.db.clone());
    let forms = storage.list_by_token(&params.token).await?;

    Ok(Json(json!({
        "success": true,
        "forms": forms,
    })))
}
