use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::scoring::LeadTags;

// ============ Controlled Vocabularies ============

/// Project-vision categories selectable on the public form.
pub const VISION_CATEGORIES: &[&str] = &[
    "mobile",
    "webapp",
    "ecommerce",
    "dashboard",
    "ai",
    "ui/ux",
    "branding",
    "marketing",
    "chatbots",
    "landing-page",
    "content-ops",
    "maintenance",
];

/// Budget tiers selectable on the public form.
pub const BUDGET_TIERS: &[&str] = &["unsure", "4-8k", "8-12k", "12k+"];

/// Timeline tiers selectable on the public form.
pub const TIMELINE_TIERS: &[&str] = &["unsure", "2-4w", "1-2m", "2-3m", "3m+"];

/// Lifecycle statuses an admin can move a lead through.
/// Transitions are unconstrained; only membership is validated.
pub const LEAD_STATUSES: &[&str] = &[
    "Pending",
    "Contacted",
    "Qualified",
    "Converted",
    "Rejected",
];

pub fn is_valid_status(status: &str) -> bool {
    LEAD_STATUSES.contains(&status)
}

// ============ Database Models ============

/// One lead record: a single pass through the multi-step intake form.
///
/// A browser session (identified by `user_token`) can produce several leads;
/// `lead_number` orders them. The `score`/`priority`/`derived_tags` fields are
/// written only by the scoring engine, immediately before each persist.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Unique identifier for the lead.
    pub id: Uuid,
    /// Session token correlating all leads from one form session.
    pub user_token: String,
    /// Which lead this is for the session (1-based, monotonically increasing).
    pub lead_number: i32,
    /// Index of the last form step the user saved.
    pub current_step: i32,

    // Contact fields
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    // Project fields
    /// Selected project-vision categories, in selection order.
    pub vision: Vec<String>,
    /// Budget tier from `BUDGET_TIERS`.
    pub budget_plan: Option<String>,
    /// Timeline tier from `TIMELINE_TIERS`.
    pub timeline: Option<String>,

    // Free-text detail fields
    pub big_idea: Option<String>,
    pub audience: Option<String>,
    pub problem: Option<String>,
    #[sqlx(rename = "references_text")]
    pub references: Option<String>,
    pub must_haves: Option<String>,

    // Derived fields - written only by the scoring engine
    pub score: i32,
    pub priority: String,
    pub derived_tags: Json<LeadTags>,

    // Lifecycle
    pub status: String,
    pub is_completed: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,

    // Provenance
    pub source: Option<String>,
    /// Raw campaign-attribution parameters as sent by the client.
    pub utm: Option<Json<serde_json::Value>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,

    // Engagement
    pub whatsapp_opened: bool,
    pub whatsapp_opened_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// A fresh draft lead for a session token, before its first persist.
    pub fn draft(user_token: String, lead_number: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_token,
            lead_number,
            current_step: 0,
            full_name: None,
            email: None,
            phone: None,
            vision: Vec::new(),
            budget_plan: None,
            timeline: None,
            big_idea: None,
            audience: None,
            problem: None,
            references: None,
            must_haves: None,
            score: 0,
            priority: "Nurture".to_string(),
            derived_tags: Json(LeadTags::default()),
            status: "Pending".to_string(),
            is_completed: false,
            submitted_at: None,
            admin_notes: None,
            source: None,
            utm: None,
            user_agent: None,
            ip_address: None,
            country: None,
            whatsapp_opened: false,
            whatsapp_opened_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Merge whitelisted form fields into the lead.
    /// Fields absent from the payload are left untouched, mirroring the
    /// partial-save behavior of the multi-step form.
    pub fn apply_fields(&mut self, fields: &LeadFields) {
        if let Some(v) = &fields.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(v) = &fields.email {
            self.email = Some(v.clone());
        }
        if let Some(v) = &fields.phone {
            self.phone = Some(v.clone());
        }
        if let Some(v) = &fields.vision {
            self.vision = v.clone();
        }
        if let Some(v) = &fields.budget_plan {
            self.budget_plan = Some(v.clone());
        }
        if let Some(v) = &fields.timeline {
            self.timeline = Some(v.clone());
        }
        if let Some(v) = &fields.big_idea {
            self.big_idea = Some(v.clone());
        }
        if let Some(v) = &fields.audience {
            self.audience = Some(v.clone());
        }
        if let Some(v) = &fields.problem {
            self.problem = Some(v.clone());
        }
        if let Some(v) = &fields.references {
            self.references = Some(v.clone());
        }
        if let Some(v) = &fields.must_haves {
            self.must_haves = Some(v.clone());
        }
    }
}

/// An admin account for the lead-management surface.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Bcrypt hash. Never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_blocked: bool,
    /// sha256 hex of the last issued reset token, if any.
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Public projection of an admin account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPublic {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<&Admin> for AdminPublic {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            name: admin.name.clone(),
            email: admin.email.clone(),
            role: admin.role.clone(),
        }
    }
}

/// One successful admin login.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLog {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    /// Country resolved from the login IP.
    pub location: Option<String>,
    pub login_time: DateTime<Utc>,
}

// ============ Form API Request/Response Models ============

/// Body for POST /api/form/start.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFormRequest {
    /// Acquisition channel reported by the frontend (e.g. "instagram", "referral").
    pub source: Option<String>,
    /// Raw campaign-attribution parameters (utm_source, utm_campaign, ...).
    pub utm: Option<serde_json::Value>,
}

/// User-editable form fields, as sent by the frontend on save/submit.
/// Absent fields are left untouched on the stored lead.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFields {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub vision: Option<Vec<String>>,
    pub budget_plan: Option<String>,
    pub timeline: Option<String>,
    pub big_idea: Option<String>,
    pub audience: Option<String>,
    pub problem: Option<String>,
    pub references: Option<String>,
    pub must_haves: Option<String>,
}

/// Body for POST /api/form/save.
#[derive(Debug, Deserialize)]
pub struct SaveStepRequest {
    pub token: String,
    pub step: i32,
    pub data: Option<LeadFields>,
}

/// Body for POST /api/form/submit.
#[derive(Debug, Deserialize)]
pub struct SubmitFormRequest {
    pub token: String,
    pub data: Option<LeadFields>,
}

/// Body for POST /api/form/track-whatsapp.
#[derive(Debug, Deserialize)]
pub struct TrackWhatsappRequest {
    pub token: String,
}

/// Query string for GET /api/form/data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDataQuery {
    pub token: String,
    pub lead_id: Option<Uuid>,
}

/// Query string for GET /api/form/user-forms.
#[derive(Debug, Deserialize)]
pub struct UserFormsQuery {
    pub token: String,
}

/// Response for POST /api/form/start.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFormResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub form: Lead,
    pub lead_number: i32,
}

/// Generic envelope for save/submit/data responses.
#[derive(Debug, Serialize)]
pub struct FormResponse {
    pub success: bool,
    pub message: String,
    pub form: Lead,
}

// ============ Admin API Models ============

/// Query string for GET /api/admin/leads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Lifecycle status filter; "all" (or absent) disables the filter.
    pub status: Option<String>,
    /// Priority filter (Hot / Warm / Nurture).
    pub priority: Option<String>,
    /// Filter on derived_tags.budgetTier.
    pub budget_tier: Option<String>,
    /// Case-insensitive search over full name, email and phone.
    pub search: Option<String>,
}

/// Pagination envelope mirrored back to the admin UI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_leads: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Response for GET /api/admin/leads.
#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub success: bool,
    pub leads: Vec<Lead>,
    pub pagination: Pagination,
}

/// Body for PATCH /api/admin/leads/:id/status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    pub admin_notes: Option<String>,
}

/// One (status, count) row from the stats aggregation.
#[derive(Debug, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Response for GET /api/admin/stats.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub success: bool,
    pub by_status: Vec<StatusCount>,
    pub total: i64,
    pub today: i64,
}

/// One (label, count) row from an analytics aggregation.
#[derive(Debug, FromRow, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Response for GET /api/admin/analytics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub success: bool,
    pub by_priority: Vec<LabelCount>,
    pub by_source: Vec<LabelCount>,
    pub by_country: Vec<LabelCount>,
    pub average_score: f64,
    pub completed: i64,
    pub incomplete: i64,
}

// ============ Auth API Models ============

/// Body for POST /api/auth/register.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body for POST /api/auth/login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for POST /api/auth/forgot-password.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Body for PUT /api/auth/reset-password/:token.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Body for PUT /api/profile/update-profile.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Body for PUT /api/profile/change-password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response for login/register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub admin: AdminPublic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        for status in LEAD_STATUSES {
            assert!(is_valid_status(status));
        }
        assert!(!is_valid_status("Archived"));
        assert!(!is_valid_status("pending")); // case-sensitive, matches admin UI values
    }

    #[test]
    fn test_lead_fields_camel_case() {
        let json = r#"{
            "fullName": "Ada Lovelace",
            "budgetPlan": "12k+",
            "mustHaves": "stripe checkout",
            "vision": ["ecommerce", "webapp"]
        }"#;

        let fields: LeadFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(fields.budget_plan.as_deref(), Some("12k+"));
        assert_eq!(fields.must_haves.as_deref(), Some("stripe checkout"));
        assert_eq!(fields.vision.as_deref(), Some(&["ecommerce".to_string(), "webapp".to_string()][..]));
    }

    #[test]
    fn test_admin_password_never_serialized() {
        let admin = Admin {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: "admin".to_string(),
            is_blocked: false,
            reset_token_hash: Some("abc".to_string()),
            reset_token_expires: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        let json = serde_json::to_string(&admin).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains("resetTokenHash"));
    }
}
