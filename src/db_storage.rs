use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Admin, AnalyticsResponse, LabelCount, Lead, LeadListQuery, LoginLog, StatusCount};

/// Database storage service for lead records.
///
/// Handlers mutate a `Lead` in memory, run the scoring engine, then hand the
/// record here - the storage layer never recomputes derived fields itself.
pub struct LeadStorage {
    pool: PgPool,
}

impl LeadStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Next lead number for a session token (1-based).
    pub async fn next_lead_number(&self, token: &str) -> Result<i32, AppError> {
        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(lead_number), 0) + 1 FROM leads WHERE user_token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }

    /// Insert a freshly drafted lead and return the stored row.
    pub async fn insert(&self, lead: &Lead) -> Result<Lead, AppError> {
        let stored = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                id, user_token, lead_number, current_step,
                full_name, email, phone,
                vision, budget_plan, timeline,
                big_idea, audience, problem, references_text, must_haves,
                score, priority, derived_tags,
                status, is_completed, submitted_at, admin_notes,
                source, utm, user_agent, ip_address, country,
                whatsapp_opened, whatsapp_opened_at, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25, $26, $27, $28, $29, $30
            )
            RETURNING *
            "#,
        )
        .bind(lead.id)
        .bind(&lead.user_token)
        .bind(lead.lead_number)
        .bind(lead.current_step)
        .bind(&lead.full_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.vision)
        .bind(&lead.budget_plan)
        .bind(&lead.timeline)
        .bind(&lead.big_idea)
        .bind(&lead.audience)
        .bind(&lead.problem)
        .bind(&lead.references)
        .bind(&lead.must_haves)
        .bind(lead.score)
        .bind(&lead.priority)
        .bind(lead.derived_tags.clone())
        .bind(&lead.status)
        .bind(lead.is_completed)
        .bind(lead.submitted_at)
        .bind(&lead.admin_notes)
        .bind(&lead.source)
        .bind(lead.utm.clone())
        .bind(&lead.user_agent)
        .bind(&lead.ip_address)
        .bind(&lead.country)
        .bind(lead.whatsapp_opened)
        .bind(lead.whatsapp_opened_at)
        .bind(lead.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    /// Persist the mutable portion of a lead (form fields + derived fields).
    ///
    /// Identity, provenance and admin-owned fields are not written here:
    /// status changes go through `update_status`.
    pub async fn save(&self, lead: &Lead) -> Result<Lead, AppError> {
        let stored = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads SET
                current_step = $2,
                full_name = $3, email = $4, phone = $5,
                vision = $6, budget_plan = $7, timeline = $8,
                big_idea = $9, audience = $10, problem = $11,
                references_text = $12, must_haves = $13,
                score = $14, priority = $15, derived_tags = $16,
                is_completed = $17, submitted_at = $18,
                whatsapp_opened = $19, whatsapp_opened_at = $20,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(lead.id)
        .bind(lead.current_step)
        .bind(&lead.full_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.vision)
        .bind(&lead.budget_plan)
        .bind(&lead.timeline)
        .bind(&lead.big_idea)
        .bind(&lead.audience)
        .bind(&lead.problem)
        .bind(&lead.references)
        .bind(&lead.must_haves)
        .bind(lead.score)
        .bind(&lead.priority)
        .bind(lead.derived_tags.clone())
        .bind(lead.is_completed)
        .bind(lead.submitted_at)
        .bind(lead.whatsapp_opened)
        .bind(lead.whatsapp_opened_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    /// Latest lead for a session token, by lead number.
    pub async fn latest_by_token(&self, token: &str) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE user_token = $1 ORDER BY lead_number DESC LIMIT 1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    /// A specific lead, scoped to its owning token.
    pub async fn find_for_token(&self, id: Uuid, token: &str) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE id = $1 AND user_token = $2",
        )
        .bind(id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    /// All leads of one session token, newest first.
    pub async fn list_by_token(&self, token: &str) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE user_token = $1 ORDER BY lead_number DESC",
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    /// Paginated admin listing with status/priority/budget-tier/search filters.
    /// Returns the page of leads plus the total matching count.
    pub async fn list(&self, query: &LeadListQuery) -> Result<(Vec<Lead>, i64), AppError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM leads WHERE 1=1");
        push_lead_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM leads WHERE 1=1");
        push_lead_filters(&mut qb, query);
        qb.push(" ORDER BY submitted_at DESC NULLS LAST, created_at DESC");
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let leads = qb.build_query_as::<Lead>().fetch_all(&self.pool).await?;

        Ok((leads, total))
    }

    /// Set lifecycle status (and optionally admin notes) on a lead.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        admin_notes: Option<&str>,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $2,
                admin_notes = COALESCE($3, admin_notes),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(admin_notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    /// Status counts, total and today's count for the admin dashboard.
    pub async fn stats(&self) -> Result<(Vec<StatusCount>, i64, i64), AppError> {
        let by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM leads GROUP BY status ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;

        let today: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM leads WHERE submitted_at >= date_trunc('day', now())",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((by_status, total, today))
    }

    /// Aggregations over derived fields for the analytics view.
    pub async fn analytics(&self) -> Result<AnalyticsResponse, AppError> {
        let by_priority = sqlx::query_as::<_, LabelCount>(
            "SELECT priority AS label, COUNT(*) AS count FROM leads GROUP BY priority ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_source = sqlx::query_as::<_, LabelCount>(
            r#"
            SELECT COALESCE(source, 'unknown') AS label, COUNT(*) AS count
            FROM leads GROUP BY 1 ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let by_country = sqlx::query_as::<_, LabelCount>(
            r#"
            SELECT COALESCE(country, 'Unknown') AS label, COUNT(*) AS count
            FROM leads GROUP BY 1 ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let average_score: f64 =
            sqlx::query_scalar("SELECT COALESCE(AVG(score), 0)::FLOAT8 FROM leads")
                .fetch_one(&self.pool)
                .await?;

        let completed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE is_completed = true")
                .fetch_one(&self.pool)
                .await?;

        let incomplete: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE is_completed = false")
                .fetch_one(&self.pool)
                .await?;

        Ok(AnalyticsResponse {
            success: true,
            by_priority,
            by_source,
            by_country,
            average_score,
            completed,
            incomplete,
        })
    }
}

/// Append the WHERE-clause filters shared by the listing and count queries.
fn push_lead_filters(qb: &mut QueryBuilder<Postgres>, query: &LeadListQuery) {
    if let Some(status) = &query.status {
        if status != "all" && !status.is_empty() {
            qb.push(" AND status = ");
            qb.push_bind(status.clone());
        }
    }

    if let Some(priority) = &query.priority {
        if !priority.is_empty() {
            qb.push(" AND priority = ");
            qb.push_bind(priority.clone());
        }
    }

    if let Some(budget_tier) = &query.budget_tier {
        if !budget_tier.is_empty() {
            qb.push(" AND derived_tags->>'budgetTier' = ");
            qb.push_bind(budget_tier.clone());
        }
    }

    if let Some(search) = &query.search {
        if !search.is_empty() {
            let pattern = format!("%{}%", search);
            qb.push(" AND (full_name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR email ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR phone ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }
}

/// Database storage service for admin accounts and login logs.
pub struct AdminStorage {
    pool: PgPool,
}

impl AdminStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Admin, AppError> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, name, email, password_hash, role, is_blocked, created_at)
            VALUES ($1, $2, $3, $4, 'admin', false, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(admin)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, AppError> {
        let admin = sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(admin)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, AppError> {
        let admin = sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(admin)
    }

    pub async fn list(&self) -> Result<Vec<Admin>, AppError> {
        let admins = sqlx::query_as::<_, Admin>("SELECT * FROM admins ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(admins)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Admin, AppError> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            UPDATE admins SET name = $2, email = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(admin)
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE admins
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE admins
            SET reset_token_hash = $2, reset_token_expires = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up an admin by a non-expired reset token hash.
    pub async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Admin>, AppError> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            SELECT * FROM admins
            WHERE reset_token_hash = $1 AND reset_token_expires > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    /// Block an admin account. Returns false when the id does not exist.
    pub async fn set_blocked(&self, id: Uuid, blocked: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE admins SET is_blocked = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(blocked)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_login_log(
        &self,
        admin_id: Uuid,
        email: &str,
        ip_address: Option<&str>,
        location: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO login_logs (id, admin_id, email, ip_address, location, login_time)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(email)
        .bind(ip_address)
        .bind(location)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_login_logs(&self) -> Result<Vec<LoginLog>, AppError> {
        let logs = sqlx::query_as::<_, LoginLog>(
            "SELECT * FROM login_logs ORDER BY login_time DESC LIMIT 500",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
