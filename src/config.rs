use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub geo_base_url: String,
    /// Bcrypt cost factor. Lowered in dev environments to speed up tests.
    pub bcrypt_cost: u32,
    /// Lifetime of a public form-session token, in days.
    pub session_token_days: i64,
    /// Lifetime of an admin token, in hours.
    pub admin_token_hours: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("JWT_SECRET cannot be empty");
                    }
                    if secret.len() < 16 {
                        anyhow::bail!("JWT_SECRET must be at least 16 characters");
                    }
                    Ok(secret)
                })?,
            geo_base_url: std::env::var("GEO_BASE_URL")
                .unwrap_or_else(|_| "http://ip-api.com".to_string()),
            bcrypt_cost: std::env::var("BCRYPT_COST")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(bcrypt::DEFAULT_COST),
            session_token_days: std::env::var("SESSION_TOKEN_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(7),
            admin_token_hours: std::env::var("ADMIN_TOKEN_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(24),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Geo Base URL: {}", config.geo_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
