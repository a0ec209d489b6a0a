mod admin_handlers;
mod auth;
mod auth_handlers;
mod config;
mod db;
mod db_storage;
mod errors;
mod geo;
mod handlers;
mod models;
mod scoring;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::geo::GeoService;

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the filesystem and serves it with the
/// appropriate content type, or a 404 when the file is missing.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page, configured to load the spec served by
/// `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Lead Intake API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool and the geolocation
/// service, then wires the public form routes, auth routes and the protected
/// admin surface behind CORS, tracing, body-size and rate limits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_intake_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // IP geolocation service (24h cache, circuit breaker)
    let geo = GeoService::new(config.geo_base_url.clone());
    tracing::info!("Geolocation service initialized");

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        db: db.pool.clone(),
        config: config.clone(),
        geo,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Public form routes: rate limited and body-size capped
    let form_routes = Router::new()
        .route("/api/form/start", post(handlers::start_form))
        .route("/api/form/save", post(handlers::save_step))
        .route("/api/form/submit", post(handlers::submit_form))
        .route("/api/form/track-whatsapp", post(handlers::track_whatsapp))
        .route("/api/form/data", get(handlers::get_form_data))
        .route("/api/form/user-forms", get(handlers::get_user_forms))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 2MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf.clone(),
                }),
        );

    // Auth routes share the rate limiter (login brute-force protection)
    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth_handlers::register_admin))
        .route("/api/auth/login", post(auth_handlers::login_admin))
        .route(
            "/api/auth/forgot-password",
            post(auth_handlers::forgot_password),
        )
        .route(
            "/api/auth/reset-password/:token",
            put(auth_handlers::reset_password),
        )
        .layer(GovernorLayer {
            config: governor_conf,
        });

    // Admin surface: protection happens in the AdminAuth extractor
    let admin_routes = Router::new()
        .route("/api/admin/leads", get(admin_handlers::get_all_leads))
        .route(
            "/api/admin/leads/:id/status",
            patch(admin_handlers::update_lead_status),
        )
        .route("/api/admin/stats", get(admin_handlers::get_lead_stats))
        .route(
            "/api/admin/analytics",
            get(admin_handlers::get_lead_analytics),
        )
        .route("/api/admin/admins", get(admin_handlers::get_all_admins))
        .route("/api/admin/block/:id", put(admin_handlers::block_admin))
        .route("/api/admin/login-logs", get(admin_handlers::get_login_logs))
        .route(
            "/api/profile/update-profile",
            put(auth_handlers::update_profile),
        )
        .route(
            "/api/profile/change-password",
            put(auth_handlers::change_password),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .merge(form_routes)
        .merge(auth_routes)
        .merge(admin_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
