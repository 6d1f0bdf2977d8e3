//! Developer site backend
//!
//! Resolves request locales, manages identity-provider backed sessions and
//! serves the admin database and translation tools.

mod api;
mod auth;
mod config;
mod cookies;
mod db;
mod errors;
mod locale;
mod session;
mod translations;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::DatabaseInspector;
use errors::{ApiError, AppError};
use locale::{LocaleConfig, TranslationStore};
use session::{IdentityClient, SessionService};
use translations::{LocaleFiles, TranslationSync};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub inspector: Arc<DatabaseInspector>,
    pub translations: Arc<TranslationStore>,
    pub translation_sync: Arc<TranslationSync>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool, identity: Arc<IdentityClient>) -> Self {
        let locales = LocaleConfig::new(
            config.supported_locales.clone(),
            config.default_locale.clone(),
        );
        let files = LocaleFiles::new(config.locales_dir.clone());

        let inspector = DatabaseInspector::new(pool, config.query_timeout, config.query_max_rows);
        let translation_sync = TranslationSync::new(
            files.clone(),
            config.translation.clone(),
            locales.supported().to_vec(),
        );
        let translations = TranslationStore::new(files, locales);
        let sessions = SessionService::new(identity, config.is_production());

        Self {
            config: Arc::new(config),
            inspector: Arc::new(inspector),
            translations: Arc::new(translations),
            translation_sync: Arc::new(translation_sync),
            sessions: Arc::new(sessions),
        }
    }

    /// Wrap an error with this deployment's disclosure policy.
    pub fn api_error(&self, error: AppError) -> ApiError {
        ApiError {
            error,
            development: self.config.is_development(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting developer site backend ({:?})", config.environment);
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Locales directory: {:?}", config.locales_dir);
    tracing::info!(
        "Locales: {:?} (default {})",
        config.supported_locales,
        config.default_locale
    );
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_api_key.is_none() {
        if config.is_production() {
            tracing::warn!("SITE_ADMIN_API_KEY is not set in production; the admin API is open!");
        } else {
            tracing::warn!("No admin API key configured (SITE_ADMIN_API_KEY). Admin authentication is disabled!");
        }
    }
    if config.identity.project_id.is_none() || config.identity.api_token.is_none() {
        tracing::warn!("Identity provider is not configured; session endpoints will report 503");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;

    let identity = Arc::new(IdentityClient::new(config.identity.clone()));
    let bind_addr = config.bind_addr;
    let state = AppState::new(config, pool.clone(), identity);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Database pool closed");

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let locales = Arc::new(state.translations.locales().clone());
    let admin_key = state.config.admin_api_key.clone();

    // Public routes; every response carries the resolved locale
    let site_routes = Router::new()
        .route("/api/locale", get(api::get_locale))
        .route("/api/i18n", get(api::get_page_translations))
        // Locale-prefixed variants used by server-rendered pages under /<locale>/
        .route("/{lang}/api/locale", get(api::get_locale))
        .route("/{lang}/api/i18n", get(api::get_page_translations))
        .route(
            "/api/auth/session",
            post(api::create_session)
                .get(api::get_session)
                .delete(api::logout),
        )
        .route("/api/auth/logout", post(api::logout))
        .layer(middleware::from_fn(move |req, next| {
            locale::locale_layer(locales.clone(), req, next)
        }));

    let admin_routes = Router::new()
        // Database tools
        .route("/db/health", get(api::db_health))
        .route("/db/tables", get(api::list_tables))
        .route("/db/tables/{table}", get(api::describe_table))
        .route(
            "/db/tables/{table}/rows",
            get(api::list_rows).post(api::create_row),
        )
        .route(
            "/db/tables/{table}/rows/{id}",
            put(api::update_row).delete(api::delete_row),
        )
        .route("/db/tables/{table}/export", get(api::export_table))
        .route("/db/query", post(api::run_query))
        .route("/db/analytics", get(api::growth_analytics))
        // Translations
        .route("/translations", get(api::list_translations))
        .route("/translations/run", post(api::run_translation_operation))
        .route("/translations/download", get(api::download_translations))
        .route(
            "/translations/{locale}/{namespace}",
            get(api::get_translation_file).put(api::put_translation_file),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_key_layer(admin_key.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(site_routes)
        .nest("/admin", admin_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutting down via Ctrl+C"),
        _ = terminate => tracing::info!("Shutting down via TERM signal"),
    }
}
