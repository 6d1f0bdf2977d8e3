//! Configuration module for the site backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.
//! Missing integration credentials are not fatal here; the affected operation
//! reports a configuration error when it is actually used.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Identity provider connection settings.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub api_url: String,
    pub project_id: Option<String>,
    pub api_token: Option<String>,
}

/// Translation-management service settings.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub api_url: Option<String>,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    /// Upper bound for one push/pull/package run
    pub timeout: Duration,
    /// Upper bound for a single upstream response body
    pub max_response_bytes: usize,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Path to the SQLite database inspected by the admin tools
    pub db_path: PathBuf,
    /// Pre-shared key for the admin API (required in production)
    pub admin_api_key: Option<String>,
    pub supported_locales: Vec<String>,
    pub default_locale: String,
    /// Root directory of `<locale>/<namespace>.json` files
    pub locales_dir: PathBuf,
    pub query_timeout: Duration,
    pub query_max_rows: usize,
    pub identity: IdentityConfig,
    pub translation: TranslationConfig,
}

const DEFAULT_LOCALES: &str = "en,ar";
const DEFAULT_LOCALE: &str = "en";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let environment = Environment::parse(
            &env::var("SITE_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let bind_addr = env::var("SITE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid SITE_BIND_ADDR format");

        let log_level = env::var("SITE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("SITE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let db_path = env::var("SITE_DB_PATH")
            .unwrap_or_else(|_| "./data/site.sqlite".to_string())
            .into();

        let admin_api_key = non_empty_var("SITE_ADMIN_API_KEY");

        let supported_locales = parse_locales(
            &env::var("SITE_LOCALES").unwrap_or_else(|_| DEFAULT_LOCALES.to_string()),
        );
        let default_locale = pick_default_locale(
            &supported_locales,
            &env::var("SITE_DEFAULT_LOCALE").unwrap_or_else(|_| DEFAULT_LOCALE.to_string()),
        );

        let locales_dir = env::var("SITE_LOCALES_DIR")
            .unwrap_or_else(|_| "./locales".to_string())
            .into();

        let query_timeout = Duration::from_millis(parse_var("SITE_QUERY_TIMEOUT_MS", 30_000));
        let query_max_rows = parse_var("SITE_QUERY_MAX_ROWS", 1000);

        let identity = IdentityConfig {
            api_url: env::var("IDENTITY_API_URL")
                .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".to_string()),
            project_id: non_empty_var("IDENTITY_PROJECT_ID"),
            api_token: non_empty_var("IDENTITY_API_TOKEN"),
        };

        let translation = TranslationConfig {
            api_url: non_empty_var("TRANSLATION_API_URL"),
            project_id: non_empty_var("TRANSLATION_PROJECT_ID"),
            api_key: non_empty_var("TRANSLATION_API_KEY"),
            timeout: Duration::from_secs(parse_var("SITE_TRANSLATION_TIMEOUT_SECS", 60)),
            max_response_bytes: parse_var("SITE_TRANSLATION_MAX_BYTES", 10 * 1024 * 1024),
        };

        Self {
            environment,
            bind_addr,
            log_level,
            log_format,
            db_path,
            admin_api_key,
            supported_locales,
            default_locale,
            locales_dir,
            query_timeout,
            query_max_rows,
            identity,
            translation,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Split a comma separated locale list, dropping blanks and duplicates.
fn parse_locales(raw: &str) -> Vec<String> {
    let mut locales: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let locale = part.trim().to_ascii_lowercase();
        if !locale.is_empty() && !locales.contains(&locale) {
            locales.push(locale);
        }
    }
    if locales.is_empty() {
        locales.push(DEFAULT_LOCALE.to_string());
    }
    locales
}

fn pick_default_locale(supported: &[String], requested: &str) -> String {
    let requested = requested.trim().to_ascii_lowercase();
    if supported.contains(&requested) {
        return requested;
    }
    let fallback = supported[0].clone();
    tracing::warn!(
        "SITE_DEFAULT_LOCALE {:?} is not supported, falling back to {:?}",
        requested,
        fallback
    );
    fallback
}
