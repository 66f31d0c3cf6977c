use std::env;
use std::time::Duration;

use crate::infrastructure::db::{PoolSettings, Provider};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoggerFormat {
    /// Human-readable output for local development.
    Default,
    /// JSON lines for cloud log collectors.
    Cloud,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_port: u16,
    pub api_prefix: String,
    pub installed_modules: Vec<String>,
    pub database_provider: Option<Provider>,
    pub pool: PoolSettings,
    pub cors: CorsConfig,
    pub use_secweb: bool,
    pub logger: LoggerFormat,
    pub upload_max_bytes: usize,
    pub is_production: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_port = lookup("API_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);
        // An empty prefix mounts modules at the root.
        let api_prefix = lookup("API_PREFIX")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| "/api".into());
        let installed_modules = lookup("INSTALLED_MODULES")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| vec!["home".into()]);
        let database_provider = match lookup("DATABASE_PROVIDER") {
            Some(tag) if !tag.trim().is_empty() => Some(tag.trim().parse::<Provider>()?),
            _ => None,
        };
        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let acquire_timeout_secs = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let cors = CorsConfig {
            allow_origins: lookup("CORS_ALLOW_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_else(|| vec!["*".into()]),
            allow_methods: lookup("CORS_ALLOW_METHODS")
                .map(|s| split_list(&s))
                .unwrap_or_else(|| {
                    ["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"]
                        .into_iter()
                        .map(String::from)
                        .collect()
                }),
            allow_headers: lookup("CORS_ALLOW_HEADERS")
                .map(|s| split_list(&s))
                .unwrap_or_else(|| vec!["*".into()]),
        };
        let use_secweb = lookup("USE_SECWEB")
            .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false);
        let logger = match lookup("DEFAULT_LOGGER").as_deref().map(str::trim) {
            None | Some("default") => LoggerFormat::Default,
            Some(_) => LoggerFormat::Cloud,
        };
        let upload_max_bytes = lookup("UPLOAD_MAX_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(25 * 1024 * 1024);
        let is_production = matches!(
            lookup("RUST_ENV").as_deref(),
            Some("production") | Some("prod")
        );

        // Production hardening: CORS origins must be explicit
        if is_production && cors.allow_origins.iter().any(|o| o == "*") {
            anyhow::bail!(
                "CORS_ALLOW_ORIGINS must list explicit origins in production (e.g., https://app.example.com)"
            );
        }
        if !api_prefix.is_empty() && !api_prefix.starts_with('/') {
            anyhow::bail!("API_PREFIX must be empty or start with '/' (got {api_prefix:?})");
        }

        Ok(Self {
            api_port,
            api_prefix,
            installed_modules,
            database_provider,
            pool: PoolSettings {
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            },
            cors,
            use_secweb,
            logger,
            upload_max_bytes,
            is_production,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
