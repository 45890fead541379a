//! Configuration for the GraphQL route and logging

use std::env;

use anyhow::{Context, Result};

/// Default mount path for the GraphQL endpoint
pub const DEFAULT_GRAPHQL_PATH: &str = "/graphql";

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub graphql: GraphqlConfig,
    pub log: LogConfig,

    /// Database URL, e.g. `sqlite://data/app.db` or `sqlite::memory:`
    pub database_url: String,
}

/// Settings for [`GraphqlRoute`](crate::server::GraphqlRoute)
#[derive(Debug, Clone)]
pub struct GraphqlConfig {
    /// Path the route is mounted on
    pub path: String,

    /// Serve GraphiQL on GET requests that accept HTML
    pub playground: bool,

    /// HS256 secret for bearer tokens. Without it no token is decoded.
    pub jwt_secret: Option<String>,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_GRAPHQL_PATH.to_string(),
            playground: true,
            jwt_secret: None,
        }
    }
}

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Settings for [`logging::init`](crate::logging::init)
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,

    /// Filter used when `RUST_LOG` is not set
    pub default_directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            default_directive: "gqlglue=info,tower_http=info".to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and then the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            graphql: GraphqlConfig::from_env()?,
            log: LogConfig::from_env()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite::memory:".to_string()),
        })
    }
}

impl GraphqlConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let path = env::var("GRAPHQL_PATH").unwrap_or(defaults.path);
        if !path.starts_with('/') {
            anyhow::bail!("GRAPHQL_PATH must start with '/', got {path:?}");
        }

        let playground = match env::var("GRAPHQL_PLAYGROUND") {
            Ok(value) => parse_bool(&value).context("Invalid GRAPHQL_PLAYGROUND")?,
            Err(_) => defaults.playground,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            path,
            playground,
            jwt_secret,
        })
    }
}

impl LogConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let format = match env::var("LOG_FORMAT") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" | "text" => LogFormat::Compact,
                other => anyhow::bail!("Invalid LOG_FORMAT {other:?}, expected json or compact"),
            },
            Err(_) => defaults.format,
        };
        Ok(Self {
            format,
            default_directive: defaults.default_directive,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
