//! Process settings from the environment (optionally seeded from a `.env` file).

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "sample";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    /// Directory holding entities.json, resources.json, settings.json.
    pub config_path: String,
    /// PostgreSQL URL; in-memory repositories are used when absent.
    pub database_url: Option<String>,
    pub bind: String,
    /// S3 bucket for binary assets; in-memory document store when absent.
    pub document_bucket: Option<String>,
    /// Upper bound on document upload bodies, in bytes.
    pub body_limit: usize,
}

impl ServerSettings {
    /// Read `CATALOG_CONFIG_PATH`, `DATABASE_URL`, `CATALOG_BIND`, `CATALOG_DOCUMENT_BUCKET`, `CATALOG_BODY_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let body_limit = match non_empty("CATALOG_BODY_LIMIT") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Validation(format!("CATALOG_BODY_LIMIT is not a byte count: {}", v)))?,
            None => DEFAULT_BODY_LIMIT,
        };
        Ok(ServerSettings {
            config_path: non_empty("CATALOG_CONFIG_PATH").unwrap_or_else(|| DEFAULT_CONFIG_PATH.into()),
            database_url: non_empty("DATABASE_URL"),
            bind: non_empty("CATALOG_BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
            document_bucket: non_empty("CATALOG_DOCUMENT_BUCKET"),
            body_limit,
        })
    }
}
