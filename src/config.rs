use serde::Deserialize;
use std::env;

use crate::store::MAX_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub port: u16,
    pub host: String,
    pub allowed_origins: Vec<String>,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 20,
            port: 3000,
            host: "0.0.0.0".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            default_page_size: 20,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.db_max_connections),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            allowed_origins: match env::var("ALLOWED_ORIGINS") {
                Ok(origins) => origins.split(',').map(|s| s.trim().to_string()).collect(),
                Err(env::VarError::NotPresent) => defaults.allowed_origins,
                Err(e) => return Err(e),
            },
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.default_page_size),
            max_page_size: env::var("MAX_PAGE_SIZE")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_page_size),
        })
    }

    /// Resolves a requested page size against the configured default and ceiling.
    /// `MAX_PAGE_SIZE` can lower the store's hard ceiling but never raise it.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.clamp(1, MAX_PAGE_SIZE))
    }
}
