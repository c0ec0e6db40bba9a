//! Configuration management for the Lectio engine

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                path: "./lectio.db".to_string(),
            },
            remote: RemoteConfig {
                base_url: "https://cdn.lectio.app/bible".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Config::default();
        Config {
            database: DatabaseConfig {
                path: env::var("LECTIO_DATABASE_PATH").unwrap_or(defaults.database.path),
            },
            remote: RemoteConfig {
                base_url: env::var("LECTIO_REMOTE_BASE_URL").unwrap_or(defaults.remote.base_url),
            },
        }
    }
}
