//! Application configuration

pub mod assistant;
pub mod replies;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use assistant::{AssistantConfig, ConfigError};
pub use replies::builtin as replies_builtin;

/// Process settings read from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite file holding books and orders
    pub db_path: PathBuf,
    /// Optional TOML file with assistant tuning
    pub assistant_config: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            db_path: env::var("BOOKSTORE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/bookstore.db")),
            assistant_config: env::var("BOOKSTORE_CONFIG").ok().map(PathBuf::from),
        })
    }

    /// Assistant tuning from `assistant_config`, or defaults when unset.
    pub fn load_assistant_config(&self) -> Result<AssistantConfig, ConfigError> {
        match &self.assistant_config {
            Some(path) => AssistantConfig::from_file(path),
            None => Ok(AssistantConfig::default()),
        }
    }
}
