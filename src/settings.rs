//! Server configuration.
//!
//! Values come from an optional TOML file, overridden by `COMMERCE__*`
//! environment variables (e.g. `COMMERCE__HELPDESK__API_TOKEN`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::helpdesk::HelpdeskConfig;

pub const ENV_PREFIX: &str = "COMMERCE";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// How long a checkout holds stock before the reaper releases it.
    #[serde(default = "default_reservation_hours")]
    pub reservation_hours: u32,
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
    #[serde(default)]
    pub helpdesk: Option<HelpdeskConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("commerce.db")
}

fn default_reservation_hours() -> u32 {
    24
}

fn default_reaper_interval_secs() -> u64 {
    15 * 60
}

impl ServerConfig {
    /// Loads `path` (if it exists) layered under the environment.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        Self::from_sources(path, env)
    }

    fn from_sources(path: &Path, env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reservation_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.reservation_hours))
    }

    pub fn reaper_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}
