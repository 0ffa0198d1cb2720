// Processing service configuration
// Defaults, an optional file and CAF_PROCESSING_SERVICE_* environment overrides

//! # Configuration
//!
//! Sources are layered lowest first:
//!
//! 1. built-in defaults
//! 2. an optional config file (any format the `config` crate reads)
//! 3. environment variables
//!
//! | Variable                                      | Key                      |
//! |-----------------------------------------------|--------------------------|
//! | `CAF_PROCESSING_SERVICE_POLICY_API_HOST`       | `policy_api.host`        |
//! | `CAF_PROCESSING_SERVICE_POLICY_API_PORT`       | `policy_api.port`        |
//! | `CAF_PROCESSING_SERVICE_POLICY_API_ENTRY_PATH` | `policy_api.entry_path`  |
//! | `CAF_PROCESSING_SERVICE_CACHE_DURATION`        | `cache.duration_seconds` |
//!
//! A `.env` file in the working directory is loaded into the environment first.

use ::config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::processing::DEFAULT_PAGE_SIZE;
use crate::Result;

pub const ENV_POLICY_API_HOST: &str = "CAF_PROCESSING_SERVICE_POLICY_API_HOST";
pub const ENV_POLICY_API_PORT: &str = "CAF_PROCESSING_SERVICE_POLICY_API_PORT";
pub const ENV_POLICY_API_ENTRY_PATH: &str = "CAF_PROCESSING_SERVICE_POLICY_API_ENTRY_PATH";
pub const ENV_CACHE_DURATION: &str = "CAF_PROCESSING_SERVICE_CACHE_DURATION";

/// Location of the remote policy API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyApiConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix of every API area, with leading and trailing slash
    pub entry_path: String,
}

impl PolicyApiConfig {
    /// `http://{host}:{port}{entry_path}`
    pub fn base_url(&self) -> String {
        let mut entry_path = self.entry_path.clone();
        if !entry_path.starts_with('/') {
            entry_path.insert(0, '/');
        }
        if !entry_path.ends_with('/') {
            entry_path.push('/');
        }
        format!("http://{}:{}{}", self.host, self.port, entry_path)
    }
}

impl Default for PolicyApiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            entry_path: "/corepolicy/".to_string(),
        }
    }
}

/// Lifetime of cached Policies and Policy Types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub duration_seconds: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingConfig {
    pub default_page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Everything the processing service reads at start-up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub policy_api: PolicyApiConfig,
    pub cache: CacheConfig,
    pub paging: PagingConfig,
}

impl ProcessingConfig {
    /// Load from `.env`, an optional file and the process environment
    pub fn load(file: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_with(file, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup
    ///
    /// ## Rust Learning Notes:
    ///
    /// ### Injecting the Environment
    /// Taking the lookup as a closure lets tests supply variables without
    /// touching the process-wide environment, which other tests share.
    pub fn load_with<F>(file: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("policy_api.host", defaults.policy_api.host)?
            .set_default("policy_api.port", i64::from(defaults.policy_api.port))?
            .set_default("policy_api.entry_path", defaults.policy_api.entry_path)?
            .set_default("cache.duration_seconds", defaults.cache.duration_seconds)?
            .set_default(
                "paging.default_page_size",
                i64::from(defaults.paging.default_page_size),
            )?;

        if let Some(path) = file {
            debug!(path, "layering config file");
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let config = builder
            .set_override_option("policy_api.host", env(ENV_POLICY_API_HOST))?
            .set_override_option("policy_api.port", env(ENV_POLICY_API_PORT))?
            .set_override_option("policy_api.entry_path", env(ENV_POLICY_API_ENTRY_PATH))?
            .set_override_option("cache.duration_seconds", env(ENV_CACHE_DURATION))?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
