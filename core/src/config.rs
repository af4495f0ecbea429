//! Configuration Loading
//!
//! Centralized configuration for the client, loaded with the following
//! priority (highest first):
//!
//! 1. Environment variables (`MUSE_API_URL`, `MUSE_AUTH_DOMAIN`,
//!    `MUSE_CLIENT_ID`, `MUSE_AUDIENCE`)
//! 2. TOML configuration file (`$XDG_CONFIG_HOME/muse/muse.toml`)
//! 3. Default values
//!
//! A missing auth domain or client id is a fatal configuration error and is
//! surfaced before any UI renders.
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "https://muse-api.example.com"
//!
//! [auth]
//! domain = "example.us.auth0.com"
//! client_id = "abc123"
//! audience = "https://muse-api.example.com"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default generation service URL (local development placeholder)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Config directory name under the XDG config dir
const CONFIG_DIR_NAME: &str = "muse";

/// Config file name
const CONFIG_FILENAME: &str = "muse.toml";

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read config file at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required value is missing from every source
    #[error("missing required configuration: {key} (set {env} or add it to muse.toml)")]
    Missing {
        /// TOML key of the missing value
        key: &'static str,
        /// Environment variable that can supply it
        env: &'static str,
    },
}

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Generation service base URL
    pub base_url: Option<String>,
}

/// Auth section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    /// Identity provider domain
    pub domain: Option<String>,

    /// OAuth client identifier
    pub client_id: Option<String>,

    /// API audience for issued tokens
    pub audience: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MuseToml {
    /// API configuration section
    pub api: ApiToml,

    /// Auth configuration section
    pub auth: AuthToml,
}

/// Resolved application configuration
///
/// Immutable for the process lifetime once loaded.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Generation service base URL
    pub api_base_url: String,
    /// Identity provider domain (no scheme)
    pub auth_domain: String,
    /// OAuth client identifier
    pub client_id: String,
    /// API audience for issued tokens
    pub audience: Option<String>,
}

/// Default config file path under the XDG config dir
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}

/// Load configuration from the default file location plus environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// the auth domain / client id are missing from every source.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(default_config_path().as_deref())
}

/// Load configuration from a specific file path plus environment
///
/// A `None` path or a missing file contributes nothing; environment
/// variables still apply.
///
/// # Errors
///
/// Same conditions as [`load_config`].
pub fn load_config_from_path(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let parsed: MuseToml = toml::from_str(&contents)?;
            tracing::debug!(path = %path.display(), "Loaded config file");
            parsed
        }
        _ => MuseToml::default(),
    };

    resolve(file)
}

/// Merge a parsed file with environment variables and defaults
fn resolve(file: MuseToml) -> Result<AppConfig, ConfigError> {
    let api_base_url = env_var("MUSE_API_URL")
        .or(file.api.base_url)
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

    let auth_domain = env_var("MUSE_AUTH_DOMAIN")
        .or(file.auth.domain)
        .ok_or(ConfigError::Missing {
            key: "auth.domain",
            env: "MUSE_AUTH_DOMAIN",
        })?;

    let client_id = env_var("MUSE_CLIENT_ID")
        .or(file.auth.client_id)
        .ok_or(ConfigError::Missing {
            key: "auth.client_id",
            env: "MUSE_CLIENT_ID",
        })?;

    let audience = env_var("MUSE_AUDIENCE").or(file.auth.audience);

    Ok(AppConfig {
        api_base_url,
        auth_domain,
        client_id,
        audience,
    })
}

/// Read an environment variable, treating empty as unset
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
