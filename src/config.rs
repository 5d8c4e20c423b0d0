use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{FlixError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Local movie library.
    pub library: LibraryConfig,
    /// HTTP API configuration (optional).
    #[serde(default)]
    pub api: ApiConfig,
    /// Shared-password session configuration.
    pub auth: AuthConfig,
}

/// Local library parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    /// Directory scanned for video files.
    pub movies_dir: PathBuf,
}

/// HTTP API configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Port to listen on.
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Origin allowed by CORS; the React client runs here during development.
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            frontend_origin: default_frontend_origin(),
        }
    }
}

fn default_api_port() -> u16 { 3000 }
fn default_frontend_origin() -> String { "http://localhost:5173".to_string() }

/// Authentication parameters for the signed-cookie session.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// The single shared password every viewer uses.
    pub shared_password: String,
    /// Secret used to sign the session cookie.
    pub cookie_secret: String,
    /// Session lifetime in hours.
    #[serde(default = "default_session_hours")]
    pub session_hours: u64,
}

fn default_session_hours() -> u64 { 24 }

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlixError::Config(format!("Cannot read config file: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| FlixError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.auth.shared_password.is_empty() {
            return Err(FlixError::Config("shared_password must not be empty".into()));
        }
        if self.auth.cookie_secret.is_empty() {
            return Err(FlixError::Config("cookie_secret must not be empty".into()));
        }
        if self.auth.session_hours == 0 {
            return Err(FlixError::Config("session_hours must be > 0".into()));
        }
        Ok(())
    }
}
