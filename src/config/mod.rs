//! Configuration loading and management
//!
//! Configuration is loaded once at startup and shared read-only afterwards.
//!
//! ```yaml
//! auth:
//!   secret_key: "change-me"
//!   algorithm: HS256
//!   access_token_ttl_minutes: 15
//! resources:
//!   - name: stores
//!     operations: [list, count, get_one, create, update, delete]
//!     post_auth: false
//!     auth:
//!       create: public
//!       delete: privileged_only
//! ```

use anyhow::{Result, bail};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret used to sign and verify every token
    pub secret_key: String,

    /// JWT algorithm name (HS256, HS384 or HS512)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Lifetime of access tokens
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,

    /// Lifetime of refresh tokens
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_minutes: i64,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_ttl() -> i64 {
    15
}

fn default_refresh_ttl() -> i64 {
    60 * 24 * 7
}

impl AuthSettings {
    /// Settings with the given secret and default algorithm/lifetimes
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            algorithm: default_algorithm(),
            access_token_ttl_minutes: default_access_ttl(),
            refresh_token_ttl_minutes: default_refresh_ttl(),
        }
    }

    /// Parse the configured algorithm, accepting keyed-MAC algorithms only
    pub fn algorithm(&self) -> Result<Algorithm> {
        match self.algorithm.as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => bail!("unsupported token algorithm '{}'", other),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret_key.is_empty() {
            bail!("auth.secret_key must not be empty");
        }
        self.algorithm()?;
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_minutes <= 0 {
            bail!("token lifetimes must be positive");
        }
        Ok(())
    }
}

/// Per-operation auth policies for a resource
///
/// Each entry is a policy string (`public`, `authenticated`,
/// `privileged_only`). Missing entries keep the view's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceAuthConfig {
    #[serde(flatten)]
    pub policies: HashMap<String, String>,
}

/// Configuration overrides for one resource view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource name, matched against the view's base path without slashes
    pub name: String,

    /// Enabled operations; all standard operations when absent
    #[serde(default)]
    pub operations: Option<Vec<String>>,

    /// Per-operation auth policy overrides
    #[serde(default)]
    pub auth: Option<ResourceAuthConfig>,

    /// Whether create must abort when auth resolution fails
    #[serde(default)]
    pub post_auth: Option<bool>,
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub auth: AuthSettings,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl AppConfig {
    /// Configuration with the given secret and no resource overrides
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            auth: AuthSettings::new(secret_key),
            resources: Vec::new(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.auth.validate()
    }

    /// Find the overrides for a resource
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }
}
