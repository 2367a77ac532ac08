//! Server configuration.
//!
//! Loaded from an optional YAML file, then overridden from the environment.
//! List settings (`enabled_tools`, `allowed_post_types`) accept either a
//! YAML list or a comma-separated string.
//!
//! ```yaml
//! site_name: Demo Shop
//! bind_addr: 0.0.0.0:8080
//! enabled_tools: search_posts, search_products
//! platform:
//!   kind: wordpress
//!   base_url: https://shop.example.com
//!   username: mcp-service
//!   app_password: "xxxx xxxx xxxx xxxx"
//! ```

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::capabilities::EnabledTools;
use crate::handlers::PostTypePolicy;
use crate::sanitize::sanitize_text;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

// ---------------------------------------------------------------------------
// Platform section
// ---------------------------------------------------------------------------

/// Connection settings for a live WordPress site.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPressConfig {
    pub base_url: String,
    /// Service account used for every call that does not verify a caller.
    pub username: String,
    pub app_password: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl std::fmt::Debug for WordPressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// An account seeded into the in-memory platform at startup.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub app_password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl std::fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedUser")
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_url")]
    pub site_url: String,
    #[serde(default)]
    pub commerce: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            site_url: default_memory_url(),
            commerce: false,
            currency: default_currency(),
            users: vec![],
        }
    }
}

/// Which collaborator implementation backs the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlatformConfig {
    Memory(MemoryConfig),
    Wordpress(WordPressConfig),
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig::Memory(MemoryConfig::default())
    }
}

impl PlatformConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformConfig::Memory(_) => "memory",
            PlatformConfig::Wordpress(_) => "wordpress",
        }
    }

    /// Base URL of the backing site.
    pub fn base_url(&self) -> &str {
        match self {
            PlatformConfig::Memory(m) => &m.site_url,
            PlatformConfig::Wordpress(w) => &w.base_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Public site URL reported by `/info`. Falls back to the platform base URL.
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Empty means every capability is enabled.
    #[serde(default, deserialize_with = "list_setting")]
    pub enabled_tools: Vec<String>,
    /// Empty means every custom post type is allowed.
    #[serde(default, deserialize_with = "list_setting")]
    pub allowed_post_types: Vec<String>,
    #[serde(default = "default_baseline_permission")]
    pub baseline_permission: String,
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            site_url: None,
            bind_addr: default_bind_addr(),
            enabled_tools: vec![],
            allowed_post_types: vec![],
            baseline_permission: default_baseline_permission(),
            platform: PlatformConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// File (when given) plus process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `PORT`, `WP_MCP_SITE_NAME`, `WP_MCP_SITE_URL`,
    /// `WP_MCP_ENABLED_TOOLS` and `WP_MCP_ALLOWED_POST_TYPES`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT".into(),
                reason: format!("'{port}' is not a port number"),
            })?;
            let host = self
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".into());
            self.bind_addr = format!("{host}:{port}");
        }
        if let Some(name) = lookup("WP_MCP_SITE_NAME") {
            self.site_name = sanitize_text(&name);
        }
        if let Some(url) = lookup("WP_MCP_SITE_URL") {
            let url = url.trim().to_string();
            self.site_url = (!url.is_empty()).then_some(url);
        }
        if let Some(tools) = lookup("WP_MCP_ENABLED_TOOLS") {
            self.enabled_tools = split_list(&tools);
        }
        if let Some(types) = lookup("WP_MCP_ALLOWED_POST_TYPES") {
            self.allowed_post_types = split_list(&types);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_permission.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "baseline_permission".into(),
                reason: "must not be empty".into(),
            });
        }
        if let PlatformConfig::Wordpress(wp) = &self.platform {
            if wp.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "platform.base_url".into(),
                    reason: "required for the wordpress platform".into(),
                });
            }
        }
        Ok(())
    }

    /// The public site URL: explicit setting first, else the platform's.
    pub fn effective_site_url(&self) -> String {
        self.site_url
            .clone()
            .unwrap_or_else(|| self.platform.base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn enabled(&self) -> EnabledTools {
        EnabledTools::only(&self.enabled_tools)
    }

    pub fn post_type_policy(&self) -> PostTypePolicy {
        PostTypePolicy::new(self.allowed_post_types.clone())
    }
}

fn default_site_name() -> String {
    "WordPress".into()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.into()
}

fn default_baseline_permission() -> String {
    "read".into()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_memory_url() -> String {
    "http://localhost".into()
}

fn default_currency() -> String {
    "USD".into()
}

/// Comma-separated entries, each sanitized as plain text, blanks dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    clean_list(raw.split(','))
}

fn clean_list<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for entry in entries {
        let entry = sanitize_text(entry.as_ref());
        if !entry.is_empty() && !out.contains(&entry) {
            out.push(entry);
        }
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListSetting {
    List(Vec<String>),
    Csv(String),
}

fn list_setting<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ListSetting>::deserialize(deserializer)? {
        Some(ListSetting::List(items)) => clean_list(items),
        Some(ListSetting::Csv(raw)) => split_list(&raw),
        None => vec![],
    })
}
