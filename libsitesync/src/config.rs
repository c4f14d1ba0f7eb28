//! Configuration management for sitesync
//!
//! ```toml
//! [network]
//! timeout = "30s"
//! user_agent = "sitesync/0.1"
//!
//! [[sites]]
//! id = 42
//! url = "https://example.wordpress.com"
//! api = "rest"
//! token_file = "~/.config/sitesync/example.token"
//!
//! [[sites]]
//! id = 7
//! url = "https://blog.example"
//! api = "xmlrpc"
//! endpoint = "https://blog.example/xmlrpc.php"
//! username = "admin"
//! password_file = "~/.config/sitesync/blog.password"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{ConfigError, Result};
use crate::network::rest::DEFAULT_BASE_URL;
use crate::types::{Site, SiteApi, SiteId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout, e.g. "30s" or "2m"
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    /// Buffered change events per observer before the oldest are dropped
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_user_agent() -> String {
    format!("sitesync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_rest_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            rest_base_url: default_rest_base_url(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.timeout).map_err(|e| {
            ConfigError::InvalidValue {
                field: "network.timeout".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    Rest,
    Xmlrpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: u64,
    pub url: String,
    pub api: ApiKind,
    /// REST: file holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    /// XML-RPC: endpoint URL, defaults to `<url>/xmlrpc.php`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
}

impl SiteConfig {
    /// Build a [`Site`], reading its secret from disk
    pub fn to_site(&self) -> Result<Site> {
        let site = match self.api {
            ApiKind::Rest => {
                let token_file = self.require(&self.token_file, "token_file")?;
                Site::rest(self.id, &self.url, read_secret(token_file)?)
            }
            ApiKind::Xmlrpc => {
                let username = self.require(&self.username, "username")?;
                let password_file = self.require(&self.password_file, "password_file")?;
                let endpoint = self
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| format!("{}/xmlrpc.php", self.url.trim_end_matches('/')));
                Site {
                    id: SiteId(self.id),
                    url: self.url.clone(),
                    api: SiteApi::XmlRpc {
                        endpoint,
                        blog_id: self.blog_id.unwrap_or(1),
                        username: username.to_string(),
                        password: Arc::new(SecretString::from(read_secret(password_file)?)),
                    },
                }
            }
        };
        Ok(site)
    }

    fn require<'a>(&self, value: &'a Option<String>, field: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField(format!("sites[id={}].{}", self.id, field)).into())
    }
}

/// Read a secret file, trimming surrounding whitespace
fn read_secret(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();
    let content = std::fs::read_to_string(&expanded).map_err(ConfigError::ReadError)?;
    let secret = content.trim();
    if secret.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: path.to_string(),
            reason: "file is empty".to_string(),
        }
        .into());
    }
    Ok(secret.to_string())
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            network: NetworkConfig::default(),
            sites: Vec::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.network.timeout()?;
        if self.network.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.event_capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        let mut seen = std::collections::HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id) {
                return Err(ConfigError::InvalidValue {
                    field: "sites".to_string(),
                    reason: format!("duplicate site id {}", site.id),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Look up a configured site and build it
    pub fn site(&self, id: u64) -> Result<Site> {
        self.sites
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ConfigError::MissingField(format!("sites[id={}]", id)))?
            .to_site()
    }
}

/// Resolve the configuration file path following the XDG Base Directory layout
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SITESYNC_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("sitesync").join("config.toml"))
}
