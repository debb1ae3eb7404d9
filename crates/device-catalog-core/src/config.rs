use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::RemoteCatalogConfig;
use crate::error::{CatalogError, Result};
use crate::github::{RepoRef, DEFAULT_API_BASE};
use crate::indigo::{IndigoEndpoint, DEFAULT_PORT};
use crate::publish::default_export_path;

const CONFIG_FILE: &str = "config.toml";

/// Environment variables checked, in order, before `github.token`
pub const TOKEN_ENV_VARS: [&str; 2] = ["DEVICE_CATALOG_GITHUB_TOKEN", "GITHUB_TOKEN"];

const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
const MASK: &str = "********";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# device-catalog configuration file
# Location: ~/.device-catalog/config.toml

[contributor]
# Name recorded in metadata.contributedBy and used in branch names
name = "community"

[github]
# Personal access token with repo scope. Needed for `submit`.
# DEVICE_CATALOG_GITHUB_TOKEN or GITHUB_TOKEN take precedence.
# token = "ghp_..."
owner = "simons-plugins"
repo = "indigo-device-catalog"
branch = "main"
# api_base = "https://api.github.com"
# raw_base = "https://raw.githubusercontent.com"

[indigo]
host = "localhost"
port = 8176
# Set to false for plain HTTP
tls = true
# api_key = "..."

[catalog]
# Local catalog checkout used by discover --apply, validate and reindex
dir = "catalog"

[export]
# Default: ~/Desktop/indigo-device-catalog-contribution.json
# path = "/path/to/export.json"
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub contributor: ContributorConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub indigo: IndigoConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributorConfig {
    #[serde(default = "default_contributor")]
    pub name: String,
}

fn default_contributor() -> String {
    "community".to_string()
}

impl Default for ContributorConfig {
    fn default() -> Self {
        Self {
            name: default_contributor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
}

fn default_owner() -> String {
    "simons-plugins".to_string()
}

fn default_repo() -> String {
    "indigo-device-catalog".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_raw_base() -> String {
    DEFAULT_RAW_BASE.to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: default_owner(),
            repo: default_repo(),
            branch: default_branch(),
            api_base: default_api_base(),
            raw_base: default_raw_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndigoConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_tls")]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_tls() -> bool {
    true
}

impl Default for IndigoConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: default_tls(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_dir")]
    pub dir: PathBuf,
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("catalog")
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dir: default_catalog_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Every key accepted by `get`/`set`, in display order
pub const CONFIG_KEYS: [&str; 13] = [
    "contributor.name",
    "github.token",
    "github.owner",
    "github.repo",
    "github.branch",
    "github.api_base",
    "github.raw_base",
    "indigo.host",
    "indigo.port",
    "indigo.tls",
    "indigo.api_key",
    "catalog.dir",
    "export.path",
];

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| CatalogError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key. Unset optional values are
    /// empty strings.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "contributor.name" => self.contributor.name.clone(),
            "github.token" => self.github.token.clone().unwrap_or_default(),
            "github.owner" => self.github.owner.clone(),
            "github.repo" => self.github.repo.clone(),
            "github.branch" => self.github.branch.clone(),
            "github.api_base" => self.github.api_base.clone(),
            "github.raw_base" => self.github.raw_base.clone(),
            "indigo.host" => self.indigo.host.clone(),
            "indigo.port" => self.indigo.port.to_string(),
            "indigo.tls" => self.indigo.tls.to_string(),
            "indigo.api_key" => self.indigo.api_key.clone().unwrap_or_default(),
            "catalog.dir" => self.catalog.dir.display().to_string(),
            "export.path" => self
                .export
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }

    /// Set a config value by dot-notation key. An empty value clears
    /// optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "contributor.name" => self.contributor.name = required(key, value)?,
            "github.token" => self.github.token = optional(value),
            "github.owner" => self.github.owner = required(key, value)?,
            "github.repo" => self.github.repo = required(key, value)?,
            "github.branch" => self.github.branch = required(key, value)?,
            "github.api_base" => self.github.api_base = required(key, value)?,
            "github.raw_base" => self.github.raw_base = required(key, value)?,
            "indigo.host" => self.indigo.host = required(key, value)?,
            "indigo.port" => self.indigo.port = parse_value(key, value)?,
            "indigo.tls" => self.indigo.tls = parse_bool(key, value)?,
            "indigo.api_key" => self.indigo.api_key = optional(value),
            "catalog.dir" => self.catalog.dir = PathBuf::from(required(key, value)?),
            "export.path" => self.export.path = optional(value).map(PathBuf::from),
            _ => {
                return Err(CatalogError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values. Secrets are masked.
    pub fn list(&self) -> Vec<(String, String)> {
        CONFIG_KEYS
            .iter()
            .filter_map(|key| {
                let value = self.get(key)?;
                let shown = if is_secret(key) && !value.is_empty() {
                    MASK.to_string()
                } else {
                    value
                };
                Some((key.to_string(), shown))
            })
            .collect()
    }

    /// Token from the environment, else from the config file
    pub fn github_token(&self) -> Option<String> {
        self.github_token_with(|name| std::env::var(name).ok())
    }

    fn github_token_with<F>(&self, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        TOKEN_ENV_VARS
            .iter()
            .find_map(|name| env(name).filter(|v| !v.trim().is_empty()))
            .or_else(|| self.github.token.clone().filter(|t| !t.trim().is_empty()))
    }

    pub fn upstream(&self) -> RepoRef {
        RepoRef::new(&self.github.owner, &self.github.repo, &self.github.branch)
    }

    pub fn remote_catalog(&self) -> RemoteCatalogConfig {
        RemoteCatalogConfig {
            raw_base: self.github.raw_base.clone(),
            owner: self.github.owner.clone(),
            repo: self.github.repo.clone(),
            branch: self.github.branch.clone(),
            token: self.github_token(),
        }
    }

    pub fn indigo_endpoint(&self) -> IndigoEndpoint {
        IndigoEndpoint {
            host: self.indigo.host.clone(),
            port: self.indigo.port,
            tls: self.indigo.tls,
            api_key: self.indigo.api_key.clone(),
        }
    }

    /// Configured export path, else the desktop default
    pub fn export_path(&self) -> Result<PathBuf> {
        match &self.export.path {
            Some(path) => Ok(path.clone()),
            None => default_export_path(),
        }
    }
}

fn is_secret(key: &str) -> bool {
    matches!(key, "github.token" | "indigo.api_key")
}

fn required(key: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(CatalogError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| CatalogError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(CatalogError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
