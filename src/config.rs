use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{Collection, SETTINGS_NAME};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Only the repository-backed commands need this section.
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub local: LocalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            api_url: default_api_url(),
            token_env: default_token_env(),
            timeout_secs: None,
        }
    }
}

impl RemoteConfig {
    /// Bearer credential from the configured environment variable.
    ///
    /// An unset variable yields an empty token; the remote then rejects
    /// requests that need one, which surfaces as a remote error.
    pub fn token(&self) -> String {
        std::env::var(&self.token_env).unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Where the mirrored pair of every file lives, relative to the repo root.
#[derive(Debug, Deserialize, Clone)]
pub struct LayoutConfig {
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    #[serde(default = "default_canonical_dir")]
    pub canonical_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            canonical_dir: default_canonical_dir(),
        }
    }
}

fn default_public_dir() -> String {
    "public/data".to_string()
}
fn default_canonical_dir() -> String {
    "db".to_string()
}

impl LayoutConfig {
    /// Served copy of a collection; reads come from here.
    pub fn public_path(&self, collection: Collection) -> String {
        join_repo_path(&self.public_dir, &collection.file_name())
    }

    pub fn canonical_path(&self, collection: Collection) -> String {
        join_repo_path(&self.canonical_dir, &collection.file_name())
    }

    pub fn public_settings_path(&self) -> String {
        join_repo_path(&self.public_dir, &format!("{}.json", SETTINGS_NAME))
    }

    pub fn canonical_settings_path(&self) -> String {
        join_repo_path(&self.canonical_dir, &format!("{}.json", SETTINGS_NAME))
    }
}

fn join_repo_path(dir: &str, file: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_admin_secret_env")]
    pub admin_secret_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_secret_env: default_admin_secret_env(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_admin_secret_env() -> String {
    "ADMIN_PASSWORD".to_string()
}

impl ServerConfig {
    /// Shared secret for writes. `None` when the variable is unset or empty.
    pub fn admin_secret(&self) -> Option<String> {
        std::env::var(&self.admin_secret_env)
            .ok()
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_stale_while_revalidate")]
    pub stale_while_revalidate_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age(),
            stale_while_revalidate_secs: default_stale_while_revalidate(),
        }
    }
}

fn default_max_age() -> u64 {
    60
}
fn default_stale_while_revalidate() -> u64 {
    300
}

impl CacheConfig {
    /// `Cache-Control` value sent with every successful read.
    pub fn header_value(&self) -> String {
        format!(
            "s-maxage={}, stale-while-revalidate={}",
            self.max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
    #[serde(default = "default_local_bind")]
    pub bind: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
            bind: default_local_bind(),
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_local_bind() -> String {
    "127.0.0.1:3001".to_string()
}

impl LocalConfig {
    pub fn canonical_dir(&self, layout: &LayoutConfig) -> PathBuf {
        self.root.join(&layout.canonical_dir)
    }

    pub fn public_dir(&self, layout: &LayoutConfig) -> PathBuf {
        self.root.join(&layout.public_dir)
    }
}

impl Config {
    /// Configuration for commands that never reach the remote, used when
    /// no config file is present.
    pub fn minimal() -> Self {
        Self {
            remote: RemoteConfig::default(),
            layout: LayoutConfig::default(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            local: LocalConfig::default(),
        }
    }

    /// Checks the `[remote]` section. Required before talking to the
    /// repository, not for the local variant.
    pub fn validate_remote(&self) -> Result<()> {
        if self.remote.owner.trim().is_empty() {
            anyhow::bail!("remote.owner must not be empty");
        }
        if self.remote.repo.trim().is_empty() {
            anyhow::bail!("remote.repo must not be empty");
        }
        if self.remote.branch.trim().is_empty() {
            anyhow::bail!("remote.branch must not be empty");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Loads `path`, or falls back to [`Config::minimal`] when no file exists
/// there. A file that exists but does not parse is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::minimal());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<()> {
    if config.layout.public_dir.trim_matches('/') == config.layout.canonical_dir.trim_matches('/')
    {
        anyhow::bail!("layout.public_dir and layout.canonical_dir must differ");
    }
    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }
    Ok(())
}
