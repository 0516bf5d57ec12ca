//!
//! campsite configuration
//! ----------------------
//! Configuration is loaded once at startup from an optional JSON file plus
//! environment overrides, and held behind a `ConfigHandle`. Consumers take a
//! value snapshot per operation (`tokens()`), so a reload swaps the whole
//! configuration without ambient global state. Token issuance re-reads the
//! handle on every call, which is what makes `/api/operations/reload-config`
//! take effect on the next issued token.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_http_port() -> u16 { 7878 }
fn default_data_root() -> String { "data".to_string() }
fn default_issuer() -> String { "http://campsite.example".to_string() }
fn default_audience() -> String { "http://campsite.example".to_string() }
fn default_token_ttl() -> u64 { 900 }

/// Signing material and claim endpoints for bearer tokens.
///
/// An empty `secret` is a configuration failure: issuance and validation both
/// refuse to operate rather than fall back to an unsigned token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: default_issuer(),
            audience: default_audience(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_root")]
    pub data_root: String,
    #[serde(default)]
    pub tokens: TokenConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_root: default_data_root(),
            tokens: TokenConfig::default(),
        }
    }
}

/// Read configuration from `path` (missing file means defaults) and apply
/// environment overrides on top.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let mut cfg = if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str::<AppConfig>(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?
    } else {
        AppConfig::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("CAMPSITE_HTTP_PORT") {
        if let Ok(port) = v.parse::<u16>() { cfg.http_port = port; }
    }
    if let Ok(v) = std::env::var("CAMPSITE_DATA_ROOT") {
        if !v.trim().is_empty() { cfg.data_root = v; }
    }
    if let Ok(v) = std::env::var("CAMPSITE_TOKEN_SECRET") {
        if !v.is_empty() { cfg.tokens.secret = v; }
    }
    if let Ok(v) = std::env::var("CAMPSITE_TOKEN_ISSUER") {
        if !v.trim().is_empty() { cfg.tokens.issuer = v; }
    }
    if let Ok(v) = std::env::var("CAMPSITE_TOKEN_AUDIENCE") {
        if !v.trim().is_empty() { cfg.tokens.audience = v; }
    }
}

/// Reloadable configuration holder shared across handlers.
///
/// The current value is swapped wholesale on `reload()`; requests that already
/// took a snapshot keep the value they started with.
pub struct ConfigHandle {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigHandle {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cfg = load_config(&path)?;
        Ok(Self { path, current: RwLock::new(cfg) })
    }

    /// Snapshot of the full configuration.
    pub fn snapshot(&self) -> AppConfig {
        self.current.read().clone()
    }

    /// Snapshot of the token section, taken fresh per issuance/validation.
    pub fn tokens(&self) -> TokenConfig {
        self.current.read().tokens.clone()
    }

    /// Re-read the config file and swap the held value.
    pub fn reload(&self) -> Result<()> {
        let cfg = load_config(&self.path)?;
        let mut cur = self.current.write();
        if *cur != cfg {
            info!("configuration reloaded from {}", self.path.display());
        }
        *cur = cfg;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let cfg = load_config(Path::new("/definitely/not/here/campsite.json")).unwrap();
        assert_eq!(cfg.http_port, 7878);
        assert_eq!(cfg.tokens.token_ttl_secs, 900);
        assert!(cfg.tokens.secret.is_empty());
    }

    #[test]
    fn file_values_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campsite.json");
        std::fs::write(
            &path,
            r#"{"http_port": 9090, "data_root": "camps", "tokens": {"secret": "k", "issuer": "http://a", "audience": "http://b", "token_ttl_secs": 60}}"#,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.data_root, "camps");
        assert_eq!(cfg.tokens.secret, "k");
        assert_eq!(cfg.tokens.token_ttl_secs, 60);
    }

    #[test]
    fn reload_swaps_token_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campsite.json");
        std::fs::write(&path, r#"{"tokens": {"secret": "before"}}"#).unwrap();
        let handle = ConfigHandle::load(&path).unwrap();
        assert_eq!(handle.tokens().secret, "before");

        std::fs::write(&path, r#"{"tokens": {"secret": "after"}}"#).unwrap();
        handle.reload().unwrap();
        assert_eq!(handle.tokens().secret, "after");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campsite.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_config(&path).is_err());
    }
}
