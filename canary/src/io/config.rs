//! Client configuration stored as TOML (default `canary.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::classifier::MessageTypeTable;

/// Canary client configuration (TOML).
///
/// Missing fields default to a local test service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CanaryConfig {
    /// Base URL of the test service API.
    pub api_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Directory where downloadable reports are written.
    pub report_dir: PathBuf,

    /// Extra discriminator -> canonical-name entries layered over the VRDR table.
    pub message_types: BTreeMap<String, String>,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
            report_dir: PathBuf::from("reports"),
            message_types: BTreeMap::new(),
        }
    }
}

impl CanaryConfig {
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("api_url '{}' is not a valid URL", self.api_url))?;
        if url.cannot_be_a_base() {
            return Err(anyhow!("api_url '{}' cannot be a base URL", self.api_url));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        for (discriminator, name) in &self.message_types {
            if discriminator.trim().is_empty() {
                return Err(anyhow!("message_types keys must be non-empty"));
            }
            if name.trim().is_empty() {
                return Err(anyhow!(
                    "message_types.\"{discriminator}\" must name a message type"
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The VRDR table with configured overrides applied.
    pub fn message_type_table(&self) -> MessageTypeTable {
        MessageTypeTable::vrdr().with_overrides(&self.message_types)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CanaryConfig::default()`.
pub fn load_config(path: &Path) -> Result<CanaryConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = CanaryConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CanaryConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CanaryConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
