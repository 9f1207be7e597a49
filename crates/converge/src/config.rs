//! Engine settings file
//!
//! YAML form of [`ReconcileConfig`]. A missing file means defaults.

use anyhow::Context;
use converge_core::ReconcileConfig;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "CONVERGE_CONFIG";

/// `<config_dir>/converge/config.yaml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("converge").join("config.yaml"))
}

/// Load from `path`, or from the default location when none is given
pub fn load(path: Option<&Path>) -> anyhow::Result<ReconcileConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) => path,
            None => return Ok(ReconcileConfig::default()),
        },
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(ReconcileConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: ReconcileConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok(config)
}
