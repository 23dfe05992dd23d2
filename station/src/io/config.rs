//! Station configuration stored under `.station/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::OperatorId;
use crate::io::atomic::write_atomic;

/// Station configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// test bench has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StationConfig {
    /// Operator recorded with every result until operator login exists.
    pub operator_id: i32,

    /// Ask "save the test?" before the completion review starts.
    pub confirm_save: bool,

    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Prompt shown when the console collects a comment for an unmet requirement.
    pub comment_prompt: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            comment_prompt: "Why was this requirement not completed? (empty line to skip)"
                .to_string(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            operator_id: 1,
            confirm_save: true,
            review: ReviewConfig::default(),
        }
    }
}

impl StationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.operator_id <= 0 {
            return Err(anyhow!("operator_id must be > 0"));
        }
        if self.review.comment_prompt.trim().is_empty() {
            return Err(anyhow!("review.comment_prompt must not be empty"));
        }
        Ok(())
    }

    pub fn operator(&self) -> OperatorId {
        OperatorId::new(self.operator_id)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StationConfig::default()`.
pub fn load_config(path: &Path) -> Result<StationConfig> {
    if !path.exists() {
        let cfg = StationConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StationConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &StationConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
