//! CLI configuration stored in `markform.toml` next to the form.
//!
//! This file is edited by humans and must remain stable and automatable.
//! Missing fields default to sensible values.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::harness::DEFAULT_MAX_TURNS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FillConfig {
    /// Lifetime turn budget; frontmatter `harness.max_turns` overrides this.
    pub max_turns: u32,

    /// Per-invocation wall-clock budget for the agent command, in seconds.
    pub agent_timeout_secs: u64,

    /// Truncate agent stdout/stderr beyond this many bytes.
    pub agent_output_limit_bytes: usize,

    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Command invoked once per turn (e.g. `["my-agent", "--json"]`).
    pub command: Vec<String>,

    /// Role the agent acts as; its patches carry this role.
    pub role: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            role: crate::model::DEFAULT_ROLE.to_string(),
        }
    }
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            agent_timeout_secs: 10 * 60,
            agent_output_limit_bytes: 1_000_000,
            agent: AgentConfig::default(),
        }
    }
}

impl FillConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.agent_timeout_secs == 0 {
            return Err(anyhow!("agent_timeout_secs must be > 0"));
        }
        if self.agent_output_limit_bytes == 0 {
            return Err(anyhow!("agent_output_limit_bytes must be > 0"));
        }
        // An empty command is fine for validate/inspect/apply; the fill
        // command checks for it before spawning the agent.
        if let Some(first) = self.agent.command.first() {
            if first.trim().is_empty() {
                return Err(anyhow!("agent.command must not start with a blank entry"));
            }
        }
        if self.agent.role.trim().is_empty() {
            return Err(anyhow!("agent.role must not be blank"));
        }
        Ok(())
    }
}

/// Load config from a TOML file; a missing file means defaults.
pub fn load_config(path: &Path) -> Result<FillConfig> {
    if !path.exists() {
        let cfg = FillConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FillConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &FillConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    crate::io::write_atomic(path, &buf)
}
