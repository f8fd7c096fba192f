//! Process and file plumbing for the CLI and command agents.

pub mod process;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Write a file atomically: write to a sibling tmp file, then rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
