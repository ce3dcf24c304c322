//! JSON documents exchanged by the command line tools.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tensorline_core::{Fiber, TrackingSettings};

/// A tracked bundle together with the settings that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<TrackingSettings>,
    pub fibers: Vec<Fiber>,
}

pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {what} in {}", path.display()))
}

pub fn write_json<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    ensure_parent_dir(path)
        .with_context(|| format!("failed to create directory for {}", path.display()))?;
    let payload = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {what}"))?;
    fs::write(path, payload)
        .with_context(|| format!("failed to write {what} to {}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
