//! Whitelist/blacklist JSON and the rule-sync file read by the decision-tree
//! engine.

use crate::models::scene_lists::SceneLists;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub struct RuleStore;

impl RuleStore {
    /// Writes `{"whitelist": [...], "blacklist": [...]}` pretty-printed with a
    /// trailing newline.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_lists(path: &Path, lists: &SceneLists) -> Result<()> {
        let mut json = serde_json::to_string_pretty(lists)?;
        json.push('\n');
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Persists the lists to the rule-sync location, creating parent
    /// directories.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn sync_rules(path: &Path, lists: &SceneLists) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Self::write_lists(path, lists)?;
        tracing::info!(
            path = %path.display(),
            whitelist = lists.whitelist.len(),
            "Synchronised scene rules"
        );
        Ok(())
    }

    /// # Errors
    /// Returns an error if the file is missing or malformed.
    pub fn read_lists(path: &Path) -> Result<SceneLists> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Malformed rule file {}", path.display()))
    }
}
