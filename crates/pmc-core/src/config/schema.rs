//! Configuration schema for pmc.toml
//!
//! The same structure is used for both configuration layers:
//! - Global: ~/.config/pmc/pmc.toml
//! - Solution: ./pmc.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::SettingsSource;

/// Root configuration structure for pmc.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PmcConfig {
    /// Solution manifest describing the projects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<PathBuf>,

    /// Package feed used by the planner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<PathBuf>,

    /// String-valued settings keyed by name (e.g. `dependencyVersion`)
    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    /// Interactive console preferences
    #[serde(default)]
    pub console: ConsoleSection,
}

/// `[console]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConsoleSection {
    /// Prompt shown before each command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl PmcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for key in self.settings.keys() {
            if key.trim().is_empty() {
                anyhow::bail!("Setting names cannot be empty");
            }
        }
        if let Some(prompt) = &self.console.prompt
            && prompt.contains('\n')
        {
            anyhow::bail!("Console prompt must be a single line");
        }
        Ok(())
    }

    /// Set a setting, replacing any existing key that differs only in case.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.settings
            .retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        self.settings.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.settings.len();
        self.settings
            .retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        self.settings.len() != before
    }

    pub fn prompt(&self) -> &str {
        self.console.prompt.as_deref().unwrap_or("PM>")
    }
}

impl SettingsSource for PmcConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.settings
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.clone())
    }
}
