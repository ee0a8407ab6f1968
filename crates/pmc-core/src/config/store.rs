//! Config store for loading and saving pmc.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::paths::config_path_for_scope;
use super::{ConfigScope, PmcConfig, parser};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    scope: ConfigScope,
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(scope: ConfigScope, global_dir: &Path, solution_root: &Path) -> Self {
        Self {
            scope,
            config_path: config_path_for_scope(scope, global_dir, solution_root),
        }
    }

    /// Store backed by an explicit file, e.g. from `--config`.
    pub fn from_file(scope: ConfigScope, config_path: PathBuf) -> Self {
        Self { scope, config_path }
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> anyhow::Result<PmcConfig> {
        if !self.config_path.exists() {
            return Ok(PmcConfig::new());
        }
        parser::parse_pmc_toml(&self.config_path)
    }

    pub fn save(&self, config: &PmcConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
