//! Console context: resolves paths and configuration and builds the
//! collaborators behind a [`PackageConsole`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::Context;

use crate::config::{ConfigScope, ConfigStore, PmcConfig, merge_configs, paths};
use crate::orchestration::PackageConsole;
use crate::planner::{FeedPlanner, PackageFeed};
use crate::project::SolutionFile;

const DEFAULT_SOLUTION_FILE: &str = "solution.toml";
const DEFAULT_FEED_FILE: &str = "feed.toml";

/// Frontends create this once and ask it for a console.
#[derive(Debug)]
pub struct ConsoleContext {
    /// Global config directory (e.g. ~/.config/pmc)
    global_config_dir: PathBuf,
    /// Directory holding the solution and its pmc.toml
    solution_root: PathBuf,
    /// Explicit config file replacing the solution layer
    config_file: Option<PathBuf>,
    solution_override: Option<PathBuf>,
    feed_override: Option<PathBuf>,
    config_cache: OnceLock<PmcConfig>,
}

impl ConsoleContext {
    pub fn new(global_config_dir: PathBuf, solution_root: PathBuf) -> Self {
        Self {
            global_config_dir,
            solution_root,
            config_file: None,
            solution_override: None,
            feed_override: None,
            config_cache: OnceLock::new(),
        }
    }

    /// Context rooted at the current directory with the user's global config.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let solution_root = std::env::current_dir().context("Failed to read current directory")?;
        Ok(Self::new(paths::default_global_dir()?, solution_root))
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_solution(mut self, path: impl Into<PathBuf>) -> Self {
        self.solution_override = Some(path.into());
        self
    }

    pub fn with_feed(mut self, path: impl Into<PathBuf>) -> Self {
        self.feed_override = Some(path.into());
        self
    }

    pub fn global_config_dir(&self) -> &Path {
        &self.global_config_dir
    }

    pub fn solution_root(&self) -> &Path {
        &self.solution_root
    }

    pub fn config_store(&self, scope: ConfigScope) -> ConfigStore {
        match (scope, &self.config_file) {
            (ConfigScope::Solution, Some(path)) => ConfigStore::from_file(scope, path.clone()),
            _ => ConfigStore::from_paths(scope, &self.global_config_dir, &self.solution_root),
        }
    }

    /// Merged global + solution configuration, loaded once.
    pub fn merged_config(&self) -> anyhow::Result<&PmcConfig> {
        if let Some(config) = self.config_cache.get() {
            return Ok(config);
        }
        let global = self.config_store(ConfigScope::Global).load()?;
        let solution = self.config_store(ConfigScope::Solution).load()?;
        let merged = merge_configs(Some(global), Some(solution));
        merged.validate()?;
        Ok(self.config_cache.get_or_init(|| merged))
    }

    pub fn solution_path(&self) -> anyhow::Result<PathBuf> {
        let configured = self.merged_config()?.solution.clone();
        Ok(self.resolve(self.solution_override.clone().or(configured), DEFAULT_SOLUTION_FILE))
    }

    pub fn feed_path(&self) -> anyhow::Result<PathBuf> {
        let configured = self.merged_config()?.feed.clone();
        Ok(self.resolve(self.feed_override.clone().or(configured), DEFAULT_FEED_FILE))
    }

    fn resolve(&self, path: Option<PathBuf>, default_name: &str) -> PathBuf {
        match path {
            Some(path) if path.is_absolute() => path,
            Some(path) => self.solution_root.join(path),
            None => self.solution_root.join(default_name),
        }
    }

    /// Open the solution and feed and wire them into a console.
    pub fn build_console(&self) -> anyhow::Result<PackageConsole> {
        let config = self.merged_config()?.clone();
        let solution_path = self.solution_path()?;
        let feed_path = self.feed_path()?;

        let model = Arc::new(SolutionFile::open(&solution_path)?);
        let feed = if feed_path.exists() {
            PackageFeed::load(&feed_path)?
        } else {
            tracing::warn!(path = %feed_path.display(), "package feed not found; no packages are available");
            PackageFeed::default()
        };
        let planner = Arc::new(FeedPlanner::new(feed, model.clone()));

        tracing::debug!(
            solution = %solution_path.display(),
            feed = %feed_path.display(),
            "console collaborators ready"
        );
        Ok(PackageConsole::new(model, planner, Arc::new(config)))
    }
}
