//! Config path resolution helpers.

use std::path::{Path, PathBuf};

use super::ConfigScope;

pub const CONFIG_FILE_NAME: &str = "pmc.toml";

pub fn config_path_for_scope(scope: ConfigScope, global_dir: &Path, solution_root: &Path) -> PathBuf {
    match scope {
        ConfigScope::Global => global_dir.join(CONFIG_FILE_NAME),
        ConfigScope::Solution => solution_root.join(CONFIG_FILE_NAME),
    }
}

/// Default global configuration directory.
pub fn default_global_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("pmc"))
}
