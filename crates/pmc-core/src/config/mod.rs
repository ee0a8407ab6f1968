//! Configuration management
//!
//! Two layers are read and merged:
//! - Global: ~/.config/pmc/pmc.toml
//! - Solution: ./pmc.toml (next to the solution)

pub mod merge;
pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use merge::merge_configs;
pub use parser::{parse_pmc_toml, parse_pmc_toml_str, to_toml};
pub use paths::config_path_for_scope;
pub use schema::{ConsoleSection, PmcConfig};
pub use store::ConfigStore;

/// Setting holding the default dependency behavior.
pub const DEPENDENCY_VERSION_KEY: &str = "dependencyVersion";

/// Configuration scope levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigScope {
    /// User-wide configuration
    Global,
    /// Configuration stored next to the solution
    Solution,
}

/// Read access to persisted string settings.
pub trait SettingsSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.clone())
    }
}
