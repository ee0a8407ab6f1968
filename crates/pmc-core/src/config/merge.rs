//! Configuration layer merging logic
//!
//! Global -> Solution. Later layers win key by key.

use super::schema::PmcConfig;

/// Merge the global and solution configuration layers
pub fn merge_configs(global: Option<PmcConfig>, solution: Option<PmcConfig>) -> PmcConfig {
    let mut merged = global.unwrap_or_default();

    if let Some(layer) = solution {
        if layer.solution.is_some() {
            merged.solution = layer.solution;
        }
        if layer.feed.is_some() {
            merged.feed = layer.feed;
        }
        for (key, value) in layer.settings {
            merged.set(&key, value);
        }
        if layer.console.prompt.is_some() {
            merged.console.prompt = layer.console.prompt;
        }
    }

    merged
}
