//! TOML parser with helpful error messages

use super::schema::PmcConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse pmc.toml with detailed error messages
pub fn parse_pmc_toml(path: &Path) -> Result<PmcConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_pmc_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse pmc.toml content from string
pub fn parse_pmc_toml_str(content: &str) -> Result<PmcConfig> {
    let config: PmcConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending line
pub(crate) fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_hint = error
        .span()
        .map(|span| content[..span.start.min(content.len())].lines().count().max(1));

    if let Some(line_num) = line_hint {
        let context = get_line_context(content, line_num);
        anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            context,
            error_msg
        )
    } else {
        anyhow::anyhow!("TOML parsing error: {}", error_msg)
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());
    if start >= end {
        return String::new();
    }

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &PmcConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
solution = "app.solution.toml"
feed = "feed.toml"

[settings]
dependencyVersion = "HighestMinor"

[console]
prompt = "PM>"
"#;

        let config = parse_pmc_toml_str(toml).unwrap();
        assert_eq!(config.get("dependencyversion").as_deref(), Some("HighestMinor"));
        assert_eq!(config.feed.as_deref(), Some(Path::new("feed.toml")));
        assert_eq!(config.prompt(), "PM>");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_pmc_toml_str("").unwrap();
        assert!(config.settings.is_empty());
        assert!(config.solution.is_none());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_pmc_toml_str("[settings]\ndependencyVersion = \n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_parse_file_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[settings]\ndependencyVersion = \"Lowest\"").unwrap();

        let config = parse_pmc_toml(file.path()).unwrap();
        let rendered = to_toml(&config).unwrap();
        assert!(rendered.contains("dependencyVersion = \"Lowest\""));
    }
}
