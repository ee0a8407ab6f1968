//! Tab completion for console lines.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::commands::parser::{is_parameter_token, next_positional, resolve_parameter, tokenize_partial};
use crate::commands::{
    BoundParameters, CommandName, DEPENDENCY_VERSION, FILE_CONFLICT_ACTION, ID, PROJECT_NAME,
    ParameterKind, ParameterSpec, parser,
};
use crate::error::Result;
use crate::orchestration::PackageConsole;
use crate::types::{DependencyBehavior, FileConflictAction};

#[async_trait]
pub trait TabCompleter: Send + Sync {
    async fn complete(&self, line: &str, last_word: &str) -> Result<Vec<String>>;
}

/// Completes command names, parameter names and parameter values.
#[derive(Clone)]
pub struct CommandCompleter {
    console: PackageConsole,
}

impl CommandCompleter {
    pub fn new(console: PackageConsole) -> Self {
        Self { console }
    }

    async fn values_for(&self, parameter: &str, prefix: &str) -> Result<Vec<String>> {
        let candidates: Vec<String> = match parameter {
            PROJECT_NAME => self
                .console
                .projects()
                .await?
                .into_iter()
                .map(|project| project.name)
                .collect(),
            ID => self.installed_ids().await?,
            DEPENDENCY_VERSION => DependencyBehavior::ALL
                .iter()
                .map(|behavior| behavior.as_str().to_string())
                .collect(),
            FILE_CONFLICT_ACTION => FileConflictAction::ALL
                .iter()
                .map(|action| action.as_str().to_string())
                .collect(),
            _ => Vec::new(),
        };
        let prefix = prefix.trim_start_matches(['\'', '"']);
        Ok(candidates
            .into_iter()
            .filter(|value| starts_with_ignore_case(value, prefix))
            .map(|value| quote_if_needed(&value))
            .collect())
    }

    /// Ids installed anywhere in the solution, sorted and deduplicated.
    async fn installed_ids(&self) -> Result<Vec<String>> {
        let mut ids = BTreeSet::new();
        for project in self.console.projects().await? {
            for package in self.console.model().installed_packages(&project.name).await? {
                ids.insert(package.id);
            }
        }
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl TabCompleter for CommandCompleter {
    async fn complete(&self, line: &str, last_word: &str) -> Result<Vec<String>> {
        let mut tokens = tokenize_partial(line);
        // The word being completed is the last token unless the line ends in
        // whitespace. The tokenizer drops an opening quote, so compare
        // without it.
        let unquoted = last_word.trim_start_matches(['\'', '"']);
        if !last_word.is_empty()
            && tokens
                .last()
                .is_some_and(|token| token == last_word || token == unquoted)
        {
            tokens.pop();
        }

        let Some((name, args)) = tokens.split_first() else {
            return Ok(CommandName::completions(last_word)
                .map(|command| command.as_str().to_string())
                .collect());
        };
        let Some(command) = CommandName::lookup(name) else {
            return Ok(Vec::new());
        };

        if is_parameter_token(last_word) || last_word == "-" {
            return Ok(parameter_names(command, &last_word[1..]));
        }

        match pending_parameter(command, args) {
            Some(spec) => self.values_for(spec.name, last_word).await,
            None => Ok(Vec::new()),
        }
    }
}

fn parameter_names(command: CommandName, prefix: &str) -> Vec<String> {
    command
        .parameters()
        .iter()
        .filter(|spec| starts_with_ignore_case(spec.name, prefix))
        .map(|spec| format!("-{}", spec.name))
        .collect()
}

/// Parameter that the next word would be bound to.
fn pending_parameter(command: CommandName, args: &[String]) -> Option<&'static ParameterSpec> {
    if let Some(last) = args.last()
        && is_parameter_token(last)
    {
        let spec = resolve_parameter(command, &last[1..]).ok()?;
        return (spec.kind == ParameterKind::Value).then_some(spec);
    }

    // Bind the complete arguments leniently and find the next free position.
    let bound = parser::bind(command, args).unwrap_or_else(|_| BoundParameters::default());
    next_positional(command, &bound)
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .to_ascii_lowercase()
        .starts_with(&prefix.to_ascii_lowercase())
}

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}
