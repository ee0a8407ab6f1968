//! Tokenizer and parameter binder.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConsoleError, Result};

use super::{CommandName, ConsoleCommand, PackageCommand, ParameterKind, ParameterSpec};

/// Split a line into words. Single or double quotes group words; a doubled
/// quote inside a quoted word stands for itself.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let (tokens, open_quote) = split_words(line);
    if let Some(quote) = open_quote {
        return Err(ConsoleError::InvalidCommand(format!(
            "The string is missing the terminator: {}",
            quote
        )));
    }
    Ok(tokens)
}

/// Lenient variant for completion: an unterminated quote ends the line.
pub(crate) fn tokenize_partial(line: &str) -> Vec<String> {
    split_words(line).0
}

fn split_words(line: &str) -> (Vec<String>, Option<char>) {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match quote {
            Some(q) if ch == q => {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some(_) => current.push(ch),
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    (tokens, quote)
}

/// Parameters bound to a command, keyed by canonical parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundParameters {
    values: BTreeMap<&'static str, String>,
    switches: BTreeSet<&'static str>,
}

impl BoundParameters {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    pub fn positional_count(&self, command: CommandName) -> usize {
        command
            .parameters()
            .iter()
            .filter(|spec| spec.position.is_some() && self.values.contains_key(spec.name))
            .count()
    }
}

/// Looks like a parameter name rather than a value such as `-1`.
pub(crate) fn is_parameter_token(token: &str) -> bool {
    token.len() > 1
        && token.starts_with('-')
        && token[1..].chars().next().is_some_and(char::is_alphabetic)
}

/// Resolve `name` (without the dash) against the command's parameters,
/// accepting a unique prefix.
pub(crate) fn resolve_parameter(command: CommandName, name: &str) -> Result<&'static ParameterSpec> {
    if let Some(spec) = command.parameter(name) {
        return Ok(spec);
    }
    let lower = name.to_ascii_lowercase();
    let candidates: Vec<&'static ParameterSpec> = command
        .parameters()
        .iter()
        .filter(|spec| {
            spec.name.to_ascii_lowercase().starts_with(&lower)
                || spec
                    .aliases
                    .iter()
                    .any(|alias| alias.to_ascii_lowercase().starts_with(&lower))
        })
        .collect();
    match candidates.as_slice() {
        [spec] => Ok(*spec),
        [] => Err(ConsoleError::InvalidCommand(format!(
            "A parameter cannot be found that matches parameter name '{}'.",
            name
        ))),
        many => Err(ConsoleError::InvalidCommand(format!(
            "Parameter name '{}' is ambiguous. Possible matches include: {}.",
            name,
            many.iter()
                .map(|spec| format!("-{}", spec.name))
                .collect::<Vec<_>>()
                .join(" ")
        ))),
    }
}

pub fn bind(command: CommandName, args: &[String]) -> Result<BoundParameters> {
    let mut bound = BoundParameters::default();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        if is_parameter_token(arg) {
            let spec = resolve_parameter(command, &arg[1..])?;
            ensure_unbound(&bound, spec)?;
            match spec.kind {
                ParameterKind::Switch => {
                    bound.switches.insert(spec.name);
                }
                ParameterKind::Value => {
                    let value = args.next().ok_or_else(|| {
                        ConsoleError::InvalidCommand(format!(
                            "Missing an argument for parameter '{}'.",
                            spec.name
                        ))
                    })?;
                    bound.values.insert(spec.name, value.clone());
                }
            }
            continue;
        }

        let spec = next_positional(command, &bound).ok_or_else(|| {
            ConsoleError::InvalidCommand(format!(
                "A positional parameter cannot be found that accepts argument '{}'.",
                arg
            ))
        })?;
        bound.values.insert(spec.name, arg.clone());
    }

    Ok(bound)
}

fn ensure_unbound(bound: &BoundParameters, spec: &ParameterSpec) -> Result<()> {
    if bound.values.contains_key(spec.name) || bound.switches.contains(spec.name) {
        return Err(ConsoleError::InvalidCommand(format!(
            "Cannot bind parameter because parameter '{}' is specified more than once.",
            spec.name
        )));
    }
    Ok(())
}

/// First positional parameter, in position order, that is still unbound.
pub(crate) fn next_positional(
    command: CommandName,
    bound: &BoundParameters,
) -> Option<&'static ParameterSpec> {
    let mut positional: Vec<&'static ParameterSpec> = command
        .parameters()
        .iter()
        .filter(|spec| spec.position.is_some())
        .collect();
    positional.sort_by_key(|spec| spec.position);
    positional
        .into_iter()
        .find(|spec| !bound.values.contains_key(spec.name))
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let tokens = tokenize(line)?;
    let (name, args) = tokens
        .split_first()
        .ok_or_else(|| ConsoleError::InvalidCommand("Empty command".to_string()))?;
    let command = CommandName::lookup(name).ok_or_else(|| {
        ConsoleError::InvalidCommand(format!(
            "The term '{}' is not recognized as the name of a command.",
            name
        ))
    })?;
    let bound = bind(command, args)?;
    tracing::debug!(command = command.as_str(), "parsed console command");

    match command {
        CommandName::InstallPackage | CommandName::UpdatePackage => Ok(ConsoleCommand::Package(
            PackageCommand::from_parameters(command, &bound)?,
        )),
        CommandName::GetProject => Ok(ConsoleCommand::GetProject {
            all: bound.switch(super::ALL),
        }),
        CommandName::GetPackage => Ok(ConsoleCommand::GetPackage {
            project: bound.value(super::PROJECT_NAME).map(str::to_string),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{DEPENDENCY_VERSION, ID, PROJECT_NAME, WHAT_IF};

    #[test]
    fn tokenize_handles_quotes() {
        let tokens = tokenize(r#"Install-Package Foo -ProjectName 'My Web' -Version "1.0""#).unwrap();
        assert_eq!(
            tokens,
            vec!["Install-Package", "Foo", "-ProjectName", "My Web", "-Version", "1.0"]
        );
        assert_eq!(tokenize("a 'it''s'").unwrap(), vec!["a", "it's"]);
        assert!(tokenize("a 'open").is_err());
    }

    #[test]
    fn bind_accepts_prefixes_and_positionals() {
        let args: Vec<String> = ["Foo", "Web", "-wh", "-depend", "Highest"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let bound = bind(CommandName::InstallPackage, &args).unwrap();
        assert_eq!(bound.value(ID), Some("Foo"));
        assert_eq!(bound.value(PROJECT_NAME), Some("Web"));
        assert!(bound.switch(WHAT_IF));
        assert_eq!(bound.value(DEPENDENCY_VERSION), Some("Highest"));
    }

    #[test]
    fn bind_rejects_ambiguous_and_unknown_names() {
        let ambiguous = bind(CommandName::UpdatePackage, &["-I".to_string()]).unwrap_err();
        assert!(ambiguous.to_string().contains("ambiguous"));

        let unknown = bind(CommandName::GetProject, &["-Bogus".to_string()]).unwrap_err();
        assert!(unknown.to_string().contains("Bogus"));
    }

    #[test]
    fn missing_value_is_reported() {
        let err = bind(CommandName::InstallPackage, &["-Version".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Missing an argument"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            parse_command("Remove-Package Foo"),
            Err(ConsoleError::InvalidCommand(_))
        ));
    }
}
