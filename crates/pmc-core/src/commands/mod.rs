//! Console command language.
//!
//! Lines look like `Update-Package Foo -ProjectName Web -Safe -WhatIf`.
//! Command and parameter names are case-insensitive and parameters may be
//! abbreviated to any unique prefix.

pub mod package;
pub mod parser;

pub use package::{PackageCommand, PackageOptions};
pub use parser::{BoundParameters, parse_command, tokenize};

/// Whether a parameter takes a value or is a bare switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Switch,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: ParameterKind,
    /// Position for unnamed arguments, if any.
    pub position: Option<usize>,
}

impl ParameterSpec {
    const fn value(name: &'static str, position: Option<usize>) -> Self {
        Self {
            name,
            aliases: &[],
            kind: ParameterKind::Value,
            position,
        }
    }

    const fn switch(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            kind: ParameterKind::Switch,
            position: None,
        }
    }

    const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

pub const ID: &str = "Id";
pub const PROJECT_NAME: &str = "ProjectName";
pub const VERSION: &str = "Version";
pub const WHAT_IF: &str = "WhatIf";
pub const INCLUDE_PRERELEASE: &str = "IncludePrerelease";
pub const IGNORE_DEPENDENCIES: &str = "IgnoreDependencies";
pub const DEPENDENCY_VERSION: &str = "DependencyVersion";
pub const FILE_CONFLICT_ACTION: &str = "FileConflictAction";
pub const SAFE: &str = "Safe";
pub const TO_HIGHEST_MINOR: &str = "ToHighestMinor";
pub const REINSTALL: &str = "Reinstall";
pub const ALL: &str = "All";

const INSTALL_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::value(ID, Some(0)),
    ParameterSpec::value(PROJECT_NAME, Some(1)),
    ParameterSpec::value(VERSION, Some(2)),
    ParameterSpec::switch(WHAT_IF),
    ParameterSpec::switch(INCLUDE_PRERELEASE).with_aliases(&["Prerelease"]),
    ParameterSpec::switch(IGNORE_DEPENDENCIES),
    ParameterSpec::value(DEPENDENCY_VERSION, None),
    ParameterSpec::value(FILE_CONFLICT_ACTION, None),
];

const UPDATE_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::value(ID, Some(0)),
    ParameterSpec::value(PROJECT_NAME, Some(1)),
    ParameterSpec::value(VERSION, Some(2)),
    ParameterSpec::switch(SAFE).with_aliases(&["ToHighestPatch"]),
    ParameterSpec::switch(TO_HIGHEST_MINOR),
    ParameterSpec::switch(REINSTALL),
    ParameterSpec::switch(WHAT_IF),
    ParameterSpec::switch(INCLUDE_PRERELEASE).with_aliases(&["Prerelease"]),
    ParameterSpec::switch(IGNORE_DEPENDENCIES),
    ParameterSpec::value(DEPENDENCY_VERSION, None),
    ParameterSpec::value(FILE_CONFLICT_ACTION, None),
];

const GET_PROJECT_PARAMETERS: &[ParameterSpec] = &[ParameterSpec::switch(ALL)];

const GET_PACKAGE_PARAMETERS: &[ParameterSpec] = &[ParameterSpec::value(PROJECT_NAME, Some(0))];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    InstallPackage,
    UpdatePackage,
    GetProject,
    GetPackage,
}

impl CommandName {
    pub const ALL: [CommandName; 4] = [
        CommandName::InstallPackage,
        CommandName::UpdatePackage,
        CommandName::GetProject,
        CommandName::GetPackage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::InstallPackage => "Install-Package",
            CommandName::UpdatePackage => "Update-Package",
            CommandName::GetProject => "Get-Project",
            CommandName::GetPackage => "Get-Package",
        }
    }

    pub fn parameters(self) -> &'static [ParameterSpec] {
        match self {
            CommandName::InstallPackage => INSTALL_PARAMETERS,
            CommandName::UpdatePackage => UPDATE_PARAMETERS,
            CommandName::GetProject => GET_PROJECT_PARAMETERS,
            CommandName::GetPackage => GET_PACKAGE_PARAMETERS,
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.as_str().eq_ignore_ascii_case(name))
    }

    /// Commands whose name starts with `prefix`, ignoring case.
    pub fn completions(prefix: &str) -> impl Iterator<Item = CommandName> + '_ {
        Self::ALL.into_iter().filter(move |command| {
            command
                .as_str()
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase())
        })
    }

    pub fn parameter(self, name: &str) -> Option<&'static ParameterSpec> {
        self.parameters().iter().find(|spec| spec.matches(name))
    }
}

/// A fully parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Package(PackageCommand),
    GetProject { all: bool },
    GetPackage { project: Option<String> },
}
