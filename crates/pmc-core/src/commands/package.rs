//! Install-Package and Update-Package options.

use semver::Version;

use crate::error::{ConsoleError, Result};
use crate::policy::{OperationRequest, PolicyFlags};
use crate::types::{DependencyBehavior, FileConflictAction, OperationKind, parse_version};

use super::parser::BoundParameters;
use super::{
    CommandName, DEPENDENCY_VERSION, FILE_CONFLICT_ACTION, ID, IGNORE_DEPENDENCIES,
    INCLUDE_PRERELEASE, PROJECT_NAME, REINSTALL, SAFE, TO_HIGHEST_MINOR, VERSION, WHAT_IF,
};

/// Options for a package operation, independent of how they were entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOptions {
    pub kind: OperationKind,
    /// Package id; pipeline input supplies it when absent
    pub id: Option<String>,
    /// Single target project (None = every project)
    pub project: Option<String>,
    pub version: Option<Version>,
    /// Preview only
    pub what_if: bool,
    pub flags: PolicyFlags,
}

impl PackageOptions {
    pub fn install(id: impl Into<String>) -> Self {
        Self::new(OperationKind::Install, Some(id.into()))
    }

    /// Update one package, or every package when `id` is None.
    pub fn update(id: Option<String>) -> Self {
        Self::new(OperationKind::Update, id)
    }

    pub fn reinstall(id: Option<String>) -> Self {
        Self::new(OperationKind::Reinstall, id)
    }

    fn new(kind: OperationKind, id: Option<String>) -> Self {
        Self {
            kind,
            id,
            project: None,
            version: None,
            what_if: false,
            flags: PolicyFlags::default(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_what_if(mut self, what_if: bool) -> Self {
        self.what_if = what_if;
        self
    }

    pub fn with_flags(mut self, flags: PolicyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// One request per package id. Pipeline input is used only when no id
    /// was given explicitly.
    pub fn requests(&self, input: &[String]) -> Result<Vec<OperationRequest>> {
        let ids: Vec<Option<String>> = match (&self.id, input) {
            (Some(id), _) => vec![Some(id.clone())],
            (None, []) => vec![None],
            (None, values) => values.iter().cloned().map(Some).collect(),
        };

        ids.into_iter()
            .map(|id| {
                if self.kind == OperationKind::Install && id.is_none() {
                    return Err(ConsoleError::InvalidCommand(
                        "Missing mandatory parameter 'Id'.".to_string(),
                    ));
                }
                if self.version.is_some() && id.is_none() {
                    return Err(ConsoleError::InvalidCommand(
                        "The -Version parameter requires -Id.".to_string(),
                    ));
                }
                Ok(OperationRequest {
                    kind: self.kind,
                    package_id: id,
                    version: self.version.clone(),
                    project: self.project.clone(),
                    what_if: self.what_if,
                })
            })
            .collect()
    }
}

/// A parsed Install-Package or Update-Package line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCommand {
    pub name: CommandName,
    pub options: PackageOptions,
}

impl PackageCommand {
    pub(crate) fn from_parameters(name: CommandName, bound: &BoundParameters) -> Result<Self> {
        let id = bound.value(ID).map(str::to_string);
        let mut options = match name {
            CommandName::UpdatePackage if bound.switch(REINSTALL) => PackageOptions::reinstall(id),
            CommandName::UpdatePackage => PackageOptions::update(id),
            _ => PackageOptions::new(OperationKind::Install, id),
        };

        if let Some(project) = bound.value(PROJECT_NAME) {
            options = options.with_project(project);
        }
        if let Some(version) = bound.value(VERSION) {
            let version = parse_version(version)
                .map_err(|e| ConsoleError::InvalidCommand(e.to_string()))?;
            options = options.with_version(version);
        }

        let dependency_version = bound
            .value(DEPENDENCY_VERSION)
            .map(str::parse::<DependencyBehavior>)
            .transpose()
            .map_err(ConsoleError::InvalidCommand)?;
        let conflict_action = bound
            .value(FILE_CONFLICT_ACTION)
            .map(str::parse::<FileConflictAction>)
            .transpose()
            .map_err(ConsoleError::InvalidCommand)?;

        let flags = PolicyFlags {
            ignore_dependencies: bound.switch(IGNORE_DEPENDENCIES),
            dependency_version,
            include_prerelease: bound.switch(INCLUDE_PRERELEASE),
            safe: bound.switch(SAFE),
            to_highest_minor: bound.switch(TO_HIGHEST_MINOR),
            conflict_action,
        };

        Ok(Self {
            name,
            options: options
                .with_what_if(bound.switch(WHAT_IF))
                .with_flags(flags),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ConsoleCommand, parse_command};

    fn package(line: &str) -> PackageCommand {
        match parse_command(line).unwrap() {
            ConsoleCommand::Package(command) => command,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn install_line_maps_to_request_and_flags() {
        let command = package(
            "install-package Foo -ProjectName Web -Version 1.2 -Prerelease -DependencyVersion highestpatch -FileConflictAction IgnoreAll",
        );
        let options = &command.options;
        assert_eq!(options.kind, OperationKind::Install);
        assert_eq!(options.version, Some(Version::new(1, 2, 0)));
        assert!(options.flags.include_prerelease);
        assert_eq!(
            options.flags.dependency_version,
            Some(DependencyBehavior::HighestPatch)
        );
        assert_eq!(options.flags.conflict_action, Some(FileConflictAction::IgnoreAll));

        let requests = options.requests(&[]).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].project.as_deref(), Some("Web"));
    }

    #[test]
    fn update_reinstall_switch_changes_kind() {
        let command = package("Update-Package -Reinstall -ProjectName Lib");
        assert_eq!(command.options.kind, OperationKind::Reinstall);
        assert!(command.options.id.is_none());
    }

    #[test]
    fn to_highest_patch_is_safe() {
        let command = package("Update-Package Foo -ToHighestPatch");
        assert!(command.options.flags.safe);
    }

    #[test]
    fn pipeline_input_supplies_ids() {
        let command = package("Update-Package -Safe");
        let input = vec!["Foo".to_string(), "Bar".to_string()];
        let requests = command.options.requests(&input).unwrap();
        let ids: Vec<_> = requests.iter().map(|r| r.package_id.clone()).collect();
        assert_eq!(ids, vec![Some("Foo".to_string()), Some("Bar".to_string())]);
    }

    #[test]
    fn install_without_id_is_rejected() {
        let command = package("Install-Package -WhatIf");
        assert!(matches!(
            command.options.requests(&[]),
            Err(ConsoleError::InvalidCommand(_))
        ));
    }

    #[test]
    fn bad_dependency_version_is_rejected() {
        assert!(parse_command("Install-Package Foo -DependencyVersion Newest").is_err());
    }
}
