//! Scope selection for package operations.

use crate::error::{ConsoleError, Result};
use crate::types::OperationKind;

use super::ProjectTarget;

/// A project left out of the operation and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub project: ProjectTarget,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSelection {
    pub targets: Vec<ProjectTarget>,
    pub excluded: Vec<Exclusion>,
}

impl ScopeSelection {
    /// Every project in scope, including those excluded from a reinstall.
    pub fn in_scope(&self) -> impl Iterator<Item = &ProjectTarget> {
        self.targets
            .iter()
            .chain(self.excluded.iter().map(|exclusion| &exclusion.project))
    }

    /// One warning covering every excluded project, if any were excluded.
    pub fn warning(&self) -> Option<String> {
        if self.excluded.is_empty() {
            return None;
        }
        let names = self
            .excluded
            .iter()
            .map(|exclusion| exclusion.project.name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Some(format!(
            "The `-Reinstall` parameter does not apply to PackageReference based projects '{}'.",
            names
        ))
    }
}

pub fn select_scope(
    kind: OperationKind,
    scope: Option<&str>,
    all_projects: &[ProjectTarget],
) -> Result<ScopeSelection> {
    let candidates = match scope {
        None => all_projects.to_vec(),
        Some(name) => {
            let project = all_projects
                .iter()
                .find(|project| project.is_named(name))
                .ok_or_else(|| ConsoleError::ProjectNotFound(name.to_string()))?;
            vec![project.clone()]
        }
    };

    if kind != OperationKind::Reinstall {
        return Ok(ScopeSelection {
            targets: candidates,
            excluded: Vec::new(),
        });
    }

    let (targets, unsupported): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|project| project.capabilities.supports_reinstall);

    let excluded = unsupported
        .into_iter()
        .map(|project| {
            tracing::debug!(project = %project.name, "excluding project from reinstall");
            Exclusion {
                reason: format!(
                    "Project '{}' uses PackageReference and cannot be reinstalled",
                    project.name
                ),
                project,
            }
        })
        .collect();

    Ok(ScopeSelection { targets, excluded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectCapabilities;

    fn project(name: &str, supports_reinstall: bool) -> ProjectTarget {
        ProjectTarget::new(
            name,
            ProjectCapabilities {
                supports_reinstall,
                supports_package_reference: !supports_reinstall,
            },
        )
    }

    #[test]
    fn no_scope_keeps_enumeration_order() {
        let all = vec![project("Zeta", true), project("Alpha", true), project("Mid", false)];
        let selection = select_scope(OperationKind::Update, None, &all).unwrap();
        assert_eq!(selection.targets, all);
        assert!(selection.excluded.is_empty());
        assert!(selection.warning().is_none());
    }

    #[test]
    fn named_scope_matches_case_insensitively() {
        let all = vec![project("Web", true), project("Api", true)];
        let selection = select_scope(OperationKind::Install, Some("api"), &all).unwrap();
        assert_eq!(selection.targets.len(), 1);
        assert_eq!(selection.targets[0].name, "Api");
    }

    #[test]
    fn unknown_project_is_an_error() {
        let all = vec![project("Web", true)];
        let err = select_scope(OperationKind::Install, Some("Missing"), &all).unwrap_err();
        assert!(matches!(err, ConsoleError::ProjectNotFound(name) if name == "Missing"));
    }

    #[test]
    fn named_scope_on_unsupported_project_excludes_it() {
        let all = vec![project("Web", false)];
        let selection = select_scope(OperationKind::Reinstall, Some("web"), &all).unwrap();
        assert!(selection.targets.is_empty());
        assert_eq!(selection.excluded.len(), 1);
    }
}
