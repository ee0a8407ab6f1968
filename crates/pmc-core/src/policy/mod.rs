//! Resolution policy for one package operation.
//!
//! Precedence for every field: explicit per-call flag, then persisted
//! setting, then the hard-coded default. Reinstall overrides the update
//! constraint switches.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::config::{DEPENDENCY_VERSION_KEY, SettingsSource};
use crate::error::ConfigurationError;
use crate::types::{
    DependencyBehavior, FileConflictAction, OperationKind, VersionConstraint, VersionConstraints,
};

/// Immutable rules governing version and dependency selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub dependency_behavior: DependencyBehavior,
    pub allow_prerelease: bool,
    pub version_constraints: VersionConstraints,
    pub allow_delisted: bool,
    pub conflict_action: Option<FileConflictAction>,
}

/// A package operation as entered at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub package_id: Option<String>,
    pub version: Option<Version>,
    pub project: Option<String>,
    pub what_if: bool,
}

impl OperationRequest {
    pub fn install(package_id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Install,
            package_id: Some(package_id.into()),
            version: None,
            project: None,
            what_if: false,
        }
    }

    pub fn update(package_id: Option<String>) -> Self {
        Self {
            kind: OperationKind::Update,
            package_id,
            version: None,
            project: None,
            what_if: false,
        }
    }

    pub fn reinstall(package_id: Option<String>) -> Self {
        Self {
            kind: OperationKind::Reinstall,
            package_id,
            version: None,
            project: None,
            what_if: false,
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_what_if(mut self, what_if: bool) -> Self {
        self.what_if = what_if;
        self
    }
}

/// Explicit switches supplied with a single command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFlags {
    pub ignore_dependencies: bool,
    pub dependency_version: Option<DependencyBehavior>,
    pub include_prerelease: bool,
    /// Alias: ToHighestPatch
    pub safe: bool,
    pub to_highest_minor: bool,
    pub conflict_action: Option<FileConflictAction>,
}

/// Resolved policy plus the recovered configuration problem, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub policy: Policy,
    pub config_error: Option<ConfigurationError>,
}

pub fn resolve(
    request: &OperationRequest,
    flags: &PolicyFlags,
    settings: &dyn SettingsSource,
) -> ResolvedPolicy {
    let reinstall = request.kind == OperationKind::Reinstall;

    let (dependency_behavior, config_error) = dependency_behavior(request, flags, settings);

    let explicit_prerelease = request
        .version
        .as_ref()
        .is_some_and(|version| !version.pre.is_empty());

    let policy = Policy {
        dependency_behavior,
        allow_prerelease: flags.include_prerelease || explicit_prerelease,
        version_constraints: version_constraints(reinstall, flags),
        // A delisted package that is already installed must stay reinstallable.
        allow_delisted: reinstall,
        conflict_action: flags.conflict_action,
    };

    tracing::debug!(
        kind = request.kind.as_str(),
        dependency_behavior = %policy.dependency_behavior,
        allow_prerelease = policy.allow_prerelease,
        "resolved operation policy"
    );

    ResolvedPolicy {
        policy,
        config_error,
    }
}

fn dependency_behavior(
    request: &OperationRequest,
    flags: &PolicyFlags,
    settings: &dyn SettingsSource,
) -> (DependencyBehavior, Option<ConfigurationError>) {
    if request.kind == OperationKind::Update && request.package_id.is_none() {
        return (DependencyBehavior::Highest, None);
    }
    if flags.ignore_dependencies {
        return (DependencyBehavior::Ignore, None);
    }
    if let Some(behavior) = flags.dependency_version {
        return (behavior, None);
    }
    dependency_behavior_from_settings(settings)
}

/// Read the persisted default, falling back to `Lowest`.
pub fn dependency_behavior_from_settings(
    settings: &dyn SettingsSource,
) -> (DependencyBehavior, Option<ConfigurationError>) {
    let fallback = DependencyBehavior::Lowest;
    let Some(value) = settings.get(DEPENDENCY_VERSION_KEY) else {
        return (fallback, None);
    };
    if value.trim().is_empty() {
        return (fallback, None);
    }

    match value.parse::<DependencyBehavior>() {
        Ok(behavior) => (behavior, None),
        Err(_) => {
            let error = ConfigurationError {
                key: DEPENDENCY_VERSION_KEY.to_string(),
                value,
                fallback: fallback.to_string(),
            };
            tracing::warn!("{}", error);
            (fallback, Some(error))
        }
    }
}

fn version_constraints(reinstall: bool, flags: &PolicyFlags) -> VersionConstraints {
    if reinstall {
        VersionConstraints::exact()
    } else if flags.safe {
        VersionConstraints::from_iter([VersionConstraint::ExactMajor, VersionConstraint::ExactMinor])
    } else if flags.to_highest_minor {
        VersionConstraints::from_iter([VersionConstraint::ExactMajor])
    } else {
        VersionConstraints::none()
    }
}
