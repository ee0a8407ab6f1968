//! Shared core types used across policy, planning and execution layers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Kind of package operation requested from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Install,
    Update,
    Reinstall,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Install => "install",
            OperationKind::Update => "update",
            OperationKind::Reinstall => "reinstall",
        }
    }
}

/// How dependency versions are chosen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyBehavior {
    /// Do not install dependencies
    Ignore,
    /// Lowest version satisfying the dependency range
    Lowest,
    /// Highest available version
    Highest,
    /// Highest version with the same major version
    HighestMinor,
    /// Highest version with the same major and minor version
    HighestPatch,
}

impl DependencyBehavior {
    pub const ALL: [DependencyBehavior; 5] = [
        DependencyBehavior::Ignore,
        DependencyBehavior::Lowest,
        DependencyBehavior::Highest,
        DependencyBehavior::HighestMinor,
        DependencyBehavior::HighestPatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyBehavior::Ignore => "Ignore",
            DependencyBehavior::Lowest => "Lowest",
            DependencyBehavior::Highest => "Highest",
            DependencyBehavior::HighestMinor => "HighestMinor",
            DependencyBehavior::HighestPatch => "HighestPatch",
        }
    }
}

impl fmt::Display for DependencyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        Self::ALL
            .into_iter()
            .find(|behavior| behavior.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("Unknown dependency behavior: '{}'", value))
    }
}

/// Action taken when a package file already exists in the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileConflictAction {
    Overwrite,
    Ignore,
    OverwriteAll,
    IgnoreAll,
    Fail,
}

impl FileConflictAction {
    pub const ALL: [FileConflictAction; 5] = [
        FileConflictAction::Overwrite,
        FileConflictAction::Ignore,
        FileConflictAction::OverwriteAll,
        FileConflictAction::IgnoreAll,
        FileConflictAction::Fail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileConflictAction::Overwrite => "Overwrite",
            FileConflictAction::Ignore => "Ignore",
            FileConflictAction::OverwriteAll => "OverwriteAll",
            FileConflictAction::IgnoreAll => "IgnoreAll",
            FileConflictAction::Fail => "Fail",
        }
    }
}

impl FromStr for FileConflictAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("Unknown file conflict action: '{}'", value))
    }
}

/// A single version constraint applied when selecting update candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VersionConstraint {
    ExactMajor,
    ExactMinor,
    ExactPatch,
    ExactRelease,
}

/// Set of version constraints. Empty means any version may be chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConstraints(BTreeSet<VersionConstraint>);

impl VersionConstraints {
    pub fn none() -> Self {
        Self::default()
    }

    /// Every component pinned: used by reinstall.
    pub fn exact() -> Self {
        Self::from_iter([
            VersionConstraint::ExactMajor,
            VersionConstraint::ExactMinor,
            VersionConstraint::ExactPatch,
            VersionConstraint::ExactRelease,
        ])
    }

    pub fn insert(&mut self, constraint: VersionConstraint) {
        self.0.insert(constraint);
    }

    pub fn contains(&self, constraint: VersionConstraint) -> bool {
        self.0.contains(&constraint)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VersionConstraint> + '_ {
        self.0.iter().copied()
    }

    /// Check whether `candidate` is an acceptable replacement for `installed`.
    pub fn allows(&self, installed: &Version, candidate: &Version) -> bool {
        if self.contains(VersionConstraint::ExactMajor) && installed.major != candidate.major {
            return false;
        }
        if self.contains(VersionConstraint::ExactMinor) && installed.minor != candidate.minor {
            return false;
        }
        if self.contains(VersionConstraint::ExactPatch) && installed.patch != candidate.patch {
            return false;
        }
        if self.contains(VersionConstraint::ExactRelease) && installed.pre != candidate.pre {
            return false;
        }
        true
    }
}

impl FromIterator<VersionConstraint> for VersionConstraints {
    fn from_iter<T: IntoIterator<Item = VersionConstraint>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Package id plus a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Parse a package version, accepting short forms such as `1` or `1.2`.
pub fn parse_version(input: &str) -> anyhow::Result<Version> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Version cannot be empty");
    }
    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let (core, suffix) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("Invalid version: '{}'", trimmed);
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).map_err(|e| anyhow::anyhow!("Invalid version '{}': {}", trimmed, e))
}
