//! Planner backed by a local package feed file.
//!
//! The feed lists the versions available for each package id:
//!
//! ```toml
//! [[package]]
//! id = "Newtonsoft.Json"
//! versions = ["12.0.1", "12.0.3", "13.0.1", "13.1.0-beta1"]
//! delisted = ["12.0.2"]
//! ```
//!
//! Only version selection is done here. Dependency graphs are not walked.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::parser::enhance_toml_error;
use crate::error::{PackageAlreadyInstalledError, PlanningError, SignatureVerificationError};
use crate::policy::Policy;
use crate::project::ProjectModel;
use crate::types::{OperationKind, PackageIdentity};

use super::{ActionKind, ActionPlan, ActionPlanner, PlanRequest, ProjectAction};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageFeed {
    #[serde(default, rename = "package")]
    pub packages: Vec<FeedPackage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPackage {
    pub id: String,
    #[serde(default)]
    pub versions: Vec<Version>,
    /// Versions still downloadable but hidden from searches.
    #[serde(default)]
    pub delisted: Vec<Version>,
    /// Problems reported when the package signature is checked.
    #[serde(default, rename = "signature-issues")]
    pub signature_issues: Vec<String>,
}

impl FeedPackage {
    fn is_listed(&self, version: &Version) -> bool {
        !self.delisted.contains(version)
    }

    fn has_version(&self, version: &Version) -> bool {
        self.versions.contains(version) || self.delisted.contains(version)
    }
}

impl PackageFeed {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read package feed: {}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| enhance_toml_error(e, &content))
            .with_context(|| format!("Failed to parse package feed: {}", path.display()))
    }

    pub fn find(&self, id: &str) -> Option<&FeedPackage> {
        self.packages
            .iter()
            .find(|package| package.id.eq_ignore_ascii_case(id))
    }

    /// Package ids in feed order, for completion.
    pub fn package_ids(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|package| package.id.as_str())
    }
}

pub struct FeedPlanner {
    feed: PackageFeed,
    model: Arc<dyn ProjectModel>,
}

impl FeedPlanner {
    pub fn new(feed: PackageFeed, model: Arc<dyn ProjectModel>) -> Self {
        Self { feed, model }
    }

    pub fn feed(&self) -> &PackageFeed {
        &self.feed
    }

    fn package(&self, id: &str) -> Result<&FeedPackage, PlanningError> {
        let package = self
            .feed
            .find(id)
            .ok_or_else(|| PlanningError::PackageNotFound(id.to_string()))?;
        if !package.signature_issues.is_empty() {
            return Err(SignatureVerificationError::new(
                format!("Package signature validation failed for '{}'", package.id),
                package.signature_issues.clone(),
            )
            .into());
        }
        Ok(package)
    }

    fn require_version(
        package: &FeedPackage,
        version: &Version,
    ) -> Result<PackageIdentity, PlanningError> {
        if !package.has_version(version) {
            return Err(PlanningError::VersionNotFound {
                package: package.id.clone(),
                version: version.to_string(),
            });
        }
        Ok(PackageIdentity::new(package.id.clone(), version.clone()))
    }

    /// Highest version the policy accepts, optionally relative to `installed`.
    fn best_version(
        package: &FeedPackage,
        policy: &Policy,
        installed: Option<&Version>,
    ) -> Option<Version> {
        package
            .versions
            .iter()
            .chain(package.delisted.iter())
            .filter(|version| policy.allow_delisted || package.is_listed(version))
            .filter(|version| policy.allow_prerelease || version.pre.is_empty())
            .filter(|version| {
                installed.is_none_or(|installed| {
                    policy.version_constraints.allows(installed, version)
                })
            })
            .max()
            .cloned()
    }

    async fn installed(
        &self,
        project: &str,
        token: &CancellationToken,
    ) -> Result<Vec<PackageIdentity>, PlanningError> {
        if token.is_cancelled() {
            return Err(anyhow::anyhow!("Planning was cancelled").into());
        }
        Ok(self.model.installed_packages(project).await?)
    }

    async fn plan_install(
        &self,
        request: &PlanRequest<'_>,
        token: &CancellationToken,
    ) -> Result<ActionPlan, PlanningError> {
        let id = request
            .package_id
            .ok_or_else(|| anyhow::anyhow!("Install requires a package id"))?;
        let package = self.package(id)?;
        let identity = match request.version {
            Some(version) => Self::require_version(package, version)?,
            None => {
                let version = Self::best_version(package, request.policy, None)
                    .ok_or_else(|| PlanningError::PackageNotFound(id.to_string()))?;
                PackageIdentity::new(package.id.clone(), version)
            }
        };

        let mut actions = Vec::new();
        let mut already_in = None;
        for target in request.targets {
            let installed = self.installed(&target.name, token).await?;
            match installed.iter().find(|p| p.matches_id(&identity.id)) {
                Some(existing) if existing.version == identity.version => {
                    already_in.get_or_insert_with(|| target.name.clone());
                }
                Some(_) => actions.push(ProjectAction::new(
                    &target.name,
                    ActionKind::Update,
                    identity.clone(),
                )),
                None => actions.push(ProjectAction::new(
                    &target.name,
                    ActionKind::Install,
                    identity.clone(),
                )),
            }
        }

        if actions.is_empty()
            && let Some(project) = already_in
        {
            return Err(PackageAlreadyInstalledError {
                package: identity.to_string(),
                project,
            }
            .into());
        }
        Ok(ActionPlan::new(actions))
    }

    async fn plan_update(
        &self,
        request: &PlanRequest<'_>,
        token: &CancellationToken,
    ) -> Result<ActionPlan, PlanningError> {
        let mut actions = Vec::new();
        for target in request.targets {
            let installed = self.installed(&target.name, token).await?;
            for current in installed
                .iter()
                .filter(|p| request.package_id.is_none_or(|id| p.matches_id(id)))
            {
                let package = self.package(&current.id)?;
                let next = match request.version {
                    Some(version) => Self::require_version(package, version)?.version,
                    None => match Self::best_version(package, request.policy, Some(&current.version))
                    {
                        Some(version) if version > current.version => version,
                        _ => continue,
                    },
                };
                if next == current.version {
                    continue;
                }
                actions.push(ProjectAction::new(
                    &target.name,
                    ActionKind::Update,
                    PackageIdentity::new(package.id.clone(), next),
                ));
            }
        }
        Ok(ActionPlan::new(actions))
    }

    async fn plan_reinstall(
        &self,
        request: &PlanRequest<'_>,
        token: &CancellationToken,
    ) -> Result<ActionPlan, PlanningError> {
        let mut actions = Vec::new();
        for target in request.targets {
            let installed = self.installed(&target.name, token).await?;
            for current in installed
                .iter()
                .filter(|p| request.package_id.is_none_or(|id| p.matches_id(id)))
            {
                let package = self.package(&current.id)?;
                let identity = Self::require_version(package, &current.version)?;
                actions.push(ProjectAction::new(
                    &target.name,
                    ActionKind::Uninstall,
                    identity.clone(),
                ));
                actions.push(ProjectAction::new(&target.name, ActionKind::Install, identity));
            }
        }
        Ok(ActionPlan::new(actions))
    }
}

#[async_trait]
impl ActionPlanner for FeedPlanner {
    async fn plan(
        &self,
        request: PlanRequest<'_>,
        token: &CancellationToken,
    ) -> Result<ActionPlan, PlanningError> {
        match request.kind {
            OperationKind::Install => self.plan_install(&request, token).await,
            OperationKind::Update => self.plan_update(&request, token).await,
            OperationKind::Reinstall => self.plan_reinstall(&request, token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::solution::{ProjectEntry, SolutionManifest};
    use crate::project::{PackageStyle, ProjectTarget, SolutionFile};
    use crate::types::{DependencyBehavior, VersionConstraint, VersionConstraints};

    const FEED: &str = r#"
[[package]]
id = "Foo"
versions = ["1.0.0", "1.1.0", "1.2.3", "2.0.0", "2.1.0-beta.1"]
delisted = ["1.2.4"]

[[package]]
id = "Signed"
versions = ["1.0.0"]
signature-issues = ["NU3008: The package integrity check failed."]
"#;

    fn planner(packages: Vec<PackageIdentity>) -> (FeedPlanner, Vec<ProjectTarget>) {
        let feed: PackageFeed = toml::from_str(FEED).unwrap();
        let manifest = SolutionManifest {
            projects: vec![ProjectEntry {
                name: "Web".to_string(),
                style: PackageStyle::PackagesConfig,
                packages,
            }],
        };
        let model = Arc::new(SolutionFile::from_manifest("unused.toml", manifest));
        let targets = vec![ProjectTarget::new(
            "Web",
            crate::project::ProjectCapabilities {
                supports_reinstall: true,
                supports_package_reference: false,
            },
        )];
        (FeedPlanner::new(feed, model), targets)
    }

    fn policy(constraints: VersionConstraints) -> Policy {
        Policy {
            dependency_behavior: DependencyBehavior::Lowest,
            allow_prerelease: false,
            version_constraints: constraints,
            allow_delisted: false,
            conflict_action: None,
        }
    }

    fn request<'a>(
        kind: OperationKind,
        policy: &'a Policy,
        targets: &'a [ProjectTarget],
        package_id: Option<&'a str>,
    ) -> PlanRequest<'a> {
        PlanRequest {
            kind,
            policy,
            targets,
            package_id,
            version: None,
        }
    }

    #[tokio::test]
    async fn install_picks_highest_stable_listed_version() {
        let (planner, targets) = planner(Vec::new());
        let policy = policy(VersionConstraints::none());
        let plan = planner
            .plan(
                request(OperationKind::Install, &policy, &targets, Some("foo")),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind, ActionKind::Install);
        assert_eq!(plan.actions[0].package.version, Version::new(2, 0, 0));
    }

    #[tokio::test]
    async fn install_of_installed_version_reports_already_installed() {
        let (planner, targets) = planner(vec![PackageIdentity::new("Foo", Version::new(2, 0, 0))]);
        let policy = policy(VersionConstraints::none());
        let err = planner
            .plan(
                request(OperationKind::Install, &policy, &targets, Some("Foo")),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_already_installed());
    }

    #[tokio::test]
    async fn safe_update_stays_within_minor() {
        let (planner, targets) = planner(vec![PackageIdentity::new("Foo", Version::new(1, 1, 0))]);
        let constraints = VersionConstraints::from_iter([
            VersionConstraint::ExactMajor,
            VersionConstraint::ExactMinor,
        ]);
        let policy = policy(constraints);
        let plan = planner
            .plan(
                request(OperationKind::Update, &policy, &targets, None),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(plan.is_empty());

        let policy = Policy {
            version_constraints: VersionConstraints::from_iter([VersionConstraint::ExactMajor]),
            ..policy
        };
        let plan = planner
            .plan(
                request(OperationKind::Update, &policy, &targets, None),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(plan.actions[0].package.version, Version::new(1, 2, 3));
    }

    #[tokio::test]
    async fn reinstall_uninstalls_then_installs_same_version() {
        let (planner, targets) = planner(vec![PackageIdentity::new("Foo", Version::new(1, 2, 4))]);
        let policy = Policy {
            allow_delisted: true,
            ..policy(VersionConstraints::exact())
        };
        let plan = planner
            .plan(
                request(OperationKind::Reinstall, &policy, &targets, None),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let kinds: Vec<_> = plan.actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Uninstall, ActionKind::Install]);
        assert!(plan.actions.iter().all(|a| a.package.version == Version::new(1, 2, 4)));
    }

    #[tokio::test]
    async fn signature_issues_fail_planning() {
        let (planner, targets) = planner(Vec::new());
        let policy = policy(VersionConstraints::none());
        let err = planner
            .plan(
                request(OperationKind::Install, &policy, &targets, Some("Signed")),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        let PlanningError::SignatureVerification(signature) = err else {
            panic!("expected signature failure");
        };
        assert_eq!(signature.issues.len(), 1);
    }
}
