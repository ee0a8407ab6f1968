//! Boundary to the action planner.
//!
//! The planner turns a policy and a set of target projects into an ordered
//! list of install/uninstall/update primitives. Dependency-graph work is the
//! planner's business; this crate only validates inputs and consumes plans.

pub mod adapter;
pub mod feed;

use std::fmt;

use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::PlanningError;
use crate::policy::Policy;
use crate::project::ProjectTarget;
use crate::types::{OperationKind, PackageIdentity};

pub use adapter::PlannerAdapter;
pub use feed::{FeedPlanner, PackageFeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Install,
    Uninstall,
    Update,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Install => "Install",
            ActionKind::Uninstall => "Uninstall",
            ActionKind::Update => "Update",
        }
    }
}

/// One primitive step against one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAction {
    pub project: String,
    pub kind: ActionKind,
    pub package: PackageIdentity,
}

impl ProjectAction {
    pub fn new(project: impl Into<String>, kind: ActionKind, package: PackageIdentity) -> Self {
        Self {
            project: project.into(),
            kind,
            package,
        }
    }
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preposition = match self.kind {
            ActionKind::Uninstall => "from",
            ActionKind::Install | ActionKind::Update => "in",
        };
        write!(
            f,
            "{} '{}' {} project '{}'",
            self.kind.as_str(),
            self.package,
            preposition,
            self.project
        )
    }
}

/// Ordered plan produced by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub actions: Vec<ProjectAction>,
}

impl ActionPlan {
    pub fn new(actions: Vec<ProjectAction>) -> Self {
        Self { actions }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Project names in order of first appearance.
    pub fn projects(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for action in &self.actions {
            if !names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&action.project))
            {
                names.push(&action.project);
            }
        }
        names
    }

    /// This project's actions, in plan order.
    pub fn actions_for(&self, project: &str) -> Vec<ProjectAction> {
        self.actions
            .iter()
            .filter(|action| action.project.eq_ignore_ascii_case(project))
            .cloned()
            .collect()
    }
}

/// Everything the planner needs for one operation.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub kind: OperationKind,
    pub policy: &'a Policy,
    pub targets: &'a [ProjectTarget],
    pub package_id: Option<&'a str>,
    pub version: Option<&'a Version>,
}

#[async_trait]
pub trait ActionPlanner: Send + Sync {
    async fn plan(
        &self,
        request: PlanRequest<'_>,
        token: &CancellationToken,
    ) -> Result<ActionPlan, PlanningError>;
}
