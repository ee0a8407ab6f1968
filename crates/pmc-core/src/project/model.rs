//! Boundary to the externally owned project model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SignatureVerificationError;
use crate::planner::ProjectAction;
use crate::types::PackageIdentity;

/// What a project's package management style allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCapabilities {
    pub supports_reinstall: bool,
    pub supports_package_reference: bool,
}

/// Snapshot of one project taken at the start of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTarget {
    pub name: String,
    pub capabilities: ProjectCapabilities,
}

impl ProjectTarget {
    pub fn new(name: impl Into<String>, capabilities: ProjectCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Failure applying a project's actions.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    SignatureVerification(#[from] SignatureVerificationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read-mostly view of the solution. Only `apply` and `save` mutate.
#[async_trait]
pub trait ProjectModel: Send + Sync {
    /// All known projects in the model's enumeration order.
    async fn projects(&self) -> anyhow::Result<Vec<ProjectTarget>>;

    async fn installed_packages(&self, project: &str) -> anyhow::Result<Vec<PackageIdentity>>;

    /// Apply one project's share of a plan, in order.
    async fn apply(&self, project: &str, actions: &[ProjectAction]) -> Result<(), ActionError>;

    /// Persist the project's state.
    async fn save(&self, project: &str) -> anyhow::Result<()>;
}
