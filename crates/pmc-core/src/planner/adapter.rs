//! Input validation in front of the planner.

use std::sync::Arc;

use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::error::{ConsoleError, Result};
use crate::policy::Policy;
use crate::project::ProjectTarget;
use crate::types::OperationKind;

use super::{ActionPlan, ActionPlanner, PlanRequest};

#[derive(Clone)]
pub struct PlannerAdapter {
    planner: Arc<dyn ActionPlanner>,
}

impl PlannerAdapter {
    pub fn new(planner: Arc<dyn ActionPlanner>) -> Self {
        Self { planner }
    }

    pub async fn plan(
        &self,
        kind: OperationKind,
        policy: &Policy,
        targets: &[ProjectTarget],
        package_id: Option<&str>,
        version: Option<&Version>,
        token: &CancellationToken,
    ) -> Result<ActionPlan> {
        if targets.is_empty() {
            return Err(ConsoleError::NoApplicableProjects);
        }
        if package_id.is_some_and(|id| id.trim().is_empty()) {
            return Err(ConsoleError::InvalidPackageId);
        }
        if token.is_cancelled() {
            return Err(ConsoleError::Cancelled);
        }

        let request = PlanRequest {
            kind,
            policy,
            targets,
            package_id: package_id.map(str::trim),
            version,
        };
        let plan = match self.planner.plan(request, token).await {
            Ok(plan) => plan,
            // A planner that notices cancellation stops with its own error.
            Err(err) if token.is_cancelled() => {
                tracing::debug!(error = %err, "planning stopped by cancellation");
                return Err(ConsoleError::Cancelled);
            }
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(actions = plan.actions.len(), "planner returned plan");
        Ok(plan)
    }
}
