//! Runs one package operation end to end on a background task.
//!
//! policy -> scope -> planner -> executor, with every step reported through
//! the operation's [`Reporter`] and exactly one completion marker at the end.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SettingsSource;
use crate::error::{ConsoleError, PlanningError, Result};
use crate::execute::{ActionExecutor, ExecutionOutcome};
use crate::planner::{ActionPlanner, PlannerAdapter};
use crate::policy::{self, OperationRequest, PolicyFlags};
use crate::project::{ProjectModel, ProjectTarget, select_scope};
use crate::report::{self, ReportReceiver, Reporter};
use crate::types::OperationKind;

/// Shared collaborators for package operations. Cheap to clone.
#[derive(Clone)]
pub struct PackageConsole {
    model: Arc<dyn ProjectModel>,
    planner: PlannerAdapter,
    settings: Arc<dyn SettingsSource>,
}

/// Handle to a running background operation.
pub struct OperationHandle {
    token: CancellationToken,
    task: JoinHandle<Result<ExecutionOutcome>>,
}

impl OperationHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn wait(self) -> Result<ExecutionOutcome> {
        self.task
            .await
            .map_err(|e| ConsoleError::Other(anyhow::anyhow!("Operation task failed: {}", e)))?
    }
}

impl PackageConsole {
    pub fn new(
        model: Arc<dyn ProjectModel>,
        planner: Arc<dyn ActionPlanner>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            model,
            planner: PlannerAdapter::new(planner),
            settings,
        }
    }

    pub fn model(&self) -> &Arc<dyn ProjectModel> {
        &self.model
    }

    pub async fn projects(&self) -> Result<Vec<ProjectTarget>> {
        Ok(self.model.projects().await?)
    }

    /// Spawn the operation with a fresh cancellation token.
    pub fn start(
        &self,
        request: OperationRequest,
        flags: PolicyFlags,
    ) -> (ReportReceiver, OperationHandle) {
        self.start_with_token(request, flags, CancellationToken::new())
    }

    pub fn start_with_token(
        &self,
        request: OperationRequest,
        flags: PolicyFlags,
        token: CancellationToken,
    ) -> (ReportReceiver, OperationHandle) {
        let (reporter, receiver) = report::channel();
        let console = self.clone();
        let worker_token = token.clone();
        let task =
            tokio::spawn(async move { console.run(&request, &flags, &reporter, &worker_token).await });
        (receiver, OperationHandle { token, task })
    }

    /// Worker body. Always leaves the reporter completed.
    pub async fn run(
        &self,
        request: &OperationRequest,
        flags: &PolicyFlags,
        reporter: &Reporter,
        token: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        let _guard = reporter.completion_guard();

        match self.execute_operation(request, flags, reporter, token).await {
            Ok(outcome) => {
                reporter.complete(Some(outcome.clone()));
                Ok(outcome)
            }
            Err(err) => {
                report_failure(reporter, &err);
                reporter.complete(None);
                Err(err)
            }
        }
    }

    async fn execute_operation(
        &self,
        request: &OperationRequest,
        flags: &PolicyFlags,
        reporter: &Reporter,
        token: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        let resolved = policy::resolve(request, flags, self.settings.as_ref());
        if let Some(err) = &resolved.config_error {
            reporter.warning(err.to_string());
        }

        let projects = self.model.projects().await?;
        let selection = select_scope(request.kind, request.project.as_deref(), &projects)?;
        if let Some(warning) = selection.warning() {
            reporter.warning(warning);
        }

        // Checked against the scope before reinstall exclusions.
        if matches!(request.kind, OperationKind::Update | OperationKind::Reinstall)
            && let Some(id) = request.package_id.as_deref()
            && !id.trim().is_empty()
        {
            self.ensure_installed(id.trim(), selection.in_scope()).await?;
        }

        let plan = match self
            .planner
            .plan(
                request.kind,
                &resolved.policy,
                &selection.targets,
                request.package_id.as_deref(),
                request.version.as_ref(),
                token,
            )
            .await
        {
            Ok(plan) => plan,
            Err(ConsoleError::Planning(PlanningError::AlreadyInstalled(err))) => {
                reporter.info(err.to_string());
                return Ok(ExecutionOutcome::default());
            }
            Err(err) => return Err(err),
        };

        if plan.is_empty() && !request.what_if {
            reporter.info(empty_plan_message(request));
        }

        let executor = ActionExecutor::new(self.model.clone());
        Ok(executor
            .execute(&plan, &selection.targets, request.what_if, reporter, token)
            .await)
    }

    async fn ensure_installed<'a>(
        &self,
        id: &str,
        projects: impl Iterator<Item = &'a ProjectTarget>,
    ) -> Result<()> {
        for target in projects {
            let installed = self.model.installed_packages(&target.name).await?;
            if installed.iter().any(|package| package.matches_id(id)) {
                return Ok(());
            }
        }
        Err(ConsoleError::PackageNotInstalled(id.to_string()))
    }
}

fn empty_plan_message(request: &OperationRequest) -> String {
    match (request.kind, request.package_id.as_deref()) {
        (OperationKind::Reinstall, Some(id)) => format!("'{}' has nothing to reinstall", id),
        (OperationKind::Reinstall, None) => "There are no packages to reinstall".to_string(),
        (_, Some(id)) => format!("No updates are available for '{}'", id),
        (_, None) => "No package updates are available".to_string(),
    }
}

fn report_failure(reporter: &Reporter, err: &ConsoleError) {
    match err {
        ConsoleError::Cancelled => {
            reporter.warning(err.to_string());
        }
        ConsoleError::Planning(PlanningError::SignatureVerification(signature)) => {
            reporter.error(signature.aggregated());
        }
        _ => {
            tracing::debug!(error = %err, "operation failed");
            reporter.error(format!("{:#}", err));
        }
    }
}
