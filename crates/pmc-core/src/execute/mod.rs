//! Applies an action plan to its target projects.
//!
//! Failures are isolated per project and the batch keeps going. Nothing is
//! rolled back: a project that was applied and saved stays that way even if
//! a later project fails.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::planner::{ActionKind, ActionPlan, ProjectAction};
use crate::project::{ActionError, ProjectModel, ProjectTarget};
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Cancelled,
    NothingToDo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Apply,
    Save,
    SignatureVerification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectResult {
    Applied,
    Skipped(SkipReason),
    Failed { kind: FailureKind, message: String },
}

impl ProjectResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, ProjectResult::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProjectResult::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProjectResult::Skipped(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOutcome {
    pub project: String,
    pub result: ProjectResult,
}

/// Aggregate of one execution. `preview` is only filled for what-if runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub results: Vec<ProjectOutcome>,
    pub preview: Vec<String>,
}

impl ExecutionOutcome {
    pub fn applied(&self) -> usize {
        self.count(ProjectResult::is_applied)
    }

    pub fn failed(&self) -> usize {
        self.count(ProjectResult::is_failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(ProjectResult::is_skipped)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn result_for(&self, project: &str) -> Option<&ProjectResult> {
        self.results
            .iter()
            .find(|outcome| outcome.project.eq_ignore_ascii_case(project))
            .map(|outcome| &outcome.result)
    }

    fn count(&self, predicate: fn(&ProjectResult) -> bool) -> usize {
        self.results
            .iter()
            .filter(|outcome| predicate(&outcome.result))
            .count()
    }
}

pub struct ActionExecutor {
    model: Arc<dyn ProjectModel>,
}

impl ActionExecutor {
    pub fn new(model: Arc<dyn ProjectModel>) -> Self {
        Self { model }
    }

    pub async fn execute(
        &self,
        plan: &ActionPlan,
        targets: &[ProjectTarget],
        what_if: bool,
        reporter: &Reporter,
        token: &CancellationToken,
    ) -> ExecutionOutcome {
        if what_if {
            return preview(plan, reporter);
        }

        let mut outcome = ExecutionOutcome::default();
        let mut order: Vec<&str> = Vec::new();
        for project in plan.projects() {
            match targets.iter().find(|target| target.is_named(project)) {
                Some(target) => order.push(&target.name),
                None => {
                    tracing::warn!(project, "plan references a project outside the scope; ignoring")
                }
            }
        }

        for project in order {
            let result = if token.is_cancelled() {
                ProjectResult::Skipped(SkipReason::Cancelled)
            } else {
                self.apply_project(project, &plan.actions_for(project), reporter)
                    .await
            };
            reporter.project_result(project, result.clone());
            outcome.results.push(ProjectOutcome {
                project: project.to_string(),
                result,
            });
        }

        for target in targets {
            if outcome.result_for(&target.name).is_none() {
                let result = ProjectResult::Skipped(SkipReason::NothingToDo);
                reporter.project_result(&target.name, result.clone());
                outcome.results.push(ProjectOutcome {
                    project: target.name.clone(),
                    result,
                });
            }
        }

        tracing::info!(
            applied = outcome.applied(),
            failed = outcome.failed(),
            skipped = outcome.skipped(),
            "execution finished"
        );
        outcome
    }

    async fn apply_project(
        &self,
        project: &str,
        actions: &[ProjectAction],
        reporter: &Reporter,
    ) -> ProjectResult {
        tracing::debug!(project, actions = actions.len(), "applying actions");

        if let Err(err) = self.model.apply(project, actions).await {
            return match err {
                ActionError::SignatureVerification(signature) => {
                    reporter.error(signature.aggregated());
                    ProjectResult::Failed {
                        kind: FailureKind::SignatureVerification,
                        message: signature.message,
                    }
                }
                ActionError::Other(err) => {
                    let message = format!("{:#}", err);
                    reporter.error(format!(
                        "Failed to apply changes to project '{}': {}",
                        project, message
                    ));
                    ProjectResult::Failed {
                        kind: FailureKind::Apply,
                        message,
                    }
                }
            };
        }

        for action in actions {
            reporter.info(format!(
                "Successfully {} '{}' {} {}",
                past_tense(action.kind),
                action.package,
                match action.kind {
                    ActionKind::Uninstall => "from",
                    ActionKind::Install | ActionKind::Update => "to",
                },
                project
            ));
        }

        // Already-applied changes stay in place even if the save fails.
        if let Err(err) = self.model.save(project).await {
            let message = format!("{:#}", err);
            reporter.error(format!("Failed to save project '{}': {}", project, message));
            return ProjectResult::Failed {
                kind: FailureKind::Save,
                message,
            };
        }

        ProjectResult::Applied
    }
}

fn past_tense(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Install => "installed",
        ActionKind::Uninstall => "uninstalled",
        ActionKind::Update => "updated",
    }
}

fn preview(plan: &ActionPlan, reporter: &Reporter) -> ExecutionOutcome {
    let preview: Vec<String> = plan
        .actions
        .iter()
        .map(|action| format!("What if: {}", action))
        .collect();
    if preview.is_empty() {
        reporter.info("What if: no changes would be made");
    }
    for line in &preview {
        reporter.info(line.clone());
    }
    ExecutionOutcome {
        results: Vec::new(),
        preview,
    }
}
