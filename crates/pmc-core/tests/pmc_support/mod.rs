//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use semver::Version;
use tokio_util::sync::CancellationToken;

use pmc_core::error::{PackageAlreadyInstalledError, PlanningError, SignatureVerificationError};
use pmc_core::host::{ConsoleOutput, LineStyle};
use pmc_core::planner::{ActionKind, ActionPlan, ActionPlanner, PlanRequest, ProjectAction};
use pmc_core::policy::Policy;
use pmc_core::project::{ActionError, ProjectCapabilities, ProjectModel, ProjectTarget};
use pmc_core::report::{Message, MessageLevel};
use pmc_core::types::PackageIdentity;

pub fn target(name: &str, supports_reinstall: bool) -> ProjectTarget {
    ProjectTarget::new(
        name,
        ProjectCapabilities {
            supports_reinstall,
            supports_package_reference: !supports_reinstall,
        },
    )
}

pub fn package(id: &str, version: &str) -> PackageIdentity {
    PackageIdentity::new(id, Version::parse(version).unwrap())
}

/// One install action of `id` per project, in the given order.
pub fn install_plan(projects: &[&str], id: &str) -> ActionPlan {
    ActionPlan::new(
        projects
            .iter()
            .map(|project| ProjectAction::new(*project, ActionKind::Install, package(id, "1.0.0")))
            .collect(),
    )
}

/// In-memory project model that records calls and fails on request.
#[derive(Default)]
pub struct FakeModel {
    projects: Vec<ProjectTarget>,
    installed: Mutex<HashMap<String, Vec<PackageIdentity>>>,
    fail_apply: HashSet<String>,
    fail_save: HashSet<String>,
    fail_signature: HashSet<String>,
    cancel_after: Option<(String, CancellationToken)>,
    applied: Mutex<Vec<String>>,
    saved: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn new(projects: &[(&str, bool)]) -> Self {
        Self {
            projects: projects
                .iter()
                .map(|(name, reinstall)| target(name, *reinstall))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_installed(self, project: &str, id: &str, version: &str) -> Self {
        self.installed
            .lock()
            .unwrap()
            .entry(project.to_string())
            .or_default()
            .push(package(id, version));
        self
    }

    pub fn failing_apply(mut self, project: &str) -> Self {
        self.fail_apply.insert(project.to_string());
        self
    }

    pub fn failing_save(mut self, project: &str) -> Self {
        self.fail_save.insert(project.to_string());
        self
    }

    pub fn failing_signature(mut self, project: &str) -> Self {
        self.fail_signature.insert(project.to_string());
        self
    }

    /// Cancel `token` right after `project` has been applied.
    pub fn cancel_after(mut self, project: &str, token: CancellationToken) -> Self {
        self.cancel_after = Some((project.to_string(), token));
        self
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectModel for FakeModel {
    async fn projects(&self) -> anyhow::Result<Vec<ProjectTarget>> {
        Ok(self.projects.clone())
    }

    async fn installed_packages(&self, project: &str) -> anyhow::Result<Vec<PackageIdentity>> {
        Ok(self
            .installed
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply(&self, project: &str, _actions: &[ProjectAction]) -> Result<(), ActionError> {
        if self.fail_signature.contains(project) {
            return Err(SignatureVerificationError::new(
                "Signed package validation failed",
                vec![
                    "NU3008: The package integrity check failed.".to_string(),
                    "NU3018: The author primary signature found a chain building issue."
                        .to_string(),
                ],
            )
            .into());
        }
        if self.fail_apply.contains(project) {
            return Err(anyhow::anyhow!("disk full").into());
        }
        self.applied.lock().unwrap().push(project.to_string());
        if let Some((name, token)) = &self.cancel_after
            && name == project
        {
            token.cancel();
        }
        Ok(())
    }

    async fn save(&self, project: &str) -> anyhow::Result<()> {
        if self.fail_save.contains(project) {
            anyhow::bail!("project file is read-only");
        }
        self.saved.lock().unwrap().push(project.to_string());
        Ok(())
    }
}

pub enum Script {
    Plan(ActionPlan),
    AlreadyInstalled,
    Signature,
}

/// Planner returning a canned answer and remembering what it was asked.
pub struct ScriptedPlanner {
    script: Script,
    calls: AtomicUsize,
    last_policy: Mutex<Option<Policy>>,
    last_targets: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_policy: Mutex::new(None),
            last_targets: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_policy(&self) -> Option<Policy> {
        self.last_policy.lock().unwrap().clone()
    }

    pub fn last_targets(&self) -> Vec<String> {
        self.last_targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionPlanner for ScriptedPlanner {
    async fn plan(
        &self,
        request: PlanRequest<'_>,
        _token: &CancellationToken,
    ) -> Result<ActionPlan, PlanningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_policy.lock().unwrap() = Some(request.policy.clone());
        *self.last_targets.lock().unwrap() = request
            .targets
            .iter()
            .map(|target| target.name.clone())
            .collect();

        match &self.script {
            Script::Plan(plan) => Ok(plan.clone()),
            Script::AlreadyInstalled => Err(PackageAlreadyInstalledError {
                package: "Foo 1.0.0".to_string(),
                project: request
                    .targets
                    .first()
                    .map(|target| target.name.clone())
                    .unwrap_or_default(),
            }
            .into()),
            Script::Signature => Err(SignatureVerificationError::new(
                "Package signature validation failed",
                vec!["NU3004: The package is not signed.".to_string()],
            )
            .into()),
        }
    }
}

/// Console output that keeps every line.
#[derive(Default)]
pub struct RecordingOutput {
    lines: Mutex<Vec<(LineStyle, String)>>,
}

impl RecordingOutput {
    pub fn lines(&self) -> Vec<(LineStyle, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(style, _)| *style == LineStyle::Error)
            .map(|(_, text)| text)
            .collect()
    }
}

impl ConsoleOutput for RecordingOutput {
    fn write_line(&self, text: &str, style: LineStyle) {
        self.lines.lock().unwrap().push((style, text.to_string()));
    }
}

pub fn completion_count(messages: &[Message]) -> usize {
    messages.iter().filter(|message| message.is_completion()).count()
}

pub fn log_texts(messages: &[Message], level: MessageLevel) -> Vec<String> {
    messages
        .iter()
        .filter_map(|message| match message {
            Message::Log(entry) if entry.level == level => Some(entry.text.clone()),
            _ => None,
        })
        .collect()
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
