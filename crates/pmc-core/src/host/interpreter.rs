//! Built-in interpreter for the console command language.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::commands::{ConsoleCommand, PackageCommand, parse_command};
use crate::error::{ConsoleError, Result};
use crate::execute::{ExecutionOutcome, ProjectResult, SkipReason};
use crate::orchestration::PackageConsole;
use crate::policy::{OperationRequest, PolicyFlags};
use crate::report::Message;

use super::{
    CommandCompleter, ConsoleOutput, Interpreter, InterpreterFactory, Invocation, LineStyle,
    TabCompleter,
};

pub struct CommandInterpreter {
    console: PackageConsole,
    output: Arc<dyn ConsoleOutput>,
    completer: Arc<CommandCompleter>,
}

impl CommandInterpreter {
    pub fn new(console: PackageConsole, output: Arc<dyn ConsoleOutput>) -> Self {
        let completer = Arc::new(CommandCompleter::new(console.clone()));
        Self {
            console,
            output,
            completer,
        }
    }

    async fn run_package_command(
        &self,
        command: &PackageCommand,
        input: &[String],
        token: &CancellationToken,
    ) -> Result<Invocation> {
        let mut status = Invocation::Succeeded;
        for request in command.options.requests(input)? {
            if token.is_cancelled() {
                return Err(ConsoleError::Cancelled);
            }
            if !self
                .run_operation(request, command.options.flags.clone(), token)
                .await
            {
                status = Invocation::Failed;
            }
        }
        Ok(status)
    }

    /// Start the operation in the background and drain its messages here
    /// until the completion marker. Returns false if it failed.
    async fn run_operation(
        &self,
        request: OperationRequest,
        flags: PolicyFlags,
        token: &CancellationToken,
    ) -> bool {
        let (mut receiver, handle) =
            self.console
                .start_with_token(request, flags, token.child_token());

        while let Some(message) = receiver.recv().await {
            self.render(&message);
        }

        match handle.wait().await {
            Ok(outcome) => outcome.is_success(),
            // Already rendered from the message stream.
            Err(err) => {
                tracing::debug!(error = %err, "operation failed");
                false
            }
        }
    }

    fn render(&self, message: &Message) {
        match message {
            Message::Log(entry) => self.output.write_line(&entry.text, entry.level.into()),
            Message::ProjectResult { project, result } => match result {
                ProjectResult::Skipped(SkipReason::Cancelled) => self.output.write_line(
                    &format!("Skipped project '{}': the operation was stopped", project),
                    LineStyle::Warning,
                ),
                ProjectResult::Skipped(SkipReason::NothingToDo) => self.output.write_line(
                    &format!("No changes for project '{}'", project),
                    LineStyle::Verbose,
                ),
                ProjectResult::Applied | ProjectResult::Failed { .. } => {}
            },
            Message::Completed {
                outcome: Some(outcome),
            } => self.render_summary(outcome),
            Message::Completed { outcome: None } => {}
        }
    }

    fn render_summary(&self, outcome: &ExecutionOutcome) {
        let failed = outcome.failed();
        if failed > 0 {
            self.output.write_line(
                &format!(
                    "{} of {} projects failed",
                    failed,
                    outcome.results.len()
                ),
                LineStyle::Error,
            );
        }
    }

    async fn list_projects(&self) -> Result<Invocation> {
        for project in self.console.projects().await? {
            let style = if project.capabilities.supports_package_reference {
                "PackageReference"
            } else {
                "packages.config"
            };
            self.output
                .write_line(&format!("{:<30} {}", project.name, style), LineStyle::Normal);
        }
        Ok(Invocation::Succeeded)
    }

    async fn list_packages(&self, project: Option<&str>) -> Result<Invocation> {
        let projects = self.console.projects().await?;
        let selected: Vec<_> = match project {
            Some(name) => vec![
                projects
                    .into_iter()
                    .find(|target| target.is_named(name))
                    .ok_or_else(|| ConsoleError::ProjectNotFound(name.to_string()))?,
            ],
            None => projects,
        };

        let mut any = false;
        for target in selected {
            for package in self.console.model().installed_packages(&target.name).await? {
                any = true;
                self.output.write_line(
                    &format!("{:<40} {:<16} {}", package.id, package.version, target.name),
                    LineStyle::Normal,
                );
            }
        }
        if !any {
            self.output
                .write_line("No packages installed.", LineStyle::Normal);
        }
        Ok(Invocation::Succeeded)
    }
}

#[async_trait]
impl Interpreter for CommandInterpreter {
    async fn invoke(
        &mut self,
        command: &str,
        input: &[String],
        token: &CancellationToken,
    ) -> Result<Invocation> {
        if command.trim().is_empty() {
            return Ok(Invocation::Succeeded);
        }
        match parse_command(command)? {
            ConsoleCommand::Package(package) => {
                self.run_package_command(&package, input, token).await
            }
            // `-All` is the default; the switch exists for familiarity.
            ConsoleCommand::GetProject { all: _ } => self.list_projects().await,
            ConsoleCommand::GetPackage { project } => self.list_packages(project.as_deref()).await,
        }
    }

    fn completer(&self) -> Arc<dyn TabCompleter> {
        self.completer.clone()
    }
}

/// Creates a [`CommandInterpreter`] over a prepared console.
pub struct CommandInterpreterFactory {
    build: Box<dyn Fn() -> anyhow::Result<PackageConsole> + Send + Sync>,
}

impl CommandInterpreterFactory {
    /// `build` runs once, on first use of the host.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> anyhow::Result<PackageConsole> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
        }
    }

    pub fn from_console(console: PackageConsole) -> Self {
        Self::new(move || Ok(console.clone()))
    }
}

#[async_trait]
impl InterpreterFactory for CommandInterpreterFactory {
    async fn create(&self, output: Arc<dyn ConsoleOutput>) -> anyhow::Result<Box<dyn Interpreter>> {
        let console = (self.build)()?;
        Ok(Box::new(CommandInterpreter::new(console, output)))
    }
}
