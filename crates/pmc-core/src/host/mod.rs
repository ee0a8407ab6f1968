//! Scripting pipeline host.
//!
//! Owns the console interpreter and runs at most one pipeline at a time.
//! A second `execute` while one is running fails fast with
//! [`ConsoleError::HostBusy`]; it never queues. Tab completion runs beside
//! the pipeline and never touches the interpreter.
//!
//! [`ConsoleOutput`] is the host-level reporter: pipeline failure reasons
//! are written there, while package operations report through
//! [`crate::report::Reporter`] and the interpreter renders that stream.

pub mod completion;
pub mod interpreter;

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::error::{ConsoleError, Result};
use crate::report::MessageLevel;

pub use completion::{CommandCompleter, TabCompleter};
pub use interpreter::{CommandInterpreter, CommandInterpreterFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Stopped | PipelineState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Normal,
    Verbose,
    Warning,
    Error,
}

impl From<MessageLevel> for LineStyle {
    fn from(level: MessageLevel) -> Self {
        match level {
            MessageLevel::Debug => LineStyle::Verbose,
            MessageLevel::Info => LineStyle::Normal,
            MessageLevel::Warning => LineStyle::Warning,
            MessageLevel::Error => LineStyle::Error,
        }
    }
}

/// The scripting console the host and interpreter write to.
pub trait ConsoleOutput: Send + Sync {
    fn write_line(&self, text: &str, style: LineStyle);
}

/// How an invocation ended when it did not return an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Succeeded,
    /// Failed, and the interpreter already wrote the reason.
    Failed,
}

#[async_trait]
pub trait Interpreter: Send {
    async fn invoke(
        &mut self,
        command: &str,
        input: &[String],
        token: &CancellationToken,
    ) -> Result<Invocation>;

    /// Completion source that may run while `invoke` is in flight.
    fn completer(&self) -> Arc<dyn TabCompleter>;
}

/// Builds the interpreter on first use.
#[async_trait]
pub trait InterpreterFactory: Send + Sync {
    async fn create(&self, output: Arc<dyn ConsoleOutput>) -> anyhow::Result<Box<dyn Interpreter>>;
}

struct Session {
    interpreter: Mutex<Box<dyn Interpreter>>,
    completer: Arc<dyn TabCompleter>,
}

#[derive(Default)]
struct HostState {
    pipeline: Option<CancellationToken>,
    last_terminal: Option<PipelineState>,
    completion: Option<(u64, CancellationToken)>,
    completion_generation: u64,
}

pub struct PipelineHost {
    factory: Arc<dyn InterpreterFactory>,
    output: Arc<dyn ConsoleOutput>,
    session: OnceCell<Session>,
    state: StdMutex<HostState>,
}

/// Returns the host to Idle when the pipeline ends, however it ends.
struct RunningGuard<'a> {
    host: &'a PipelineHost,
    terminal: PipelineState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.host.lock_state();
        state.pipeline = None;
        state.last_terminal = Some(self.terminal);
        tracing::debug!(state = ?self.terminal, "pipeline finished");
    }
}

impl PipelineHost {
    pub fn new(factory: Arc<dyn InterpreterFactory>, output: Arc<dyn ConsoleOutput>) -> Self {
        Self {
            factory,
            output,
            session: OnceCell::new(),
            state: StdMutex::new(HostState::default()),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PipelineState {
        if self.lock_state().pipeline.is_some() {
            PipelineState::Running
        } else {
            PipelineState::Idle
        }
    }

    /// Terminal state of the most recent pipeline.
    pub fn last_terminal_state(&self) -> Option<PipelineState> {
        self.lock_state().last_terminal
    }

    pub fn is_initialized(&self) -> bool {
        self.session.initialized()
    }

    /// Build the interpreter now instead of on the first command.
    pub async fn initialize(&self) -> Result<()> {
        self.session().await.map(|_| ())
    }

    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| async {
                tracing::debug!("initializing console interpreter");
                let interpreter = self.factory.create(self.output.clone()).await?;
                let completer = interpreter.completer();
                Ok::<_, ConsoleError>(Session {
                    interpreter: Mutex::new(interpreter),
                    completer,
                })
            })
            .await
    }

    /// Run one command line. Returns the pipeline's terminal state, or
    /// `HostBusy` if another pipeline is running.
    pub async fn execute(&self, command: &str, input: &[String]) -> Result<PipelineState> {
        let token = {
            let mut state = self.lock_state();
            if state.pipeline.is_some() {
                return Err(ConsoleError::HostBusy);
            }
            let token = CancellationToken::new();
            state.pipeline = Some(token.clone());
            token
        };
        let mut guard = RunningGuard {
            host: self,
            terminal: PipelineState::Failed,
        };

        guard.terminal = self.run_pipeline(command, input, &token).await;
        Ok(guard.terminal)
    }

    async fn run_pipeline(
        &self,
        command: &str,
        input: &[String],
        token: &CancellationToken,
    ) -> PipelineState {
        if token.is_cancelled() {
            return PipelineState::Stopped;
        }
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => {
                self.output.write_line(
                    &format!("Failed to initialize the console: {:#}", err),
                    LineStyle::Error,
                );
                return PipelineState::Failed;
            }
        };
        if token.is_cancelled() {
            return PipelineState::Stopped;
        }

        let mut interpreter = session.interpreter.lock().await;
        match interpreter.invoke(command, input, token).await {
            Ok(_) if token.is_cancelled() => PipelineState::Stopped,
            Ok(Invocation::Succeeded) => PipelineState::Completed,
            Ok(Invocation::Failed) => PipelineState::Failed,
            Err(ConsoleError::Cancelled) => PipelineState::Stopped,
            Err(err) => {
                self.output.write_line(&format!("{:#}", err), LineStyle::Error);
                PipelineState::Failed
            }
        }
    }

    /// Cancel the running pipeline, if any.
    pub fn stop(&self) {
        if let Some(token) = &self.lock_state().pipeline {
            tracing::debug!("stopping pipeline");
            token.cancel();
        }
    }

    /// Completions for `last_word` at the end of `line`. Supersedes any
    /// completion still in flight. Never fails: cancellation and errors
    /// both give an empty list.
    pub async fn complete_tab_expansion(
        &self,
        line: &str,
        last_word: &str,
        token: &CancellationToken,
    ) -> Vec<String> {
        let (generation, superseded) = {
            let mut state = self.lock_state();
            if let Some((_, previous)) = state.completion.take() {
                previous.cancel();
            }
            state.completion_generation += 1;
            let mine = CancellationToken::new();
            state.completion = Some((state.completion_generation, mine.clone()));
            (state.completion_generation, mine)
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Ok(Vec::new()),
            _ = superseded.cancelled() => Ok(Vec::new()),
            result = self.expand(line, last_word) => result,
        };

        {
            let mut state = self.lock_state();
            if state
                .completion
                .as_ref()
                .is_some_and(|(current, _)| *current == generation)
            {
                state.completion = None;
            }
        }

        result.unwrap_or_else(|err| {
            tracing::error!(error = %err, line, "tab expansion failed");
            Vec::new()
        })
    }

    async fn expand(&self, line: &str, last_word: &str) -> Result<Vec<String>> {
        let session = self.session().await?;
        session.completer.complete(line, last_word).await
    }
}
