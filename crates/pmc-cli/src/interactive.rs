//! Interactive console session.
//!
//! Reads command lines with dialoguer and hands them to the pipeline host.
//! Ctrl-C stops the running pipeline; `exit` leaves the console.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use dialoguer::{Completion, Input, theme::ColorfulTheme};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use pmc_core::context::ConsoleContext;
use pmc_core::host::{
    CommandInterpreterFactory, ConsoleOutput, LineStyle, PipelineHost, PipelineState,
};

const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

/// Writes console lines to the terminal with per-style colors.
#[derive(Debug, Default)]
pub struct TerminalOutput;

impl ConsoleOutput for TerminalOutput {
    fn write_line(&self, text: &str, style_kind: LineStyle) {
        match style_kind {
            LineStyle::Normal => println!("{}", text),
            LineStyle::Verbose => println!("{}", style(text).dim()),
            LineStyle::Warning => println!("{}", style(text).yellow()),
            LineStyle::Error => eprintln!("{}", style(text).red()),
        }
    }
}

/// Bridges dialoguer's synchronous completion hook to the host.
struct HostCompletion {
    host: Arc<PipelineHost>,
    runtime: Handle,
}

impl Completion for HostCompletion {
    fn get(&self, input: &str) -> Option<String> {
        let last_word = input
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default();
        let results = self.runtime.block_on(self.host.complete_tab_expansion(
            input,
            last_word,
            &CancellationToken::new(),
        ));
        let completed = common_prefix(&results)?;
        if completed.len() <= last_word.len() {
            return None;
        }
        let head = &input[..input.len() - last_word.len()];
        Some(format!("{}{}", head, completed))
    }
}

/// Longest prefix shared by every candidate, ignoring ASCII case.
fn common_prefix(candidates: &[String]) -> Option<String> {
    let (first, rest) = candidates.split_first()?;
    let mut len = first.len();
    for candidate in rest {
        len = first
            .char_indices()
            .zip(candidate.chars())
            .take_while(|((_, a), b)| a.eq_ignore_ascii_case(b))
            .last()
            .map(|((idx, ch), _)| idx + ch.len_utf8())
            .unwrap_or(0)
            .min(len);
    }
    Some(first[..len].to_string())
}

pub struct InteractiveConsole {
    host: Arc<PipelineHost>,
    prompt: String,
}

impl InteractiveConsole {
    pub fn new(context: Arc<ConsoleContext>) -> Result<Self> {
        let prompt = context.merged_config()?.prompt().to_string();
        let factory_context = context.clone();
        let factory = CommandInterpreterFactory::new(move || factory_context.build_console());
        let host = PipelineHost::new(Arc::new(factory), Arc::new(TerminalOutput));
        Ok(Self {
            host: Arc::new(host),
            prompt,
        })
    }

    pub async fn run(self) -> Result<()> {
        println!(
            "{}",
            style("Package Manager Console. Type 'exit' to quit.").bold()
        );

        let stopper = self.host.clone();
        let ctrl_c = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                stopper.stop();
            }
        });

        loop {
            let Some(line) = self.read_line().await? else {
                break;
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if EXIT_COMMANDS.iter().any(|cmd| cmd.eq_ignore_ascii_case(&line)) {
                break;
            }

            match self.host.execute(&line, &[]).await {
                Ok(PipelineState::Stopped) => {
                    println!("{}", style("Stopped.").yellow());
                }
                Ok(state) => tracing::debug!(?state, "pipeline finished"),
                Err(err) => eprintln!("{}", style(err).red()),
            }
        }

        ctrl_c.abort();
        Ok(())
    }

    /// Prompt on a blocking thread so completion can reach the runtime.
    async fn read_line(&self) -> Result<Option<String>> {
        let host = self.host.clone();
        let prompt = self.prompt.clone();
        let runtime = Handle::current();

        let result = tokio::task::spawn_blocking(move || {
            let completion = HostCompletion { host, runtime };
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .allow_empty(true)
                .completion_with(&completion)
                .interact_text()
        })
        .await?;

        match result {
            Ok(line) => Ok(Some(line)),
            Err(dialoguer::Error::IO(err)) if err.kind() == std::io::ErrorKind::Interrupted => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
