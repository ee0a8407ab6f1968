//! pmc - Package Manager Console
//!
//! Usage:
//!   pmc                  # Interactive console (default)
//!   pmc install Foo      # One-shot install
//!   pmc update [Foo]     # One-shot update
//!   pmc reinstall        # Reinstall everything in place
//!   pmc config dependencyVersion HighestMinor

mod interactive;

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmc_core::commands::PackageOptions;
use pmc_core::config::{ConfigScope, DEPENDENCY_VERSION_KEY, SettingsSource};
use pmc_core::context::ConsoleContext;
use pmc_core::execute::{ExecutionOutcome, ProjectResult, SkipReason};
use pmc_core::orchestration::PackageConsole;
use pmc_core::policy::PolicyFlags;
use pmc_core::report::{Message, MessageLevel};
use pmc_core::types::{DependencyBehavior, FileConflictAction, parse_version};

use crate::interactive::InteractiveConsole;

#[derive(Parser)]
#[command(name = "pmc")]
#[command(about = "Package Manager Console", long_about = None)]
struct Cli {
    /// Solution manifest (defaults to the configured one, then ./solution.toml)
    #[arg(long, global = true)]
    solution: Option<String>,

    /// Package feed (defaults to the configured one, then ./feed.toml)
    #[arg(long, global = true)]
    feed: Option<String>,

    /// Configuration file replacing ./pmc.toml
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive console
    Console,

    /// Install a package into one or all projects
    Install(InstallArgs),

    /// Update one package, or every package when no id is given
    Update(UpdateArgs),

    /// Reinstall packages at their current versions
    Reinstall(ReinstallArgs),

    /// Read or change a persisted setting
    Config(ConfigArgs),
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable lines
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct CommonArgs {
    /// Target project (default: all projects)
    #[arg(long, short)]
    project: Option<String>,
    /// Show what would happen without changing anything
    #[arg(long)]
    what_if: bool,
    /// Allow prerelease versions
    #[arg(long)]
    prerelease: bool,
    /// Do not install dependencies
    #[arg(long)]
    ignore_dependencies: bool,
    /// Dependency version selection (Lowest, Highest, HighestMinor, HighestPatch, Ignore)
    #[arg(long, value_parser = parse_dependency_behavior)]
    dependency_version: Option<DependencyBehavior>,
    /// Action on file conflicts (Overwrite, Ignore, OverwriteAll, IgnoreAll, Fail)
    #[arg(long, value_parser = parse_conflict_action)]
    file_conflict_action: Option<FileConflictAction>,
    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

impl CommonArgs {
    fn flags(&self) -> PolicyFlags {
        PolicyFlags {
            ignore_dependencies: self.ignore_dependencies,
            dependency_version: self.dependency_version,
            include_prerelease: self.prerelease,
            conflict_action: self.file_conflict_action,
            ..PolicyFlags::default()
        }
    }

    fn apply(&self, mut options: PackageOptions) -> PackageOptions {
        if let Some(project) = &self.project {
            options = options.with_project(project);
        }
        options.with_what_if(self.what_if)
    }
}

#[derive(Args)]
struct InstallArgs {
    /// Package id
    id: String,
    /// Exact version to install
    #[arg(long, short)]
    version: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct UpdateArgs {
    /// Package id (default: every installed package)
    id: Option<String>,
    /// Exact version to update to (requires an id)
    #[arg(long, short, requires = "id")]
    version: Option<String>,
    /// Stay within the installed major and minor version
    #[arg(long, alias = "to-highest-patch")]
    safe: bool,
    /// Stay within the installed major version
    #[arg(long)]
    to_highest_minor: bool,
    /// Reinstall at the installed version instead of updating
    #[arg(long)]
    reinstall: bool,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct ReinstallArgs {
    /// Package id (default: every installed package)
    id: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct ConfigArgs {
    /// Setting name, e.g. dependencyVersion
    key: String,
    /// New value; omit to print the current one
    value: Option<String>,
    /// Use the global configuration instead of the solution's
    #[arg(long)]
    global: bool,
    /// Remove the setting
    #[arg(long, conflicts_with = "value")]
    unset: bool,
}

fn parse_dependency_behavior(value: &str) -> Result<DependencyBehavior, String> {
    value.parse()
}

fn parse_conflict_action(value: &str) -> Result<FileConflictAction, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmc=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let context = Arc::new(build_context(&cli)?);

    let (options, format) = match cli.command {
        None | Some(Commands::Console) => return InteractiveConsole::new(context)?.run().await,
        Some(Commands::Config(args)) => return run_config(&context, &args),
        Some(command) => package_options(command)?,
    };

    let console = context.build_console()?;
    let mut success = true;
    for request in options.requests(&[])? {
        success &= run_operation(&console, request, options.flags.clone(), format).await?;
    }
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn build_context(cli: &Cli) -> Result<ConsoleContext> {
    let mut context = ConsoleContext::with_defaults()?;
    if let Some(path) = &cli.config {
        context = context.with_config_file(path);
    }
    if let Some(path) = &cli.solution {
        context = context.with_solution(path);
    }
    if let Some(path) = &cli.feed {
        context = context.with_feed(path);
    }
    Ok(context)
}

/// Options for a one-shot package command.
fn package_options(command: Commands) -> Result<(PackageOptions, OutputFormat)> {
    let options = match command {
        Commands::Console | Commands::Config(_) => {
            anyhow::bail!("Not a package command")
        }
        Commands::Install(args) => {
            let mut options = PackageOptions::install(&args.id).with_flags(args.common.flags());
            if let Some(version) = &args.version {
                options = options.with_version(parse_version(version)?);
            }
            (args.common.apply(options), args.common.format)
        }
        Commands::Update(args) => {
            let mut options = if args.reinstall {
                PackageOptions::reinstall(args.id.clone())
            } else {
                PackageOptions::update(args.id.clone())
            };
            if let Some(version) = &args.version {
                options = options.with_version(parse_version(version)?);
            }
            let flags = PolicyFlags {
                safe: args.safe,
                to_highest_minor: args.to_highest_minor,
                ..args.common.flags()
            };
            (args.common.apply(options.with_flags(flags)), args.common.format)
        }
        Commands::Reinstall(args) => {
            let options =
                PackageOptions::reinstall(args.id.clone()).with_flags(args.common.flags());
            (args.common.apply(options), args.common.format)
        }
    };
    Ok(options)
}

fn run_config(context: &ConsoleContext, args: &ConfigArgs) -> Result<()> {
    let scope = if args.global {
        ConfigScope::Global
    } else {
        ConfigScope::Solution
    };
    let store = context.config_store(scope);
    let mut config = store.load()?;

    if let Some(value) = &args.value {
        if args.key.eq_ignore_ascii_case(DEPENDENCY_VERSION_KEY) {
            value
                .parse::<DependencyBehavior>()
                .map_err(anyhow::Error::msg)?;
        }
        config.set(&args.key, value.clone());
        store.save(&config)?;
        println!("{} {} = {}", style("✓").green(), args.key, value);
        return Ok(());
    }

    if args.unset {
        if config.remove(&args.key) {
            store.save(&config)?;
            println!("{} Removed {}", style("✓").green(), args.key);
        } else {
            println!("{} is not set", args.key);
        }
        return Ok(());
    }

    let value = if args.global {
        config.get(&args.key)
    } else {
        context.merged_config()?.get(&args.key)
    };
    match value {
        Some(value) => println!("{}", value),
        None => println!("{} is not set", style(&args.key).dim()),
    }
    Ok(())
}

/// Run one operation in the background, printing its messages as they arrive.
async fn run_operation(
    console: &PackageConsole,
    request: pmc_core::policy::OperationRequest,
    flags: PolicyFlags,
    format: OutputFormat,
) -> Result<bool> {
    let token = CancellationToken::new();
    let (mut receiver, handle) = console.start_with_token(request, flags, token.clone());

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", style("Stopping...").yellow());
            token.cancel();
        }
    });

    let mut messages = Vec::new();
    while let Some(message) = receiver.recv().await {
        if let OutputFormat::Table = format {
            print_message(&message);
        }
        messages.push(message);
    }
    ctrl_c.abort();

    let result = handle.wait().await;
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    }

    match result {
        Ok(outcome) => Ok(outcome.is_success()),
        Err(err) => {
            tracing::debug!(error = %err, "operation failed");
            Ok(false)
        }
    }
}

fn print_message(message: &Message) {
    match message {
        Message::Log(entry) => match entry.level {
            MessageLevel::Error => eprintln!("{}", style(&entry.text).red()),
            MessageLevel::Warning => println!("{}", style(&entry.text).yellow()),
            MessageLevel::Debug => println!("{}", style(&entry.text).dim()),
            MessageLevel::Info => println!("{}", entry.text),
        },
        Message::ProjectResult { project, result } => {
            println!("  {} {}", result_symbol(result), project);
        }
        Message::Completed { outcome } => {
            if let Some(outcome) = outcome {
                print_summary(outcome);
            }
        }
    }
}

fn result_symbol(result: &ProjectResult) -> console::StyledObject<&'static str> {
    match result {
        ProjectResult::Applied => style("✓").green(),
        ProjectResult::Skipped(SkipReason::NothingToDo) => style("-").dim(),
        ProjectResult::Skipped(SkipReason::Cancelled) => style("○").yellow(),
        ProjectResult::Failed { .. } => style("✗").red(),
    }
}

fn print_summary(outcome: &ExecutionOutcome) {
    if outcome.results.is_empty() {
        return;
    }
    println!();
    println!(
        "Summary: {} applied, {} failed, {} skipped",
        outcome.applied(),
        outcome.failed(),
        outcome.skipped()
    );
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn no_subcommand_starts_console() {
        let cli = Cli::try_parse_from(["pmc"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn install_with_version_and_project_parses() {
        let cli = Cli::try_parse_from([
            "pmc",
            "install",
            "Newtonsoft.Json",
            "--version",
            "13.0.1",
            "--project",
            "Web",
            "--what-if",
        ])
        .unwrap();
        let Some(Commands::Install(args)) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.id, "Newtonsoft.Json");
        assert_eq!(args.version.as_deref(), Some("13.0.1"));
        assert!(args.common.what_if);
    }

    #[test]
    fn update_accepts_to_highest_patch_alias() {
        let cli = Cli::try_parse_from(["pmc", "update", "--to-highest-patch"]).unwrap();
        let Some(Commands::Update(args)) = cli.command else {
            panic!("expected update");
        };
        assert!(args.safe);
        assert!(args.id.is_none());
    }

    #[test]
    fn update_version_requires_id() {
        assert!(Cli::try_parse_from(["pmc", "update", "--version", "1.0.0"]).is_err());
    }

    #[test]
    fn dependency_version_is_validated() {
        assert!(
            Cli::try_parse_from(["pmc", "install", "Foo", "--dependency-version", "highest"])
                .is_ok()
        );
        assert!(
            Cli::try_parse_from(["pmc", "install", "Foo", "--dependency-version", "newest"])
                .is_err()
        );
    }

    #[test]
    fn config_unset_conflicts_with_value() {
        let cli = Cli::try_parse_from(["pmc", "config", "dependencyVersion", "--global"]).unwrap();
        let Some(Commands::Config(args)) = cli.command else {
            panic!("expected config");
        };
        assert!(args.global);
        assert!(args.value.is_none());
        assert!(
            Cli::try_parse_from(["pmc", "config", "dependencyVersion", "Lowest", "--unset"])
                .is_err()
        );
    }

    #[test]
    fn global_paths_parse_after_subcommand() {
        let cli =
            Cli::try_parse_from(["pmc", "reinstall", "--solution", "app.toml", "-o", "json"])
                .unwrap();
        assert_eq!(cli.solution.as_deref(), Some("app.toml"));
    }
}
