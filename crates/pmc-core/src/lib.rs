//! pmc core library
//!
//! Plans and executes package install, update and reinstall operations
//! across the projects of a solution, and hosts the single interactive
//! console pipeline that runs them.

pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod execute;
pub mod host;
pub mod orchestration;
pub mod planner;
pub mod policy;
pub mod project;
pub mod report;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigScope, ConfigStore, PmcConfig, SettingsSource};
    pub use crate::context::ConsoleContext;

    // Errors
    pub use crate::error::{
        ConfigurationError, ConsoleError, PackageAlreadyInstalledError, PlanningError,
        SignatureVerificationError,
    };

    // Policy and scope
    pub use crate::policy::{OperationRequest, Policy, PolicyFlags, resolve};
    pub use crate::project::{
        ProjectCapabilities, ProjectModel, ProjectTarget, ScopeSelection, SolutionFile,
        select_scope,
    };

    // Planning and execution
    pub use crate::execute::{ActionExecutor, ExecutionOutcome, ProjectResult, SkipReason};
    pub use crate::orchestration::{OperationHandle, PackageConsole};
    pub use crate::planner::{ActionPlan, ActionPlanner, FeedPlanner, PackageFeed, PlannerAdapter};
    pub use crate::report::{Message, MessageLevel, ReportReceiver, Reporter};

    // Console
    pub use crate::commands::{CommandName, ConsoleCommand, PackageOptions};
    pub use crate::host::{ConsoleOutput, LineStyle, PipelineHost, PipelineState};

    // Types
    pub use crate::types::{
        DependencyBehavior, FileConflictAction, OperationKind, PackageIdentity,
        VersionConstraint, VersionConstraints,
    };
}
