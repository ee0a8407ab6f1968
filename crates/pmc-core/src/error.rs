//! Error taxonomy for console operations.
//!
//! Planning-phase errors abort an operation before anything is mutated.
//! Execution-phase failures are not errors at all: they are recorded per
//! project as [`crate::execute::ProjectResult::Failed`].

use thiserror::Error;

/// A persisted setting could not be understood. Always recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value '{value}' for setting '{key}'; using {fallback}")]
pub struct ConfigurationError {
    pub key: String,
    pub value: String,
    pub fallback: String,
}

/// The package is already present in the target project.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Package '{package}' already exists in project '{project}'")]
pub struct PackageAlreadyInstalledError {
    pub package: String,
    pub project: String,
}

/// Package signature validation failed. Carries every reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", aggregate(.message, .issues))]
pub struct SignatureVerificationError {
    pub message: String,
    pub issues: Vec<String>,
}

impl SignatureVerificationError {
    pub fn new(message: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            message: message.into(),
            issues,
        }
    }

    /// Message and issues folded into a single log entry.
    pub fn aggregated(&self) -> String {
        aggregate(&self.message, &self.issues)
    }
}

fn aggregate(message: &str, issues: &[String]) -> String {
    let mut lines = Vec::with_capacity(issues.len() + 1);
    if !message.is_empty() {
        lines.push(message.to_string());
    }
    lines.extend(issues.iter().map(|issue| format!("  {}", issue)));
    lines.join("\n")
}

/// Failure reported by the action planner.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error(transparent)]
    AlreadyInstalled(#[from] PackageAlreadyInstalledError),

    #[error(transparent)]
    SignatureVerification(#[from] SignatureVerificationError),

    #[error("Unable to find package '{0}'")]
    PackageNotFound(String),

    #[error("Unable to find version '{version}' of package '{package}'")]
    VersionNotFound { package: String, version: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlanningError {
    /// Already-installed is informational, never fatal.
    pub fn is_already_installed(&self) -> bool {
        matches!(self, PlanningError::AlreadyInstalled(_))
    }
}

/// Errors surfaced to the caller of a console operation or the pipeline host.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Project '{0}' is not found")]
    ProjectNotFound(String),

    #[error("No applicable projects found for this operation")]
    NoApplicableProjects,

    #[error("Package id cannot be empty")]
    InvalidPackageId,

    #[error("'{0}' was not installed in any project. Update failed.")]
    PackageNotInstalled(String),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("The host is busy running another command")]
    HostBusy,

    #[error("{0}")]
    InvalidCommand(String),

    #[error("The operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_error_aggregates_issues_into_one_entry() {
        let err = SignatureVerificationError::new(
            "Signed package validation failed",
            vec!["NU3008: hash mismatch".to_string(), "NU3012: revoked".to_string()],
        );
        let text = err.to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("Signed package validation failed"));
        assert!(text.contains("NU3012: revoked"));
    }

    #[test]
    fn already_installed_is_informational() {
        let err = PlanningError::from(PackageAlreadyInstalledError {
            package: "Foo 1.0.0".to_string(),
            project: "Web".to_string(),
        });
        assert!(err.is_already_installed());
        assert!(!PlanningError::PackageNotFound("Foo".to_string()).is_already_installed());
    }
}
