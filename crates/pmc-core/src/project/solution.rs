//! File-backed project model.
//!
//! A solution manifest lists projects and their installed packages:
//!
//! ```toml
//! [[project]]
//! name = "Web"
//! style = "packages-config"
//!
//! [[project.package]]
//! id = "Newtonsoft.Json"
//! version = "12.0.1"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::parser::enhance_toml_error;
use crate::planner::{ActionKind, ProjectAction};
use crate::types::PackageIdentity;

use super::{ActionError, ProjectCapabilities, ProjectModel, ProjectTarget};

/// How a project records its package references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PackageStyle {
    #[default]
    PackagesConfig,
    PackageReference,
}

impl PackageStyle {
    fn capabilities(self) -> ProjectCapabilities {
        match self {
            PackageStyle::PackagesConfig => ProjectCapabilities {
                supports_reinstall: true,
                supports_package_reference: false,
            },
            PackageStyle::PackageReference => ProjectCapabilities {
                supports_reinstall: false,
                supports_package_reference: true,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolutionManifest {
    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    #[serde(default)]
    pub style: PackageStyle,
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageIdentity>,
}

/// Solution manifest loaded into memory; `save` writes it back.
#[derive(Debug)]
pub struct SolutionFile {
    path: PathBuf,
    manifest: Mutex<SolutionManifest>,
}

impl SolutionFile {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read solution file: {}", path.display()))?;
        let manifest: SolutionManifest = toml::from_str(&content)
            .map_err(|e| enhance_toml_error(e, &content))
            .with_context(|| format!("Failed to parse solution file: {}", path.display()))?;
        Ok(Self::from_manifest(path, manifest))
    }

    pub fn from_manifest(path: impl Into<PathBuf>, manifest: SolutionManifest) -> Self {
        Self {
            path: path.into(),
            manifest: Mutex::new(manifest),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_manifest(&self, manifest: &SolutionManifest) -> anyhow::Result<()> {
        let content =
            toml::to_string_pretty(manifest).context("Failed to serialize solution manifest")?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create solution directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write solution file: {}", self.path.display()))
    }
}

fn find_project<'a>(
    manifest: &'a mut SolutionManifest,
    name: &str,
) -> anyhow::Result<&'a mut ProjectEntry> {
    manifest
        .projects
        .iter_mut()
        .find(|project| project.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow::anyhow!("Project '{}' is not part of the solution", name))
}

fn apply_action(project: &mut ProjectEntry, action: &ProjectAction) -> anyhow::Result<()> {
    let position = project
        .packages
        .iter()
        .position(|installed| installed.matches_id(&action.package.id));

    match (action.kind, position) {
        (ActionKind::Install, Some(idx)) | (ActionKind::Update, Some(idx)) => {
            project.packages[idx] = action.package.clone();
        }
        (ActionKind::Install, None) => project.packages.push(action.package.clone()),
        (ActionKind::Update, None) => anyhow::bail!(
            "Cannot update '{}': it is not installed in '{}'",
            action.package.id,
            project.name
        ),
        (ActionKind::Uninstall, Some(idx)) => {
            project.packages.remove(idx);
        }
        (ActionKind::Uninstall, None) => anyhow::bail!(
            "Cannot uninstall '{}': it is not installed in '{}'",
            action.package.id,
            project.name
        ),
    }
    Ok(())
}

#[async_trait]
impl ProjectModel for SolutionFile {
    async fn projects(&self) -> anyhow::Result<Vec<ProjectTarget>> {
        let manifest = self.manifest.lock().await;
        Ok(manifest
            .projects
            .iter()
            .map(|project| ProjectTarget::new(project.name.clone(), project.style.capabilities()))
            .collect())
    }

    async fn installed_packages(&self, project: &str) -> anyhow::Result<Vec<PackageIdentity>> {
        let mut manifest = self.manifest.lock().await;
        Ok(find_project(&mut manifest, project)?.packages.clone())
    }

    async fn apply(&self, project: &str, actions: &[ProjectAction]) -> Result<(), ActionError> {
        let mut manifest = self.manifest.lock().await;
        let entry = find_project(&mut manifest, project)?;

        // Work on a copy so a failing action leaves the project untouched.
        let mut updated = entry.clone();
        for action in actions {
            apply_action(&mut updated, action)?;
        }
        *entry = updated;
        Ok(())
    }

    async fn save(&self, project: &str) -> anyhow::Result<()> {
        let mut manifest = self.manifest.lock().await;
        find_project(&mut manifest, project)?;
        self.write_manifest(&manifest)?;
        tracing::debug!(project, path = %self.path.display(), "saved solution");
        Ok(())
    }
}
