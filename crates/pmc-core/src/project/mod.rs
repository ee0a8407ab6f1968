//! Project model boundary, scope selection and the file-backed solution.

pub mod model;
pub mod scope;
pub mod solution;

pub use model::{ActionError, ProjectCapabilities, ProjectModel, ProjectTarget};
pub use scope::{Exclusion, ScopeSelection, select_scope};
pub use solution::{PackageStyle, SolutionFile};
