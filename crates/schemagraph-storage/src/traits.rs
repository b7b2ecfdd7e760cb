//! The [`ProjectStore`] trait defining the persistence contract for projects
//! and their version history.
//!
//! The contract covers:
//! - point reads of a project,
//! - one atomic read-plan-write primitive ([`ProjectStore::commit`]),
//! - append-only snapshot insertion (only through `commit`) and
//!   most-recent-first paginated snapshot queries.
//!
//! Methods take `&self`: a store is shared by every concurrent caller, and
//! each backend provides its own per-project isolation.

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::types::{
    CommitPlan, NewProject, Page, PageRequest, Project, ProjectId, ProjectSummary, SnapshotHead,
    VersionId, VersionSnapshot,
};

/// The storage contract for versioned projects.
pub trait ProjectStore: Send + Sync {
    /// Persists a new project at version 0.
    fn create_project(
        &self,
        new: NewProject,
        created_at: DateTime<Utc>,
    ) -> Result<Project, StorageError>;

    /// Loads a project by id.
    fn get_project(&self, id: ProjectId) -> Result<Project, StorageError>;

    /// Lists all projects, most recently updated first.
    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StorageError>;

    /// Atomically replaces a project's content.
    ///
    /// Within one isolation unit the backend:
    /// 1. reads the project and the head of its snapshot history,
    /// 2. calls `plan` with them (the planner may abort with any error),
    /// 3. appends `plan.snapshot` if present,
    /// 4. writes `plan.content` with `version = observed + 1`, conditional on
    ///    the version still being the observed one.
    ///
    /// Two commits racing on the same project can never both advance from the
    /// same observed version.
    fn commit<F, E>(&self, id: ProjectId, plan: F) -> Result<Project, E>
    where
        F: FnOnce(&Project, Option<&SnapshotHead>) -> Result<CommitPlan, E>,
        E: From<StorageError>;

    /// Loads a snapshot by id.
    fn get_snapshot(&self, id: VersionId) -> Result<VersionSnapshot, StorageError>;

    /// Lists a project's snapshots, newest first.
    fn list_snapshots(
        &self,
        project: ProjectId,
        page: PageRequest,
    ) -> Result<Page<VersionSnapshot>, StorageError>;
}
