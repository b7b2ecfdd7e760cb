//! In-memory implementation of [`ProjectStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and ephemeral
//! sessions. Each project lives in its own [`DashMap`] entry; the entry's
//! write guard is the isolation unit for [`ProjectStore::commit`], so commits
//! to one project serialize while different projects proceed in parallel.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::StorageError;
use crate::traits::ProjectStore;
use crate::types::{
    CommitPlan, NewProject, Page, PageRequest, Project, ProjectId, ProjectSummary, SnapshotHead,
    VersionId, VersionSnapshot,
};

/// Data stored for a single project.
#[derive(Debug, Clone)]
struct StoredProject {
    project: Project,
    /// Append-only, oldest first.
    snapshots: Vec<VersionSnapshot>,
}

impl StoredProject {
    fn head(&self) -> Option<SnapshotHead> {
        self.snapshots.last().map(|s| SnapshotHead {
            id: s.id,
            created_at: s.created_at,
        })
    }
}

/// HashMap-backed project store.
#[derive(Debug)]
pub struct InMemoryStore {
    projects: DashMap<ProjectId, StoredProject>,
    /// Snapshot id -> owning project, for point lookups.
    snapshot_owner: DashMap<VersionId, ProjectId>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            projects: DashMap::new(),
            snapshot_owner: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectStore for InMemoryStore {
    fn create_project(
        &self,
        new: NewProject,
        created_at: DateTime<Utc>,
    ) -> Result<Project, StorageError> {
        let id = ProjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let project = Project {
            id,
            name: new.name,
            engine_kind: new.engine_kind,
            content: new.content,
            version: 0,
            owner: new.owner,
            created_at,
            updated_at: created_at,
        };
        self.projects.insert(
            id,
            StoredProject {
                project: project.clone(),
                snapshots: Vec::new(),
            },
        );
        Ok(project)
    }

    fn get_project(&self, id: ProjectId) -> Result<Project, StorageError> {
        self.projects
            .get(&id)
            .map(|entry| entry.project.clone())
            .ok_or(StorageError::ProjectNotFound(id))
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StorageError> {
        let mut summaries: Vec<ProjectSummary> = self
            .projects
            .iter()
            .map(|entry| ProjectSummary::from(&entry.project))
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    fn commit<F, E>(&self, id: ProjectId, plan: F) -> Result<Project, E>
    where
        F: FnOnce(&Project, Option<&SnapshotHead>) -> Result<CommitPlan, E>,
        E: From<StorageError>,
    {
        // Held until the end of the function: no other commit to this
        // project can read or write in between.
        let mut entry = self
            .projects
            .get_mut(&id)
            .ok_or(StorageError::ProjectNotFound(id))?;

        let observed = entry.project.version;
        let head = entry.head();
        let CommitPlan {
            content,
            snapshot,
            committed_at,
        } = plan(&entry.project, head.as_ref())?;

        if let Some(snapshot) = snapshot {
            self.snapshot_owner.insert(snapshot.id, id);
            entry.snapshots.push(VersionSnapshot {
                id: snapshot.id,
                project_id: id,
                content: snapshot.content,
                description: snapshot.description,
                created_at: snapshot.created_at,
            });
        }

        let project = &mut entry.project;
        project.content = content;
        project.version = observed + 1;
        project.updated_at = committed_at;
        Ok(project.clone())
    }

    fn get_snapshot(&self, id: VersionId) -> Result<VersionSnapshot, StorageError> {
        let project_id = *self
            .snapshot_owner
            .get(&id)
            .ok_or(StorageError::SnapshotNotFound(id))?;
        self.projects
            .get(&project_id)
            .and_then(|entry| entry.snapshots.iter().find(|s| s.id == id).cloned())
            .ok_or(StorageError::SnapshotNotFound(id))
    }

    fn list_snapshots(
        &self,
        project: ProjectId,
        page: PageRequest,
    ) -> Result<Page<VersionSnapshot>, StorageError> {
        let entry = self
            .projects
            .get(&project)
            .ok_or(StorageError::ProjectNotFound(project))?;

        let total = entry.snapshots.len() as u64;
        let items = entry
            .snapshots
            .iter()
            .rev()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total,
        })
    }
}
