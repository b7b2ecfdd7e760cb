//! Save/restore engine: optimistic concurrency and snapshot throttling.
//!
//! [`SaveEngine`] is the only writer of project content. Every mutation goes
//! through [`ProjectStore::commit`], and all policy (access check, the
//! expected-version gate, fingerprint comparison, the throttling window) is
//! decided inside the commit planner so it sees exactly the state the write
//! replaces.
//!
//! Fail-fast: conflicts are returned to the caller, never retried here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use schemagraph_core::DiagramGraph;

use crate::access::{AccessDenied, AccessGuard, AllowAll};
use crate::audit::{self, AuditAction, AuditEvent, AuditSink, TracingAuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::fingerprint::fingerprint;
use crate::traits::ProjectStore;
use crate::types::{
    ActorId, CommitPlan, NewProject, NewSnapshot, Page, PageRequest, Project, ProjectId,
    ProjectSummary, SnapshotHead, VersionId, VersionSnapshot,
};
use crate::validate::{validate_content, ValidationError};

/// Description of snapshots created by the throttled auto-save policy.
pub const AUTO_SAVE_DESCRIPTION: &str = "Auto-save (Smart)";

/// Description of snapshots created by a forced save (restore).
pub const FORCED_BACKUP_DESCRIPTION: &str = "Backup before Restore";

/// Errors surfaced by [`SaveEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Content was oversized, malformed or unsafe.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The project or version does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request references things that do not belong together.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Optimistic-lock violation: the project was modified by another user.
    #[error("project {project} was modified by another user (expected version {expected}, current version {actual})")]
    Conflict {
        project: ProjectId,
        expected: i64,
        actual: i64,
    },

    /// The actor may not modify the project.
    #[error(transparent)]
    Forbidden(#[from] AccessDenied),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ProjectNotFound(id) => EngineError::NotFound(format!("project {}", id)),
            StorageError::SnapshotNotFound(id) => EngineError::NotFound(format!("version {}", id)),
            StorageError::VersionConflict {
                project,
                expected,
                actual,
            } => EngineError::Conflict {
                project,
                expected,
                actual,
            },
            other => EngineError::Storage(other),
        }
    }
}

/// Input to [`SaveEngine::save_diagram`].
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub project: ProjectId,
    /// Raw diagram content, validated before anything is read.
    pub content: Value,
    pub actor: ActorId,
    /// The version the caller last observed. `None` opts into
    /// last-writer-wins.
    pub expected_version: Option<i64>,
    pub force_snapshot: bool,
}

impl SaveRequest {
    pub fn new(project: ProjectId, content: Value, actor: impl Into<ActorId>) -> Self {
        SaveRequest {
            project,
            content,
            actor: actor.into(),
            expected_version: None,
            force_snapshot: false,
        }
    }

    pub fn expecting(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force_snapshot = true;
        self
    }
}

/// Versioned save/restore over a [`ProjectStore`].
pub struct SaveEngine<S> {
    store: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    access: Arc<dyn AccessGuard>,
}

impl<S: ProjectStore> SaveEngine<S> {
    /// Creates an engine with default config, the system clock, tracing
    /// audit and no access restrictions.
    pub fn new(store: S) -> Self {
        SaveEngine {
            store,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            audit: Arc::new(TracingAuditSink),
            access: Arc::new(AllowAll),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_access_guard(mut self, access: Arc<dyn AccessGuard>) -> Self {
        self.access = access;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Structural safety checks on raw content.
    pub fn validate(&self, content: &Value) -> Result<(), ValidationError> {
        validate_content(content, self.config.max_content_bytes)
    }

    /// Validates raw content and parses it into a checked [`DiagramGraph`].
    pub fn parse_content(&self, content: &Value) -> Result<DiagramGraph, ValidationError> {
        self.validate(content)?;
        let graph = DiagramGraph::deserialize(content)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        graph.check_integrity()?;
        Ok(graph)
    }

    /// Runs the same checks on an already typed graph.
    pub fn validate_graph(&self, graph: &DiagramGraph) -> Result<(), ValidationError> {
        let value =
            serde_json::to_value(graph).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        self.validate(&value)?;
        graph.check_integrity()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Persists a new project at version 0 and emits `PROJECT_CREATED`.
    pub fn create_project(&self, new: NewProject, actor: &ActorId) -> Result<Project, EngineError> {
        let project = self.insert_project(new)?;
        tracing::info!(project = %project.id, name = %project.name, "project created");
        self.emit(
            AuditAction::ProjectCreated,
            actor,
            &project,
            json!({ "name": project.name, "engineKind": project.engine_kind }),
        );
        Ok(project)
    }

    /// Persists an introspected schema as a new project and emits
    /// `SCHEMA_IMPORTED`.
    pub fn import_project(
        &self,
        new: NewProject,
        actor: &ActorId,
        source: &str,
    ) -> Result<Project, EngineError> {
        let project = self.insert_project(new)?;
        tracing::info!(
            project = %project.id,
            nodes = project.content.nodes.len(),
            edges = project.content.edges.len(),
            source,
            "schema imported"
        );
        self.emit(
            AuditAction::SchemaImported,
            actor,
            &project,
            json!({
                "name": project.name,
                "engineKind": project.engine_kind,
                "source": source,
                "nodes": project.content.nodes.len(),
                "edges": project.content.edges.len(),
            }),
        );
        Ok(project)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project, EngineError> {
        Ok(self.store.get_project(id)?)
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>, EngineError> {
        Ok(self.store.list_projects()?)
    }

    fn insert_project(&self, new: NewProject) -> Result<Project, EngineError> {
        if new.name.trim().is_empty() {
            return Err(EngineError::BadRequest("project name must not be empty".into()));
        }
        self.validate_graph(&new.content)?;
        Ok(self.store.create_project(new, self.clock.now())?)
    }

    // -----------------------------------------------------------------------
    // Save / restore
    // -----------------------------------------------------------------------

    /// Replaces a project's content, backing up the previous state when the
    /// throttling policy calls for it.
    pub fn save_diagram(&self, request: SaveRequest) -> Result<Project, EngineError> {
        let content = self.parse_content(&request.content)?;
        self.commit_content(
            request.project,
            content,
            &request.actor,
            request.expected_version,
            request.force_snapshot,
        )
    }

    /// Rolls a project back to one of its snapshots.
    ///
    /// The state being replaced is always backed up first, so a restore is
    /// itself undoable.
    pub fn restore_version(
        &self,
        project: ProjectId,
        version: VersionId,
        actor: &ActorId,
    ) -> Result<Project, EngineError> {
        self.store.get_project(project)?;
        let snapshot = self.store.get_snapshot(version)?;
        if snapshot.project_id != project {
            return Err(EngineError::BadRequest(format!(
                "version {} does not belong to project {}",
                version, project
            )));
        }
        self.validate_graph(&snapshot.content)?;

        let restored = self.commit_content(project, snapshot.content, actor, None, true)?;
        tracing::info!(project = %project, version = %version, "version restored");
        self.emit(
            AuditAction::VersionRestored,
            actor,
            &restored,
            json!({
                "versionId": version.to_string(),
                "snapshotCreatedAt": snapshot.created_at,
                "newVersion": restored.version,
            }),
        );
        Ok(restored)
    }

    /// Lists a project's snapshots, newest first.
    pub fn get_versions(
        &self,
        project: ProjectId,
        page: PageRequest,
    ) -> Result<Page<VersionSnapshot>, EngineError> {
        let page = page.clamped(self.config.max_page_size);
        Ok(self.store.list_snapshots(project, page)?)
    }

    /// A page request using the configured default size.
    pub fn default_page(&self, page: u32) -> PageRequest {
        PageRequest::new(page, self.config.default_page_size)
    }

    fn commit_content(
        &self,
        id: ProjectId,
        content: DiagramGraph,
        actor: &ActorId,
        expected_version: Option<i64>,
        force_snapshot: bool,
    ) -> Result<Project, EngineError> {
        let now = self.clock.now();

        let updated = self.store.commit::<_, EngineError>(id, |current, head| {
            self.access.authorize(actor, current)?;

            if let Some(expected) = expected_version {
                if expected != current.version {
                    tracing::debug!(
                        project = %id,
                        expected,
                        actual = current.version,
                        "stale expected version"
                    );
                    return Err(EngineError::Conflict {
                        project: id,
                        expected,
                        actual: current.version,
                    });
                }
            }

            let snapshot = self.plan_snapshot(current, &content, head, force_snapshot, now);
            Ok(CommitPlan {
                content,
                snapshot,
                committed_at: now,
            })
        })?;

        tracing::info!(project = %id, version = updated.version, "diagram saved");
        Ok(updated)
    }

    /// Decides whether the pre-mutation state gets backed up.
    fn plan_snapshot(
        &self,
        current: &Project,
        next: &DiagramGraph,
        head: Option<&SnapshotHead>,
        force: bool,
        now: DateTime<Utc>,
    ) -> Option<NewSnapshot> {
        let changed = fingerprint(&current.content) != fingerprint(next);
        if !changed && !force {
            tracing::debug!(project = %current.id, "content unchanged, no snapshot");
            return None;
        }

        let due = match head {
            None => true,
            Some(_) if force => true,
            Some(head) => now - head.created_at > self.config.snapshot_throttle,
        };
        if !due {
            tracing::debug!(project = %current.id, "snapshot throttled");
            return None;
        }

        let description = if force {
            FORCED_BACKUP_DESCRIPTION
        } else {
            AUTO_SAVE_DESCRIPTION
        };
        let snapshot = NewSnapshot {
            id: VersionId::new(),
            content: current.content.clone(),
            description: description.to_string(),
            created_at: now,
        };
        tracing::debug!(project = %current.id, snapshot = %snapshot.id, description, "snapshot created");
        Some(snapshot)
    }

    fn emit(&self, action: AuditAction, actor: &ActorId, project: &Project, metadata: Value) {
        audit::notify(
            self.audit.as_ref(),
            AuditEvent {
                action,
                actor: actor.clone(),
                resource_id: project.id.to_string(),
                metadata,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::InMemoryStore;
    use crate::types::Owner;
    use chrono::{Duration, TimeZone};
    use schemagraph_core::{EngineKind, Field, GraphMetadata, GraphNode, NodeKind};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> (SaveEngine<InMemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = SaveEngine::new(InMemoryStore::new()).with_clock(clock.clone());
        (engine, clock)
    }

    fn graph(tables: &[&str]) -> DiagramGraph {
        let mut g = DiagramGraph::new(GraphMetadata::for_engine(EngineKind::Postgresql));
        for t in tables {
            g.add_node(
                GraphNode::new(*t, NodeKind::RelationalTable, *t)
                    .with_field(Field::new(format!("{t}.id"), "id", "uuid").primary_key()),
            )
            .unwrap();
        }
        g
    }

    fn project(engine: &SaveEngine<InMemoryStore>) -> Project {
        engine
            .create_project(
                NewProject {
                    name: "shop".into(),
                    engine_kind: EngineKind::Postgresql,
                    owner: Owner::User("alice".into()),
                    content: graph(&[]),
                },
                &"alice".into(),
            )
            .unwrap()
    }

    fn save(engine: &SaveEngine<InMemoryStore>, id: ProjectId, g: &DiagramGraph) -> Result<Project, EngineError> {
        engine.save_diagram(SaveRequest::new(id, serde_json::to_value(g).unwrap(), "alice"))
    }

    #[test]
    fn test_first_save_creates_auto_snapshot() {
        let (engine, _) = engine();
        let p = project(&engine);
        let saved = save(&engine, p.id, &graph(&["users"])).unwrap();
        assert_eq!(saved.version, 1);

        let versions = engine.get_versions(p.id, PageRequest::new(1, 10)).unwrap();
        assert_eq!(versions.total, 1);
        assert_eq!(versions.items[0].description, AUTO_SAVE_DESCRIPTION);
        assert_eq!(versions.items[0].content, graph(&[]));
    }

    #[test]
    fn test_throttle_window_suppresses_then_allows() {
        let (engine, clock) = engine();
        let p = project(&engine);
        save(&engine, p.id, &graph(&["a"])).unwrap();

        clock.advance(Duration::minutes(2));
        save(&engine, p.id, &graph(&["a", "b"])).unwrap();
        assert_eq!(engine.get_versions(p.id, PageRequest::new(1, 10)).unwrap().total, 1);

        // Exactly at the window boundary is not "exceeds".
        clock.set(t0() + Duration::minutes(5));
        save(&engine, p.id, &graph(&["a", "b", "c"])).unwrap();
        assert_eq!(engine.get_versions(p.id, PageRequest::new(1, 10)).unwrap().total, 1);

        clock.advance(Duration::seconds(1));
        let last = save(&engine, p.id, &graph(&["d"])).unwrap();
        assert_eq!(last.version, 4);
        let versions = engine.get_versions(p.id, PageRequest::new(1, 10)).unwrap();
        assert_eq!(versions.total, 2);
        assert_eq!(versions.items[0].content, graph(&["a", "b", "c"]));
    }

    #[test]
    fn test_unchanged_save_still_bumps_version() {
        let (engine, _) = engine();
        let p = project(&engine);
        let same = save(&engine, p.id, &graph(&[])).unwrap();
        assert_eq!(same.version, 1);
        assert_eq!(engine.get_versions(p.id, PageRequest::new(1, 10)).unwrap().total, 0);
    }

    #[test]
    fn test_forced_snapshot_ignores_throttle_and_fingerprint() {
        let (engine, _) = engine();
        let p = project(&engine);
        save(&engine, p.id, &graph(&["a"])).unwrap();
        engine
            .save_diagram(
                SaveRequest::new(p.id, serde_json::to_value(graph(&["a"])).unwrap(), "alice")
                    .forced(),
            )
            .unwrap();

        let versions = engine.get_versions(p.id, PageRequest::new(1, 10)).unwrap();
        assert_eq!(versions.total, 2);
        assert_eq!(versions.items[0].description, FORCED_BACKUP_DESCRIPTION);
    }

    #[test]
    fn test_rejects_denylisted_key_before_reading() {
        let (engine, _) = engine();
        let content = json!({"nodes": [], "edges": [], "metadata": {"constructor": 1}});
        let err = engine
            .save_diagram(SaveRequest::new(ProjectId(404), content, "alice"))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::ForbiddenKey { .. })
        ));
    }

    #[test]
    fn test_rejects_dangling_edge() {
        let (engine, _) = engine();
        let p = project(&engine);
        let content = json!({
            "nodes": [],
            "edges": [{"id": "e1", "sourceNodeId": "a", "targetNodeId": "b"}]
        });
        let err = engine
            .save_diagram(SaveRequest::new(p.id, content, "alice"))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::Integrity(_))
        ));
    }

    #[test]
    fn test_get_versions_clamps_limit() {
        let (engine, _) = engine();
        let p = project(&engine);
        let page = engine.get_versions(p.id, PageRequest::new(0, 10_000)).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn test_storage_errors_map_to_taxonomy() {
        assert!(matches!(
            EngineError::from(StorageError::ProjectNotFound(ProjectId(3))),
            EngineError::NotFound(_)
        ));
        assert!(matches!(
            EngineError::from(StorageError::VersionConflict {
                project: ProjectId(3),
                expected: 1,
                actual: 2
            }),
            EngineError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(matches!(
            EngineError::from(StorageError::LockPoisoned),
            EngineError::Storage(_)
        ));
    }
}
