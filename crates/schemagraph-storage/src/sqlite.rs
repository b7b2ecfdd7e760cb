//! SQLite implementation of [`ProjectStore`].
//!
//! [`SqliteStore`] persists projects and their snapshot history in a SQLite
//! database with WAL mode and automatic schema migrations. Diagram content is
//! stored as JSON TEXT via serde_json; timestamps as epoch milliseconds.
//!
//! A file-backed store opens a fresh connection per unit of work, so callers
//! on different threads never share one. [`ProjectStore::commit`] runs inside
//! a `BEGIN IMMEDIATE` transaction: the write lock is taken before the
//! project row is read, and the final `UPDATE ... WHERE version = ?` refuses
//! to advance a version it did not observe.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

use schemagraph_core::{DiagramGraph, EngineKind};

use crate::error::StorageError;
use crate::traits::ProjectStore;
use crate::types::{
    CommitPlan, NewProject, NewSnapshot, Owner, Page, PageRequest, Project, ProjectId,
    ProjectSummary, SnapshotHead, VersionId, VersionSnapshot,
};

enum Target {
    File(PathBuf),
    Shared(Mutex<Connection>),
}

/// SQLite-backed implementation of [`ProjectStore`].
pub struct SqliteStore {
    target: Target,
}

const PROJECT_COLUMNS: &str =
    "id, name, engine_kind, content_json, version, owner_kind, owner_ref, created_at, updated_at";

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`, applying migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        crate::schema::open_database(&path)?;
        Ok(SqliteStore {
            target: Target::File(path),
        })
    }

    /// Opens an in-memory SQLite database (for testing).
    ///
    /// All callers share a single connection, so units of work are serialized.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore {
            target: Target::Shared(Mutex::new(conn)),
        })
    }

    /// Runs `f` with a connection dedicated to this unit of work.
    fn with_conn<T, E>(&self, f: impl FnOnce(&mut Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        match &self.target {
            Target::File(path) => {
                let mut conn = crate::schema::open_connection(path)?;
                f(&mut conn)
            }
            Target::Shared(conn) => {
                let mut guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
                f(&mut guard)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn load_project(conn: &Connection, id: ProjectId) -> Result<Project, StorageError> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id.0], ProjectRow::from_row)
            .optional()?;
        row.ok_or(StorageError::ProjectNotFound(id))?.into_project()
    }

    fn snapshot_head(conn: &Connection, id: ProjectId) -> Result<Option<SnapshotHead>, StorageError> {
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT id, created_at FROM version_snapshots WHERE project_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((version_id, created_at)) => Ok(Some(SnapshotHead {
                id: parse_version_id(&version_id)?,
                created_at: from_millis(created_at)?,
            })),
        }
    }

    fn insert_snapshot(
        tx: &Transaction<'_>,
        project: ProjectId,
        snapshot: &NewSnapshot,
    ) -> Result<(), StorageError> {
        let content_json = serde_json::to_string(&snapshot.content)?;
        tx.execute(
            "INSERT INTO version_snapshots (id, project_id, content_json, description, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.id.0.to_string(),
                project.0,
                content_json,
                snapshot.description,
                snapshot.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }
}

/// Raw column values of a `projects` row.
struct ProjectRow {
    id: i64,
    name: String,
    engine_kind: String,
    content_json: String,
    version: i64,
    owner_kind: String,
    owner_ref: String,
    created_at: i64,
    updated_at: i64,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ProjectRow {
            id: row.get(0)?,
            name: row.get(1)?,
            engine_kind: row.get(2)?,
            content_json: row.get(3)?,
            version: row.get(4)?,
            owner_kind: row.get(5)?,
            owner_ref: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_project(self) -> Result<Project, StorageError> {
        let content: DiagramGraph = serde_json::from_str(&self.content_json)?;
        let owner = Owner::from_parts(&self.owner_kind, self.owner_ref).ok_or_else(|| {
            StorageError::IntegrityError {
                reason: format!("project {} has unknown owner kind '{}'", self.id, self.owner_kind),
            }
        })?;
        Ok(Project {
            id: ProjectId(self.id),
            name: self.name,
            engine_kind: parse_engine(&self.engine_kind)?,
            content,
            version: self.version,
            owner,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

fn parse_engine(s: &str) -> Result<EngineKind, StorageError> {
    s.parse()
        .map_err(|reason| StorageError::IntegrityError { reason })
}

fn parse_version_id(s: &str) -> Result<VersionId, StorageError> {
    Uuid::parse_str(s)
        .map(VersionId)
        .map_err(|e| StorageError::IntegrityError {
            reason: format!("invalid version id '{}': {}", s, e),
        })
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StorageError::IntegrityError {
        reason: format!("timestamp out of range: {}", ms),
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<(String, i64, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_snapshot(
    (id, project_id, content_json, description, created_at): (String, i64, String, String, i64),
) -> Result<VersionSnapshot, StorageError> {
    Ok(VersionSnapshot {
        id: parse_version_id(&id)?,
        project_id: ProjectId(project_id),
        content: serde_json::from_str(&content_json)?,
        description,
        created_at: from_millis(created_at)?,
    })
}

impl ProjectStore for SqliteStore {
    fn create_project(
        &self,
        new: NewProject,
        created_at: DateTime<Utc>,
    ) -> Result<Project, StorageError> {
        let content_json = serde_json::to_string(&new.content)?;
        let millis = created_at.timestamp_millis();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO projects (name, engine_kind, content_json, version, owner_kind, owner_ref, created_at, updated_at) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)",
                params![
                    new.name,
                    new.engine_kind.as_str(),
                    content_json,
                    new.owner.kind_str(),
                    new.owner.reference(),
                    millis,
                ],
            )?;
            let id = ProjectId(tx.last_insert_rowid());
            tx.commit()?;

            Ok(Project {
                id,
                name: new.name,
                engine_kind: new.engine_kind,
                content: new.content,
                version: 0,
                owner: new.owner,
                created_at,
                updated_at: created_at,
            })
        })
    }

    fn get_project(&self, id: ProjectId) -> Result<Project, StorageError> {
        self.with_conn(|conn| Self::load_project(conn, id))
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, engine_kind, version, updated_at FROM projects ORDER BY updated_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                let (id, name, engine_kind, version, updated_at) = row?;
                summaries.push(ProjectSummary {
                    id: ProjectId(id),
                    name,
                    engine_kind: parse_engine(&engine_kind)?,
                    version,
                    updated_at: from_millis(updated_at)?,
                });
            }
            Ok(summaries)
        })
    }

    fn commit<F, E>(&self, id: ProjectId, plan: F) -> Result<Project, E>
    where
        F: FnOnce(&Project, Option<&SnapshotHead>) -> Result<CommitPlan, E>,
        E: From<StorageError>,
    {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StorageError::from)?;

            let current = Self::load_project(&tx, id)?;
            let head = Self::snapshot_head(&tx, id)?;
            let plan = plan(&current, head.as_ref())?;

            if let Some(snapshot) = &plan.snapshot {
                Self::insert_snapshot(&tx, id, snapshot)?;
            }

            let content_json = serde_json::to_string(&plan.content).map_err(StorageError::from)?;
            let rows = tx
                .execute(
                    "UPDATE projects SET content_json = ?1, version = version + 1, updated_at = ?2 WHERE id = ?3 AND version = ?4",
                    params![
                        content_json,
                        plan.committed_at.timestamp_millis(),
                        id.0,
                        current.version,
                    ],
                )
                .map_err(StorageError::from)?;

            if rows == 0 {
                let actual: i64 = tx
                    .query_row("SELECT version FROM projects WHERE id = ?1", params![id.0], |row| {
                        row.get(0)
                    })
                    .map_err(StorageError::from)?;
                // Dropping the transaction rolls back the snapshot insert.
                return Err(StorageError::VersionConflict {
                    project: id,
                    expected: current.version,
                    actual,
                }
                .into());
            }
            tx.commit().map_err(StorageError::from)?;

            Ok(Project {
                content: plan.content,
                version: current.version + 1,
                updated_at: plan.committed_at,
                ..current
            })
        })
    }

    fn get_snapshot(&self, id: VersionId) -> Result<VersionSnapshot, StorageError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, project_id, content_json, description, created_at FROM version_snapshots WHERE id = ?1",
                    params![id.0.to_string()],
                    snapshot_from_row,
                )
                .optional()?;
            into_snapshot(row.ok_or(StorageError::SnapshotNotFound(id))?)
        })
    }

    fn list_snapshots(
        &self,
        project: ProjectId,
        page: PageRequest,
    ) -> Result<Page<VersionSnapshot>, StorageError> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
                params![project.0],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StorageError::ProjectNotFound(project));
            }

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM version_snapshots WHERE project_id = ?1",
                params![project.0],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare_cached(
                "SELECT id, project_id, content_json, description, created_at FROM version_snapshots WHERE project_id = ?1 ORDER BY seq DESC LIMIT ?2 OFFSET ?3",
            )?;
            let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
            let rows = stmt.query_map(
                params![project.0, i64::from(page.limit), offset],
                snapshot_from_row,
            )?;

            let mut items = Vec::new();
            for row in rows {
                items.push(into_snapshot(row?)?);
            }

            Ok(Page {
                items,
                page: page.page,
                limit: page.limit,
                total: total.max(0) as u64,
            })
        })
    }
}
