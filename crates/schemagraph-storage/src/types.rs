//! Storage-layer types for project identity, history and pagination.
//!
//! [`ProjectId`] and [`VersionId`] are defined here (not in schemagraph-core)
//! because identity is a storage concern: a diagram only gains an id when a
//! project persists it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schemagraph_core::{DiagramGraph, EngineKind};

/// Unique identifier for a stored project.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a version snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub Uuid);

impl VersionId {
    /// Allocates a fresh random id.
    pub fn new() -> Self {
        VersionId(Uuid::new_v4())
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whoever performs an operation (user id, service name, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        ActorId(s.to_string())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who owns a project: a single user or a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "lowercase")]
pub enum Owner {
    User(String),
    Team(String),
}

impl Owner {
    pub(crate) fn kind_str(&self) -> &'static str {
        match self {
            Owner::User(_) => "user",
            Owner::Team(_) => "team",
        }
    }

    pub(crate) fn reference(&self) -> &str {
        match self {
            Owner::User(r) | Owner::Team(r) => r,
        }
    }

    pub(crate) fn from_parts(kind: &str, reference: String) -> Option<Self> {
        match kind {
            "user" => Some(Owner::User(reference)),
            "team" => Some(Owner::Team(reference)),
            _ => None,
        }
    }
}

/// A persisted diagram and its optimistic-lock token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub engine_kind: EngineKind,
    pub content: DiagramGraph,
    /// Starts at 0 and grows by exactly 1 per committed save.
    pub version: i64,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary of a stored project (for listing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub engine_kind: EngineKind,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for ProjectSummary {
    fn from(p: &Project) -> Self {
        ProjectSummary {
            id: p.id,
            name: p.name.clone(),
            engine_kind: p.engine_kind,
            version: p.version,
            updated_at: p.updated_at,
        }
    }
}

/// Input for creating a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub engine_kind: EngineKind,
    pub owner: Owner,
    pub content: DiagramGraph,
}

/// An immutable backup of a project's content as it was before some save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub id: VersionId,
    pub project_id: ProjectId,
    pub content: DiagramGraph,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// The newest snapshot of a project, without its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHead {
    pub id: VersionId,
    pub created_at: DateTime<Utc>,
}

/// A snapshot a commit should append.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub id: VersionId,
    pub content: DiagramGraph,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// What a [`ProjectStore::commit`](crate::traits::ProjectStore::commit)
/// should write: an optional backup snapshot, then the new content with the
/// version advanced by one.
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub content: DiagramGraph,
    pub snapshot: Option<NewSnapshot>,
    pub committed_at: DateTime<Utc>,
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        PageRequest { page, limit }
    }

    /// Normalizes the request: page at least 1, limit within `1..=max_limit`.
    pub fn clamped(self, max_limit: u32) -> Self {
        PageRequest {
            page: self.page.max(1),
            limit: self.limit.clamp(1, max_limit.max(1)),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamping() {
        assert_eq!(PageRequest::new(0, 0).clamped(100), PageRequest::new(1, 1));
        assert_eq!(PageRequest::new(3, 500).clamped(100), PageRequest::new(3, 100));
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_owner_serde_shape() {
        let json = serde_json::to_value(Owner::Team("data-eng".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "team", "ref": "data-eng"}));
    }

    #[test]
    fn test_owner_parts_roundtrip() {
        let owner = Owner::User("alice".into());
        let back = Owner::from_parts(owner.kind_str(), owner.reference().to_string());
        assert_eq!(back, Some(owner));
        assert_eq!(Owner::from_parts("org", "x".into()), None);
    }
}
