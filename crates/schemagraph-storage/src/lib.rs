//! Versioned persistence for schema diagrams.
//!
//! Provides the [`ProjectStore`] trait defining the persistence contract, the
//! [`InMemoryStore`] and [`SqliteStore`] backends, and the [`SaveEngine`]
//! that enforces optimistic concurrency and snapshot throttling on every
//! diagram mutation.
//!
//! # Architecture
//!
//! - The **store** owns atomicity: [`ProjectStore::commit`] reads the current
//!   project and newest snapshot head, asks a planner what to write, and
//!   applies the plan as one isolated unit ending in a conditional
//!   `version = observed` update.
//! - The **engine** owns policy: validation, the expected-version gate,
//!   fingerprint comparison and the throttling window all run inside the
//!   planner, so they observe exactly the state the write replaces.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all persistence failure modes
//! - [`types`]: project, snapshot and pagination types
//! - [`fingerprint`]: blake3 content fingerprint of a diagram
//! - [`validate`]: structural safety checks on raw diagram content
//! - [`traits`]: ProjectStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`engine`]: SaveEngine (save, restore, history)
//! - [`audit`], [`access`], [`clock`], [`config`]: engine collaborators

pub mod access;
pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export key types for ergonomic use.
pub use access::{AccessDenied, AccessGuard, AllowAll, OwnerGuard};
pub use audit::{AuditAction, AuditError, AuditEvent, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, SaveEngine, SaveRequest};
pub use error::StorageError;
pub use fingerprint::{fingerprint, Fingerprint};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::ProjectStore;
pub use types::{
    ActorId, CommitPlan, NewProject, NewSnapshot, Owner, Page, PageRequest, Project, ProjectId,
    ProjectSummary, SnapshotHead, VersionId, VersionSnapshot,
};
pub use validate::{validate_content, ValidationError};
