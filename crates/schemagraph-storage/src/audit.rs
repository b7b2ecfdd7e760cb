//! Audit collaborator.
//!
//! The engine reports project creation, schema import and version restore to
//! an [`AuditSink`]. Delivery is best-effort: a failing sink is logged and
//! never fails the operation that triggered it.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ProjectCreated,
    VersionRestored,
    SchemaImported,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::ProjectCreated => "PROJECT_CREATED",
            AuditAction::VersionRestored => "VERSION_RESTORED",
            AuditAction::SchemaImported => "SCHEMA_IMPORTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub action: AuditAction,
    pub actor: ActorId,
    pub resource_id: String,
    pub metadata: Value,
}

#[derive(Debug, Error)]
#[error("audit delivery failed: {0}")]
pub struct AuditError(pub String);

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit events to the `tracing` log under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            action = event.action.as_str(),
            actor = %event.actor,
            resource = %event.resource_id,
            metadata = %event.metadata,
        );
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .map_err(|_| AuditError("recording sink poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}

/// Delivers an event, logging instead of propagating failure.
pub(crate) fn notify(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(err) = sink.record(&event) {
        tracing::warn!(
            action = event.action.as_str(),
            resource = %event.resource_id,
            error = %err,
            "audit event dropped"
        );
    }
}
