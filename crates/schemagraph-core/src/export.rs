//! Export collaborator contract.
//!
//! Script generators consume a finished [`DiagramGraph`] plus the engine it
//! targets and return opaque script text. Only the canonical JSON exporter
//! ships here; DDL generators plug in behind the same trait.

use thiserror::Error;

use crate::engine::EngineKind;
use crate::graph::DiagramGraph;

/// Errors produced by a [`ScriptExporter`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("engine '{0}' is not supported by this exporter")]
    UnsupportedEngine(EngineKind),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Turns a diagram into script text for a target engine.
pub trait ScriptExporter {
    fn export(&self, graph: &DiagramGraph, engine: EngineKind) -> Result<String, ExportError>;
}

/// Emits the diagram itself as pretty-printed JSON, for any engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl ScriptExporter for JsonExporter {
    fn export(&self, graph: &DiagramGraph, _engine: EngineKind) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(graph)?)
    }
}
