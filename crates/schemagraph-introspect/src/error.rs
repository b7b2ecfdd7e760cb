//! Error types for schema introspection.

use schemagraph_core::EngineKind;
use thiserror::Error;

/// Errors produced while introspecting an external database.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// The engine, or the tunnel in front of it, could not be reached or
    /// refused the credentials.
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine was reachable but its structure could not be read.
    #[error("introspection error: {0}")]
    Introspection(String),

    /// No driver is registered for the requested engine.
    #[error("no driver registered for engine '{0}'")]
    UnsupportedEngine(EngineKind),

    /// The caller cancelled the run.
    #[error("introspection cancelled")]
    Cancelled,
}

impl IntrospectError {
    pub(crate) fn connection(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        IntrospectError::Connection(format!("{}: {}", context, err))
    }

    pub(crate) fn introspection(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        IntrospectError::Introspection(format!("{}: {}", context, err))
    }
}
