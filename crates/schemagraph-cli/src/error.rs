//! CLI error type and its exit-code mapping.

use schemagraph_core::ExportError;
use schemagraph_introspect::IntrospectError;
use schemagraph_storage::{ConfigError, EngineError, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Introspect(#[from] IntrospectError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl CliError {
    /// Process exit code: 1 bad input, 2 conflict, 3 storage or I/O,
    /// 4 not found, 5 introspection.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Json { .. } => 1,
            CliError::Engine(err) => match err {
                EngineError::Validation(_)
                | EngineError::BadRequest(_)
                | EngineError::Forbidden(_) => 1,
                EngineError::Conflict { .. } => 2,
                EngineError::Storage(_) => 3,
                EngineError::NotFound(_) => 4,
            },
            CliError::Storage(StorageError::ProjectNotFound(_) | StorageError::SnapshotNotFound(_)) => 4,
            CliError::Storage(_) | CliError::Io { .. } => 3,
            CliError::Introspect(_) => 5,
            CliError::Export(ExportError::UnsupportedEngine(_)) => 1,
            CliError::Export(ExportError::Serialization(_)) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemagraph_storage::{ProjectId, ValidationError};

    #[test]
    fn test_exit_codes() {
        let conflict = CliError::Engine(EngineError::Conflict {
            project: ProjectId(1),
            expected: 1,
            actual: 2,
        });
        assert_eq!(conflict.exit_code(), 2);
        assert_eq!(CliError::Engine(EngineError::NotFound("project 1".into())).exit_code(), 4);
        assert_eq!(
            CliError::Engine(EngineError::Validation(ValidationError::Malformed("x".into()))).exit_code(),
            1
        );
        assert_eq!(CliError::Storage(StorageError::LockPoisoned).exit_code(), 3);
        assert_eq!(CliError::Introspect(IntrospectError::Cancelled).exit_code(), 5);
    }
}
