//! External database engine kinds a diagram can describe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::node::NodeKind;

/// The external database engine a diagram was modelled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Postgresql,
    Mysql,
    Sqlite,
    Mongodb,
}

/// How an engine exposes its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    /// Declared catalog of tables, columns and constraints.
    Relational,
    /// Schema-on-read collections of documents.
    Document,
}

impl EngineKind {
    /// All known engine kinds.
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Postgresql,
        EngineKind::Mysql,
        EngineKind::Sqlite,
        EngineKind::Mongodb,
    ];

    pub fn family(self) -> EngineFamily {
        match self {
            EngineKind::Postgresql | EngineKind::Mysql | EngineKind::Sqlite => {
                EngineFamily::Relational
            }
            EngineKind::Mongodb => EngineFamily::Document,
        }
    }

    /// The node kind introspection produces for this engine.
    pub fn node_kind(self) -> NodeKind {
        match self.family() {
            EngineFamily::Relational => NodeKind::RelationalTable,
            EngineFamily::Document => NodeKind::DocumentCollection,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Postgresql => "postgresql",
            EngineKind::Mysql => "mysql",
            EngineKind::Sqlite => "sqlite",
            EngineKind::Mongodb => "mongodb",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(EngineKind::Postgresql),
            "mysql" => Ok(EngineKind::Mysql),
            "sqlite" => Ok(EngineKind::Sqlite),
            "mongodb" | "mongo" => Ok(EngineKind::Mongodb),
            other => Err(format!("unknown engine kind '{}'", other)),
        }
    }
}
