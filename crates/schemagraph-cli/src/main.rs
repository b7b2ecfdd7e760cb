//! Schema diagram CLI.
//!
//! Provides the `schemagraph` binary: introspect a live database into a
//! project, save and restore diagram versions, and export diagrams. All
//! commands print JSON on stdout; errors go to stderr with a non-zero exit
//! code (see [`CliError::exit_code`]).

mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use schemagraph_core::{DiagramGraph, EngineKind, GraphMetadata, JsonExporter, ScriptExporter};
use schemagraph_introspect::{ConnectionDescriptor, Introspector};
use schemagraph_storage::{
    ActorId, EngineConfig, NewProject, Owner, PageRequest, ProjectId, SaveEngine, SaveRequest,
    SqliteStore, VersionId,
};

use crate::error::CliError;

/// Reverse-engineer, version and export database schema diagrams.
#[derive(Parser)]
#[command(name = "schemagraph", version, about = "Database schema diagrams with version history")]
struct Cli {
    /// Path to the project database file.
    #[arg(long, global = true, env = "SCHEMAGRAPH_DB_PATH", default_value = "schemagraph.db")]
    db: PathBuf,

    /// Actor recorded for writes and audit events.
    #[arg(long, global = true, env = "SCHEMAGRAPH_ACTOR", default_value = "local")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List projects, most recently updated first.
    Projects,

    /// Create a project from a diagram file, or an empty diagram.
    Create {
        /// Project name.
        #[arg(long)]
        name: String,

        /// Engine kind: postgresql, mysql, sqlite, mongodb.
        #[arg(long)]
        engine: EngineKind,

        /// Diagram JSON to start from.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Owning team (default: the acting user).
        #[arg(long)]
        team: Option<String>,
    },

    /// Introspect a live database and store the result as a new project.
    Import {
        /// Connection descriptor JSON file.
        #[arg(long)]
        descriptor: PathBuf,

        /// Project name (default: the database name).
        #[arg(long)]
        name: Option<String>,

        /// Owning team (default: the acting user).
        #[arg(long)]
        team: Option<String>,

        /// Skip naming-convention relationship inference.
        #[arg(long)]
        no_infer: bool,
    },

    /// Print a project.
    Show {
        project: i64,
    },

    /// Replace a project's diagram.
    Save {
        project: i64,

        /// Diagram JSON file.
        #[arg(long)]
        file: PathBuf,

        /// Fail with a conflict unless the project is at this version.
        #[arg(long)]
        expected_version: Option<i64>,

        /// Back up the current state even inside the throttle window.
        #[arg(long)]
        force_snapshot: bool,
    },

    /// List a project's saved versions, newest first.
    Versions {
        project: i64,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size (default: SCHEMAGRAPH_PAGE_SIZE or 20).
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Roll a project back to a saved version.
    Restore {
        project: i64,

        /// Version id from `versions`.
        version: Uuid,
    },

    /// Export a project's diagram.
    Export {
        project: i64,

        /// Target engine (default: the project's engine).
        #[arg(long)]
        engine: Option<EngineKind>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = EngineConfig::from_env()?;
    tracing::debug!(db = %cli.db.display(), actor = %cli.actor, "opening project store");
    let actor = ActorId(cli.actor);
    let engine = SaveEngine::new(SqliteStore::open(&cli.db)?).with_config(config);

    match cli.command {
        Commands::Projects => print_json(&engine.list_projects()?),
        Commands::Create {
            name,
            engine: engine_kind,
            file,
            team,
        } => {
            let content = match file {
                Some(path) => engine.parse_content(&read_json(&path)?).map_err(|e| CliError::Engine(e.into()))?,
                None => DiagramGraph::new(GraphMetadata::for_engine(engine_kind)),
            };
            let project = engine.create_project(
                NewProject {
                    name,
                    engine_kind,
                    owner: owner(&actor, team),
                    content,
                },
                &actor,
            )?;
            print_json(&project)
        }
        Commands::Import {
            descriptor,
            name,
            team,
            no_infer,
        } => {
            let descriptor: ConnectionDescriptor = serde_json::from_value(read_json(&descriptor)?)
                .map_err(|source| CliError::Json {
                    context: "invalid connection descriptor".into(),
                    source,
                })?;
            let mut introspector = Introspector::with_builtin_drivers();
            if no_infer {
                introspector = introspector.with_options(schemagraph_introspect::IntrospectOptions {
                    infer_relationships: false,
                    ..Default::default()
                });
            }
            let content = introspector.introspect(&descriptor)?;
            let project = engine.import_project(
                NewProject {
                    name: name.unwrap_or_else(|| descriptor.database_name.clone()),
                    engine_kind: descriptor.engine_kind,
                    owner: owner(&actor, team),
                    content,
                },
                &actor,
                &descriptor.redacted(),
            )?;
            print_json(&project)
        }
        Commands::Show { project } => print_json(&engine.get_project(ProjectId(project))?),
        Commands::Save {
            project,
            file,
            expected_version,
            force_snapshot,
        } => {
            let request = SaveRequest {
                project: ProjectId(project),
                content: read_json(&file)?,
                actor,
                expected_version,
                force_snapshot,
            };
            print_json(&engine.save_diagram(request)?)
        }
        Commands::Versions {
            project,
            page,
            limit,
        } => {
            let limit = limit.unwrap_or(engine.config().default_page_size);
            print_json(&engine.get_versions(ProjectId(project), PageRequest::new(page, limit))?)
        }
        Commands::Restore { project, version } => {
            let restored = engine.restore_version(ProjectId(project), VersionId(version), &actor)?;
            print_json(&restored)
        }
        Commands::Export {
            project,
            engine: target,
        } => {
            let project = engine.get_project(ProjectId(project))?;
            let script = JsonExporter.export(&project.content, target.unwrap_or(project.engine_kind))?;
            println!("{}", script);
            Ok(())
        }
    }
}

fn owner(actor: &ActorId, team: Option<String>) -> Owner {
    match team {
        Some(team) => Owner::Team(team),
        None => Owner::User(actor.0.clone()),
    }
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        context: format!("failed to read '{}'", path.display()),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        context: format!("'{}' is not valid JSON", path.display()),
        source,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| CliError::Json {
        context: "failed to serialize output".into(),
        source,
    })?;
    println!("{}", json);
    Ok(())
}
