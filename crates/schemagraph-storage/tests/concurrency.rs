//! Racing saves: two writers holding the same observed version must never
//! both advance it.

use std::sync::{Arc, Barrier};
use std::thread;

use schemagraph_core::{DiagramGraph, EngineKind, Field, GraphMetadata, GraphNode, NodeKind};
use schemagraph_storage::{
    EngineError, InMemoryStore, NewProject, Owner, PageRequest, ProjectId, ProjectStore,
    SaveEngine, SaveRequest, SqliteStore,
};

const WRITERS: usize = 8;

fn graph_named(name: &str) -> DiagramGraph {
    let mut graph = DiagramGraph::new(GraphMetadata::for_engine(EngineKind::Mysql));
    graph
        .add_node(
            GraphNode::new(name, NodeKind::RelationalTable, name)
                .with_field(Field::new(format!("{name}.id"), "id", "INT").primary_key()),
        )
        .unwrap();
    graph
}

fn seed<S: ProjectStore>(engine: &SaveEngine<S>) -> ProjectId {
    engine
        .create_project(
            NewProject {
                name: "contended".into(),
                engine_kind: EngineKind::Mysql,
                owner: Owner::User("alice".into()),
                content: DiagramGraph::new(GraphMetadata::for_engine(EngineKind::Mysql)),
            },
            &"alice".into(),
        )
        .unwrap()
        .id
}

/// Spawns `WRITERS` threads that all save against version 0 at once.
fn race<S: ProjectStore + 'static>(engine: Arc<SaveEngine<S>>, project: ProjectId) -> Vec<Result<i64, EngineError>> {
    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let content = serde_json::to_value(graph_named(&format!("writer_{i}"))).unwrap();
                barrier.wait();
                engine
                    .save_diagram(
                        SaveRequest::new(project, content, format!("writer-{i}").as_str())
                            .expecting(0),
                    )
                    .map(|p| p.version)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_single_winner<S: ProjectStore>(engine: &SaveEngine<S>, project: ProjectId, results: &[Result<i64, EngineError>]) {
    let winners: Vec<i64> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(winners, vec![1], "exactly one writer must advance the version");

    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(result, Err(EngineError::Conflict { expected: 0, actual: 1, .. })),
            "losers must observe a conflict, got {result:?}"
        );
    }

    let stored = engine.get_project(project).unwrap();
    assert_eq!(stored.version, 1);
    let versions = engine
        .get_versions(project, PageRequest::new(1, 100))
        .unwrap();
    assert_eq!(versions.total, 1, "only the winning save may leave a backup");
}

#[test]
fn in_memory_race_has_one_winner() {
    let engine = Arc::new(SaveEngine::new(InMemoryStore::new()));
    let project = seed(&*engine);
    let results = race(Arc::clone(&engine), project);
    assert_single_winner(&*engine, project, &results);
}

#[test]
fn sqlite_file_race_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("race.db")).unwrap();
    let engine = Arc::new(SaveEngine::new(store));
    let project = seed(&*engine);
    let results = race(Arc::clone(&engine), project);
    assert_single_winner(&*engine, project, &results);
}

#[test]
fn different_projects_save_in_parallel() {
    let engine = Arc::new(SaveEngine::new(InMemoryStore::new()));
    let projects: Vec<ProjectId> = (0..WRITERS).map(|_| seed(&*engine)).collect();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = projects
        .iter()
        .copied()
        .map(|project| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let content = serde_json::to_value(graph_named("t")).unwrap();
                barrier.wait();
                engine.save_diagram(SaveRequest::new(project, content, "alice").expecting(0))
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap().version, 1);
    }
}
