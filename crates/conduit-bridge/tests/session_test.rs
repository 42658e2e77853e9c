mod common;

use common::{PIPELINE, PREPROCESS, TRAIN, component, init_tracing, nested, pipeline};
use conduit_bridge::{EditorSession, SyncError, SyncOptions};
use conduit_canvas::{EditorCommand, EditorConfig, InputState, Key, NodeKind, RestoreMode};
use conduit_canvas::input::ModifiersState;
use conduit_core::annotations::{Position, SDK_ANNOTATION, read_position};
use conduit_core::resolver::{ComponentResolver, InMemoryLoader};
use conduit_core::rewrite::graph_of;
use conduit_core::spec::{ArgumentType, ComponentReference};
use conduit_core::store::InMemoryPipelineStore;
use conduit_core::SpecError;
use glam::Vec2;
use url::Url;

fn session() -> EditorSession {
    init_tracing();
    EditorSession::new(pipeline(), EditorConfig::default()).expect("session opens")
}

fn tasks(session: &EditorSession) -> Vec<String> {
    graph_of(session.root()).unwrap().tasks.keys().cloned().collect()
}

#[test]
fn test_rename_keeps_node_identity_and_selection() {
    let mut session = session();
    assert!(session.select("task:Preprocess", true));

    session.rename_task("Preprocess", "Clean").unwrap();

    let node = session.view().node("task:Preprocess").expect("node id is stable");
    assert!(node.is_selected());
    assert!(matches!(&node.kind, NodeKind::Task { task_id, .. } if task_id == "Clean"));
    assert_eq!(tasks(&session), vec!["Clean", "Train"]);
    let train = &graph_of(session.root()).unwrap().tasks["Train"];
    assert!(matches!(
        &train.arguments["data"],
        ArgumentType::TaskOutput { task_output } if task_output.task_id == "Clean"
    ));
    // The edge into Train still exists after the rename.
    assert_eq!(session.view().edges.len(), 4);

    assert!(session.undo().unwrap());
    assert_eq!(session.root(), &pipeline());
    assert!(session.can_redo());
    // The renamed mapping is released, so the original id comes back.
    assert!(session.view().node("task:Preprocess").unwrap().is_selected());
    assert_eq!(
        session.node_manager().find_node_id("Clean", conduit_canvas::NodeType::Task),
        None
    );

    assert!(session.redo().unwrap());
    assert_eq!(tasks(&session), vec!["Clean", "Train"]);
    assert!(!session.redo().unwrap());
}

#[test]
fn test_rename_to_existing_name_is_rejected() {
    let mut session = session();
    let result = session.rename_task("Preprocess", "Train");
    assert!(matches!(result, Err(SyncError::Spec(SpecError::NameTaken(_)))));
    assert!(!session.can_undo());
}

#[test]
fn test_delete_selection_and_undo() {
    let mut session = session();
    session.select("task:Train", true);

    assert_eq!(session.delete_selection().unwrap(), 1);
    assert_eq!(tasks(&session), vec!["Preprocess"]);
    assert!(graph_of(session.root()).unwrap().output_values.is_empty());
    assert!(session.view().node("task:Train").is_none());
    assert_eq!(session.view().edges.len(), 1);

    session.undo().unwrap();
    assert_eq!(session.root(), &pipeline());
    assert!(session.view().node("task:Train").is_some());
}

#[test]
fn test_delete_without_selection_is_noop() {
    let mut session = session();
    assert_eq!(session.delete_selection().unwrap(), 0);
    assert!(!session.can_undo());
}

#[test]
fn test_duplicate_selects_offset_copy() {
    let mut session = session();
    session.select("task:Train", true);

    let copies = session.duplicate_selection().unwrap();
    assert_eq!(copies, vec!["Train_copy"]);

    let copy = session.view().node("task:Train_copy").expect("copy node");
    assert!(copy.is_selected());
    assert_eq!(copy.position, Vec2::new(110.0, 60.0));
    assert!(!session.view().node("task:Train").unwrap().is_selected());

    let graph = graph_of(session.root()).unwrap();
    // External references of the copy still point at the originals.
    assert_eq!(graph.tasks["Train_copy"].arguments, graph.tasks["Train"].arguments);
}

#[test]
fn test_add_task_requires_hydrated_reference() {
    let mut session = session();
    let unresolved = ComponentReference {
        name: Some("Train".to_string()),
        url: Some("https://components.test/train.yaml".to_string()),
        ..Default::default()
    };
    let result = session.add_task(unresolved, None);
    assert!(matches!(result, Err(SyncError::Spec(SpecError::UnhydratedReference { .. }))));

    let task_id = session
        .add_task(ComponentReference::from_spec(component(TRAIN)), Some(Vec2::new(40.0, 400.0)))
        .unwrap();
    assert_eq!(task_id, "Train 2");
    let node_id = session
        .node_manager()
        .find_node_id(&task_id, conduit_canvas::NodeType::Task)
        .unwrap()
        .to_string();
    let node = session.view().node(&node_id).unwrap();
    assert!(node.is_selected());
    assert_eq!(node.position, Vec2::new(40.0, 400.0));
}

#[test]
fn test_connect_and_disconnect() {
    let mut session = session();

    session
        .connect("input:dataset", None, "task:Train", Some("task:Train/in:seed"))
        .unwrap();
    let train = &graph_of(session.root()).unwrap().tasks["Train"];
    assert_eq!(train.arguments["seed"], ArgumentType::graph_input("dataset"));
    let edge_id = "input:dataset:->task:Train:task:Train/in:seed";
    assert!(session.view().edges.values().any(|e| e.id == edge_id));

    session.disconnect(edge_id).unwrap();
    let train = &graph_of(session.root()).unwrap().tasks["Train"];
    assert!(!train.arguments.contains_key("seed"));

    let missing = session.disconnect(edge_id);
    assert!(matches!(missing, Err(SyncError::UnknownEdge(_))));
}

#[test]
fn test_connect_rejects_invalid_endpoints() {
    let mut session = session();

    let self_loop = session.connect(
        "task:Train",
        Some("task:Train/out:model"),
        "task:Train",
        Some("task:Train/in:data"),
    );
    assert!(matches!(self_loop, Err(SyncError::InvalidConnection { .. })));

    let wrong_handle = session.connect(
        "task:Preprocess",
        Some("task:Preprocess/in:data"),
        "task:Train",
        Some("task:Train/in:data"),
    );
    assert!(matches!(wrong_handle, Err(SyncError::InvalidConnection { .. })));

    let into_input = session.connect("input:dataset", None, "input:epochs", None);
    assert!(matches!(into_input, Err(SyncError::InvalidConnection { .. })));

    let foreign_handle = session.connect(
        "task:Train",
        Some("task:Preprocess/out:clean"),
        "output:model",
        None,
    );
    assert!(matches!(foreign_handle, Err(SyncError::InvalidConnection { .. })));
    assert_eq!(
        graph_of(session.root()).unwrap().output_values["model"],
        conduit_core::ArgumentSource::task_output("Train", "model")
    );
    assert!(!session.can_undo());
}

#[test]
fn test_connect_graph_output() {
    let mut session = session();
    session
        .connect("task:Train", Some("task:Train/out:metrics"), "output:model", None)
        .unwrap();
    let graph = graph_of(session.root()).unwrap();
    assert_eq!(
        graph.output_values["model"],
        conduit_core::ArgumentSource::task_output("Train", "metrics")
    );
}

#[test]
fn test_move_node_records_history() {
    let mut session = session();
    assert!(session.move_node("task:Preprocess", Vec2::new(5.0, 7.0)).unwrap());

    let graph = graph_of(session.root()).unwrap();
    assert_eq!(
        read_position(&graph.tasks["Preprocess"].annotations),
        Some(Position::new(5.0, 7.0))
    );
    assert!(session.can_undo());

    session.undo().unwrap();
    assert_eq!(session.view().node("task:Preprocess").unwrap().position, Vec2::new(300.0, 0.0));

    assert!(!session.move_node("task:Nope", Vec2::ZERO).unwrap());
}

#[test]
fn test_subgraph_navigation() {
    init_tracing();
    let mut session = EditorSession::new(nested(), EditorConfig::default()).unwrap();
    assert_eq!(session.view().nodes.len(), 1);

    let missing = session.enter_subgraph("Missing");
    assert!(matches!(missing, Err(SyncError::Spec(SpecError::TaskNotFound(_)))));

    session.enter_subgraph("Outer").unwrap();
    assert_eq!(session.navigator().task_path(), ["Outer".to_string()]);
    assert_eq!(session.view().nodes.len(), 5);
    assert!(!session.can_undo());

    let container = session.enter_subgraph("Preprocess");
    assert!(matches!(
        container,
        Err(SyncError::Spec(SpecError::InvalidSubgraphPath { .. }))
    ));

    let mut url = Url::parse("https://editor.test/pipelines/7?tab=graph").unwrap();
    session.write_url(&mut url);
    assert_eq!(url.query(), Some("tab=graph&subgraph=root%2COuter"));

    session.rename_task("Preprocess", "Clean").unwrap();
    let outer = graph_of(session.root()).unwrap().tasks["Outer"]
        .component_spec()
        .cloned()
        .unwrap();
    assert!(graph_of(&outer).unwrap().tasks.contains_key("Clean"));

    assert!(session.navigate_back().unwrap());
    assert!(session.navigator().is_root());
    assert_eq!(session.view().nodes.len(), 1);
    assert!(!session.navigate_back().unwrap());

    session.write_url(&mut url);
    assert_eq!(url.query(), Some("tab=graph"));
}

#[test]
fn test_failed_level_switch_keeps_session_usable() {
    init_tracing();
    // The nested graph still holds url-only references.
    let mut root = nested();
    root.graph_mut().unwrap().tasks.get_mut("Outer").unwrap().component_ref =
        ComponentReference::from_spec(component(PIPELINE));
    let mut session = EditorSession::new(root, EditorConfig::default()).unwrap();

    let entered = session.enter_subgraph("Outer");
    assert!(matches!(
        entered,
        Err(SyncError::Spec(SpecError::UnhydratedReference { task_id })) if task_id == "Preprocess"
    ));
    assert!(session.navigator().is_root());
    assert!(session.view().node("task:Outer").is_some());

    let jumped = session.navigate_to_path(vec!["root".to_string(), "Outer".to_string()]);
    assert!(jumped.is_err());
    assert!(session.navigator().is_root());

    assert!(!session.navigate_back().unwrap());
    assert!(session.export(&SyncOptions::editing()).is_ok());
    assert!(session.move_node("task:Outer", Vec2::new(1.0, 2.0)).unwrap());
}

#[test]
fn test_undo_leaves_vanished_subgraph() {
    init_tracing();
    let mut session = EditorSession::new(nested(), EditorConfig::default()).unwrap();
    session.add_task(ComponentReference::from_spec(pipeline()), None).unwrap();
    session.enter_subgraph("Training pipeline").unwrap();

    session.undo().unwrap();
    assert!(session.navigator().is_root());
    assert_eq!(session.view().nodes.len(), 1);
}

#[test]
fn test_rename_input_moves_parent_argument() {
    init_tracing();
    let mut session = EditorSession::new(nested(), EditorConfig::default()).unwrap();
    session
        .set_argument("Outer", "dataset", ArgumentType::literal("gs://bucket/data"))
        .unwrap();
    session.enter_subgraph("Outer").unwrap();

    session.rename_input("dataset", "source").unwrap();
    assert!(session.view().node("input:dataset").is_some());

    let outer = &graph_of(session.root()).unwrap().tasks["Outer"];
    assert!(!outer.arguments.contains_key("dataset"));
    assert_eq!(outer.arguments["source"], ArgumentType::literal("gs://bucket/data"));

    let inner = session.current_spec().unwrap();
    assert!(inner.input("source").is_some());
    assert_eq!(
        graph_of(inner).unwrap().tasks["Preprocess"].arguments["data"],
        ArgumentType::graph_input("source")
    );
}

#[test]
fn test_keyboard_shortcuts() {
    let mut session = session();
    let input = InputState {
        modifiers: ModifiersState {
            ctrl: true,
            ..Default::default()
        },
        pressed_keys: vec![Key::A, Key::Delete],
        event_consumed_by_content: false,
    };
    let commands = session.handle_input(&input).unwrap();
    assert_eq!(commands, vec![EditorCommand::SelectAll, EditorCommand::DeleteSelection]);
    assert!(tasks(&session).is_empty());
    assert!(session.root().inputs.is_empty());
    assert!(session.view().nodes.is_empty());

    let undo = InputState {
        modifiers: ModifiersState {
            ctrl: true,
            ..Default::default()
        },
        pressed_keys: vec![Key::Z],
        event_consumed_by_content: false,
    };
    session.handle_input(&undo).unwrap();
    assert_eq!(session.root(), &pipeline());

    let typing = InputState {
        pressed_keys: vec![Key::Delete],
        event_consumed_by_content: true,
        ..Default::default()
    };
    assert!(session.handle_input(&typing).unwrap().is_empty());
    assert_eq!(tasks(&session).len(), 2);
}

#[test]
fn test_export_options() {
    let session = session();

    let editing = session.export(&SyncOptions::editing()).unwrap();
    let graph = graph_of(&editing).unwrap();
    assert!(graph.tasks["Train"].component_ref.spec.is_some());
    assert!(read_position(&graph.tasks["Preprocess"].annotations).is_some());

    let compact = session.export(&SyncOptions::export()).unwrap();
    let graph = graph_of(&compact).unwrap();
    assert!(graph.tasks.values().all(|t| t.component_ref.spec.is_none()));
    assert!(graph.tasks.values().all(|t| t.annotations.is_empty()));
    assert!(compact.annotations().unwrap().contains_key(SDK_ANNOTATION));

    let yaml = session.export_yaml(&SyncOptions::export()).unwrap();
    assert!(yaml.contains("https://components.test/train.yaml"));
    assert!(!yaml.contains("editor.position"));

    // Exporting does not touch the session.
    assert_eq!(session.root(), &pipeline());
}

#[tokio::test]
async fn test_open_hydrates_references() {
    init_tracing();
    let mut loader = InMemoryLoader::new();
    loader.insert_url("https://components.test/preprocess.yaml", PREPROCESS);
    loader.insert_url("https://components.test/train.yaml", TRAIN);
    let resolver = ComponentResolver::new(loader);

    let session = EditorSession::open(&component(PIPELINE), EditorConfig::default(), &resolver)
        .await
        .unwrap();
    assert_eq!(session.view().nodes.len(), 5);
    assert_eq!(resolver.loader().fetch_count(), 2);
}

#[tokio::test]
async fn test_save_and_open_saved() {
    let mut session = session();
    session.move_node("task:Preprocess", Vec2::new(20.0, 30.0)).unwrap();
    let store = InMemoryPipelineStore::new();
    session.save(&store, "training").await.unwrap();

    let resolver = ComponentResolver::new(InMemoryLoader::new());
    let reopened = EditorSession::open_saved(&store, "training", EditorConfig::default(), &resolver)
        .await
        .unwrap()
        .expect("saved pipeline");
    assert_eq!(reopened.view().nodes.len(), 5);
    assert_eq!(
        reopened.view().node("task:Preprocess").unwrap().position,
        Vec2::new(20.0, 30.0)
    );
    assert_eq!(resolver.loader().fetch_count(), 0);

    let missing = EditorSession::open_saved(&store, "nothing", EditorConfig::default(), &resolver)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_restore_stepwise_runs_hook_per_level() {
    init_tracing();
    let mut session = EditorSession::new(nested(), EditorConfig::default()).unwrap();
    let url = Url::parse("https://editor.test/?subgraph=root,Outer").unwrap();

    let mut levels = Vec::new();
    session
        .restore_from_url(&url, RestoreMode::Stepwise, |level| {
            levels.push(level);
            async { Ok::<(), anyhow::Error>(()) }
        })
        .await
        .unwrap();

    assert_eq!(levels, vec![vec!["root".to_string(), "Outer".to_string()]]);
    assert_eq!(session.navigator().task_path(), ["Outer".to_string()]);
    assert_eq!(session.view().nodes.len(), 5);
}

#[tokio::test]
async fn test_restore_stepwise_stops_at_invalid_level() {
    let mut session = EditorSession::new(nested(), EditorConfig::default()).unwrap();
    let url = Url::parse("https://editor.test/?subgraph=root,Outer,Preprocess").unwrap();

    let mut calls = 0;
    let result = session
        .restore_from_url(&url, RestoreMode::Stepwise, |_| {
            calls += 1;
            async { Ok::<(), anyhow::Error>(()) }
        })
        .await;

    assert!(matches!(result, Err(SyncError::Restore(_))));
    assert_eq!(calls, 1);
    assert_eq!(session.navigator().task_path(), ["Outer".to_string()]);
}

#[tokio::test]
async fn test_restore_direct() {
    let mut session = EditorSession::new(nested(), EditorConfig::default()).unwrap();

    let invalid = Url::parse("https://editor.test/?subgraph=root,Nope").unwrap();
    let result = session
        .restore_from_url(&invalid, RestoreMode::Direct, |_| async { Ok::<(), anyhow::Error>(()) })
        .await;
    assert!(matches!(result, Err(SyncError::Spec(SpecError::InvalidSubgraphPath { .. }))));
    assert!(session.navigator().is_root());

    let valid = Url::parse("https://editor.test/?subgraph=root,Outer").unwrap();
    session
        .restore_from_url(&valid, RestoreMode::Direct, |_| async { Ok::<(), anyhow::Error>(()) })
        .await
        .unwrap();
    assert_eq!(session.navigator().task_path(), ["Outer".to_string()]);

    let none = Url::parse("https://editor.test/").unwrap();
    session
        .restore_from_url(&none, RestoreMode::Direct, |_| async { Ok::<(), anyhow::Error>(()) })
        .await
        .unwrap();
    assert_eq!(session.navigator().task_path(), ["Outer".to_string()]);
}
