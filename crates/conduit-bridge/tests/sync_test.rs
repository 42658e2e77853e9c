mod common;

use common::{PIPELINE, component, init_tracing, nested, pipeline};
use conduit_bridge::{SyncError, SyncOptions, graph_to_spec, spec_to_graph};
use conduit_canvas::{Edge, EditorConfig, NodeFlags, NodeKind, NodeManager};
use conduit_core::SpecError;
use conduit_core::annotations::{
    POSITION_ANNOTATION, Position, SDK_ANNOTATION, SDK_MARKER, read_position, write_position,
};
use conduit_core::rewrite::graph_of;
use conduit_core::spec::{ArgumentType, ComponentSpec};
use glam::Vec2;

fn derive(spec: &ComponentSpec) -> (conduit_canvas::GraphState, NodeManager) {
    let mut nodes = NodeManager::new();
    let view = spec_to_graph(spec, &mut nodes, &EditorConfig::default()).expect("derive view");
    (view, nodes)
}

fn without_positions(mut spec: ComponentSpec) -> ComponentSpec {
    for input in spec.inputs.iter_mut() {
        input.annotations.remove(POSITION_ANNOTATION);
    }
    for output in spec.outputs.iter_mut() {
        output.annotations.remove(POSITION_ANNOTATION);
    }
    if let Some(graph) = spec.graph_mut() {
        for task in graph.tasks.values_mut() {
            task.annotations.remove(POSITION_ANNOTATION);
        }
    }
    spec
}

#[test]
fn test_spec_to_graph_nodes_and_edges() {
    init_tracing();
    let spec = pipeline();
    let (view, _) = derive(&spec);

    assert_eq!(view.nodes.len(), 5);
    assert_eq!(view.edges.len(), 4);
    for id in ["input:dataset", "input:epochs", "task:Preprocess", "task:Train", "output:model"] {
        assert!(view.node(id).is_some(), "missing node {id}");
    }

    // Stored position wins, otherwise the fallback grid.
    assert_eq!(view.node("task:Train").unwrap().position, Vec2::new(100.0, 50.0));
    assert_eq!(view.node("task:Preprocess").unwrap().position, Vec2::new(300.0, 0.0));
    assert_eq!(view.node("input:epochs").unwrap().position, Vec2::new(0.0, 150.0));
    assert_eq!(view.node("output:model").unwrap().position, Vec2::new(1500.0, 0.0));

    let NodeKind::Task { handles, .. } = &view.node("task:Train").unwrap().kind else {
        panic!("expected task node");
    };
    let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["data", "epochs", "seed", "model", "metrics"]);

    let into_data: Vec<&Edge> = view
        .incoming("task:Train")
        .filter(|e| e.target_handle.as_deref() == Some("task:Train/in:data"))
        .collect();
    assert_eq!(into_data.len(), 1);
    assert_eq!(into_data[0].source, "task:Preprocess");
    assert_eq!(into_data[0].source_handle.as_deref(), Some("task:Preprocess/out:clean"));

    let into_output: Vec<&Edge> = view.incoming("output:model").collect();
    assert_eq!(into_output.len(), 1);
    assert_eq!(into_output[0].source, "task:Train");

    assert!(view.nodes.values().all(|n| !n.flags.contains(NodeFlags::INVALID)));
}

#[test]
fn test_node_ids_survive_rederivation() {
    let spec = pipeline();
    let mut nodes = NodeManager::new();
    let config = EditorConfig::default();
    let first = spec_to_graph(&spec, &mut nodes, &config).unwrap();
    let managed = nodes.len();
    let second = spec_to_graph(&spec, &mut nodes, &config).unwrap();

    let mut a: Vec<String> = first.nodes.values().map(|n| n.id.clone()).collect();
    let mut b: Vec<String> = second.nodes.values().map(|n| n.id.clone()).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(nodes.len(), managed);
}

#[test]
fn test_round_trip_preserves_spec() {
    let spec = pipeline();
    let (view, nodes) = derive(&spec);
    let options = SyncOptions {
        include_specs: true,
        include_positions: false,
    };
    let regenerated = graph_to_spec(&spec, &view, &nodes, &options).unwrap();

    let mut expected = without_positions(spec);
    expected
        .annotations_mut()
        .insert(SDK_ANNOTATION.to_string(), SDK_MARKER.to_string());
    assert_eq!(regenerated, expected);
}

#[test]
fn test_round_trip_with_editing_options() {
    let mut spec = pipeline();
    let placed = Position::new(100.3, 50.7).with_size(Some(240.5), Some(80.1));
    let train = spec.graph_mut().unwrap().tasks.get_mut("Train").unwrap();
    write_position(&mut train.annotations, placed);

    let (view, nodes) = derive(&spec);
    let mut regenerated = graph_to_spec(&spec, &view, &nodes, &SyncOptions::editing()).unwrap();

    // Stored placements come back exactly even though the view holds f32.
    let graph = graph_of(&regenerated).unwrap();
    assert_eq!(read_position(&graph.tasks["Train"].annotations), Some(placed));
    // Entities laid out on the grid gain a position.
    assert_eq!(
        read_position(&graph.tasks["Preprocess"].annotations),
        Some(Position::new(300.0, 0.0))
    );

    let sdk = regenerated.annotations_mut().remove(SDK_ANNOTATION);
    assert_eq!(sdk.as_deref(), Some(SDK_MARKER));
    regenerated.metadata = None;
    assert_eq!(without_positions(regenerated), without_positions(spec));
}

#[test]
fn test_positions_and_sizes_are_written() {
    let spec = pipeline();
    let (mut view, nodes) = derive(&spec);
    view.move_node("task:Train", Vec2::new(10.5, 20.0));
    view.set_measured("task:Train", Vec2::new(240.0, 80.0));

    let regenerated = graph_to_spec(&spec, &view, &nodes, &SyncOptions::editing()).unwrap();
    let graph = graph_of(&regenerated).unwrap();
    assert_eq!(
        read_position(&graph.tasks["Train"].annotations),
        Some(Position::new(10.5, 20.0).with_size(Some(240.0), Some(80.0)))
    );
    // Nodes laid out on the grid get their position materialized.
    assert_eq!(
        read_position(&graph.tasks["Preprocess"].annotations),
        Some(Position::new(300.0, 0.0))
    );
    assert!(read_position(&regenerated.inputs[0].annotations).is_some());
}

#[test]
fn test_edges_drive_reference_arguments() {
    let spec = pipeline();
    let (mut view, nodes) = derive(&spec);

    view.remove_edge("input:epochs:->task:Train:task:Train/in:epochs");
    view.insert_edge(Edge::new(
        "input:dataset",
        None,
        "task:Train",
        Some("task:Train/in:seed".to_string()),
    ));

    let regenerated = graph_to_spec(&spec, &view, &nodes, &SyncOptions::editing()).unwrap();
    let train = &graph_of(&regenerated).unwrap().tasks["Train"];
    assert!(!train.arguments.contains_key("epochs"));
    assert_eq!(train.arguments["seed"], ArgumentType::graph_input("dataset"));
    assert!(matches!(train.arguments["data"], ArgumentType::TaskOutput { .. }));
}

#[test]
fn test_dangling_reference_is_kept_and_flagged() {
    let mut spec = pipeline();
    let graph = spec.graph_mut().unwrap();
    graph
        .tasks
        .get_mut("Train")
        .unwrap()
        .arguments
        .insert("data".to_string(), ArgumentType::task_output("Ghost", "clean"));

    let (view, nodes) = derive(&spec);
    let train = view.node("task:Train").unwrap();
    assert!(train.flags.contains(NodeFlags::INVALID));
    assert_eq!(view.edges.len(), 3);

    let regenerated = graph_to_spec(&spec, &view, &nodes, &SyncOptions::editing()).unwrap();
    assert_eq!(
        graph_of(&regenerated).unwrap().tasks["Train"].arguments["data"],
        ArgumentType::task_output("Ghost", "clean")
    );
}

#[test]
fn test_missing_node_is_fatal() {
    let spec = pipeline();
    let (mut view, nodes) = derive(&spec);
    let key = view.node("task:Train").unwrap().key;
    view.remove_node(key);

    let error = graph_to_spec(&spec, &view, &nodes, &SyncOptions::editing()).unwrap_err();
    assert!(matches!(&error, SyncError::MissingTaskNode(id) if id == "Train"));
    assert_eq!(error.to_string(), "the nodes array does not have task node `Train`");

    let (mut view, nodes) = derive(&spec);
    let key = view.node("output:model").unwrap().key;
    view.remove_node(key);
    let error = graph_to_spec(&spec, &view, &nodes, &SyncOptions::editing()).unwrap_err();
    assert!(error.to_string().contains("model"));
}

#[test]
fn test_export_strips_ui_metadata() {
    let mut spec = pipeline();
    // Preprocess can only be described inline.
    spec.graph_mut()
        .unwrap()
        .tasks
        .get_mut("Preprocess")
        .unwrap()
        .component_ref
        .url = None;

    let (view, nodes) = derive(&spec);
    let exported = graph_to_spec(&spec, &view, &nodes, &SyncOptions::export()).unwrap();
    let graph = graph_of(&exported).unwrap();

    let train = &graph.tasks["Train"].component_ref;
    assert!(train.spec.is_none());
    assert_eq!(train.url.as_deref(), Some("https://components.test/train.yaml"));
    assert!(graph.tasks["Preprocess"].component_ref.spec.is_some());
    assert!(graph.tasks["Train"].annotations.is_empty());
    assert!(exported.inputs.iter().all(|i| i.annotations.is_empty()));
    assert_eq!(
        exported.annotations().and_then(|a| a.get(SDK_ANNOTATION)).map(String::as_str),
        Some(SDK_MARKER)
    );
}

#[test]
fn test_unresolved_reference_fails_fast() {
    let spec = component(PIPELINE);
    let mut nodes = NodeManager::new();
    let result = spec_to_graph(&spec, &mut nodes, &EditorConfig::default());
    assert!(matches!(
        result,
        Err(SyncError::Spec(SpecError::UnhydratedReference { task_id })) if task_id == "Preprocess"
    ));
}

#[test]
fn test_container_passes_through() {
    let spec = component(common::TRAIN);
    let (view, nodes) = derive(&spec);
    assert!(view.nodes.is_empty());
    let regenerated = graph_to_spec(&spec, &view, &nodes, &SyncOptions::export()).unwrap();
    assert_eq!(regenerated, spec);
}

#[test]
fn test_subgraph_tasks_are_flagged() {
    let (view, _) = derive(&nested());
    let outer = view.node("task:Outer").unwrap();
    assert!(outer.flags.contains(NodeFlags::SUBGRAPH));
}

#[test]
fn test_sync_options_presets() {
    assert_eq!(SyncOptions::default(), SyncOptions::editing());
    let export = SyncOptions::export();
    assert!(!export.include_specs && !export.include_positions);
    let parsed: SyncOptions = serde_json::from_str(r#"{"include_positions": false}"#).unwrap();
    assert!(parsed.include_specs);
    assert!(!parsed.include_positions);
}
