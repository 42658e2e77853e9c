//! # Graph ⇄ Spec Synchronization
//!
//! `spec_to_graph` derives the visual graph from a component spec. It never
//! mutates the spec; node ids come from the [`NodeManager`] so they survive
//! re-derivation.
//!
//! `graph_to_spec` regenerates the spec from the visual graph. Positions and
//! edges are read back from the view. Everything the view does not
//! represent is carried over from the previous spec: literal arguments,
//! annotations, execution options, and references whose source is not in the
//! graph.

use crate::error::{SyncError, SyncResult};
use conduit_canvas::{
    Edge, EditorConfig, GraphState, Handle, HandleKind, Node, NodeFlags, NodeKind, NodeManager, NodeType,
};
use conduit_core::SpecError;
use conduit_core::annotations::{self, POSITION_ANNOTATION, Position, SDK_ANNOTATION, SDK_MARKER};
use conduit_core::spec::{
    Annotations, ArgumentSource, ArgumentType, ComponentSpec, GraphSpec, ImplementationType, TaskSpec,
    is_discoverable_component_reference, is_graph_implementation,
};
use conduit_core::subgraph::is_subgraph_task;
use conduit_core::validation::validate_graph;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Controls what a regenerated spec carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Keep resolved component specs embedded in task references. When
    /// false, references that can be fetched again are reduced to
    /// `name`/`url`/`digest`. A reference with neither a url nor a valid
    /// digest keeps its inline spec (only `text` is dropped).
    pub include_specs: bool,
    /// Write `editor.position` annotations. When false they are removed.
    pub include_positions: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::editing()
    }
}

impl SyncOptions {
    /// Everything kept; used while editing and for local saves.
    pub fn editing() -> Self {
        Self {
            include_specs: true,
            include_positions: true,
        }
    }

    /// Compact artifact without UI metadata.
    pub fn export() -> Self {
        Self {
            include_specs: false,
            include_positions: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Spec -> visual graph
// ---------------------------------------------------------------------------

fn place(node: &mut Node, annotations: &Annotations) {
    if let Some(position) = annotations::read_position(annotations) {
        node.position = Vec2::new(position.x as f32, position.y as f32);
        node.measured = match (position.width, position.height) {
            (Some(width), Some(height)) => Some(Vec2::new(width as f32, height as f32)),
            _ => None,
        };
    }
}

fn task_handles(nodes: &mut NodeManager, task_id: &str, component: &ComponentSpec) -> Vec<Handle> {
    let inputs = component.inputs.iter().map(|i| (i.name.as_str(), HandleKind::Input));
    let outputs = component.outputs.iter().map(|o| (o.name.as_str(), HandleKind::Output));
    inputs
        .chain(outputs)
        .map(|(name, kind)| Handle {
            id: nodes.get_task_handle_node_id(task_id, name, kind),
            name: name.to_string(),
            kind,
        })
        .collect()
}

fn node_of<'a>(state: &'a GraphState, nodes: &NodeManager, ref_id: &str, node_type: NodeType) -> Option<&'a Node> {
    state.node(nodes.find_node_id(ref_id, node_type)?)
}

fn task_handle_id(
    state: &GraphState,
    nodes: &NodeManager,
    task_id: &str,
    name: &str,
    kind: HandleKind,
) -> Option<String> {
    match &node_of(state, nodes, task_id, NodeType::Task)?.kind {
        NodeKind::Task { handles, .. } => handles
            .iter()
            .find(|h| h.kind == kind && h.name == name)
            .map(|h| h.id.clone()),
        _ => None,
    }
}

/// Visual endpoint of an argument source: the node id and, for task outputs,
/// the output handle id. `None` when the source is not in the graph.
fn source_endpoint(
    state: &GraphState,
    nodes: &NodeManager,
    source: &ArgumentSource,
) -> Option<(String, Option<String>)> {
    match source {
        ArgumentSource::TaskOutput { task_output } => {
            let handle = task_handle_id(
                state,
                nodes,
                &task_output.task_id,
                &task_output.output_name,
                HandleKind::Output,
            )?;
            let node = node_of(state, nodes, &task_output.task_id, NodeType::Task)?;
            Some((node.id.clone(), Some(handle)))
        }
        ArgumentSource::GraphInput { graph_input } => {
            let node = node_of(state, nodes, &graph_input.input_name, NodeType::Input)?;
            Some((node.id.clone(), None))
        }
    }
}

/// Derives the visual graph of `spec`.
///
/// Every task must carry its resolved component spec; an unresolved
/// reference fails with [`SpecError::UnhydratedReference`]. Container
/// implementations yield an empty graph. Nodes without a stored position are
/// laid out on the fallback grid of `config`.
#[tracing::instrument(skip_all, fields(component = spec.display_name()))]
pub fn spec_to_graph(spec: &ComponentSpec, nodes: &mut NodeManager, config: &EditorConfig) -> SyncResult<GraphState> {
    let mut state = GraphState::default();
    let Some(graph) = spec.graph() else {
        tracing::debug!("Container implementation has no graph to show");
        return Ok(state);
    };

    let flagged: HashSet<String> = validate_graph(spec)
        .iter()
        .filter_map(|issue| issue.task_id().map(str::to_string))
        .collect();

    for (row, input) in spec.inputs.iter().enumerate() {
        let id = nodes.get_node_id(&input.name, NodeType::Input);
        let kind = NodeKind::Input {
            name: input.name.clone(),
        };
        let mut node = Node::new(id, kind, &input.name, config.grid_position(0, row));
        place(&mut node, &input.annotations);
        state.insert_node(node);
    }

    for (index, (task_id, task)) in graph.tasks.iter().enumerate() {
        let component = task
            .component_spec()
            .ok_or_else(|| SpecError::UnhydratedReference {
                task_id: task_id.clone(),
            })?;
        let handles = task_handles(nodes, task_id, component);
        let id = nodes.get_node_id(task_id, NodeType::Task);
        let kind = NodeKind::Task {
            task_id: task_id.clone(),
            handles,
        };
        let mut node = Node::new(id, kind, task_id, config.task_grid_position(index));
        place(&mut node, &task.annotations);
        node.flags.set(NodeFlags::SUBGRAPH, is_subgraph_task(task));
        node.flags.set(NodeFlags::INVALID, flagged.contains(task_id));
        state.insert_node(node);
    }

    let output_column = 1 + config.layout_columns.max(1);
    for (row, output) in spec.outputs.iter().enumerate() {
        let id = nodes.get_node_id(&output.name, NodeType::Output);
        let kind = NodeKind::Output {
            name: output.name.clone(),
        };
        let mut node = Node::new(id, kind, &output.name, config.grid_position(output_column, row));
        place(&mut node, &output.annotations);
        state.insert_node(node);
    }

    let mut edges = Vec::new();
    for (task_id, task) in &graph.tasks {
        let Some(target) = node_of(&state, nodes, task_id, NodeType::Task) else {
            continue;
        };
        for (input_name, argument) in &task.arguments {
            let Some(source) = argument.source() else {
                continue;
            };
            let endpoints = source_endpoint(&state, nodes, &source).zip(task_handle_id(
                &state,
                nodes,
                task_id,
                input_name,
                HandleKind::Input,
            ));
            if let Some(((source_id, source_handle), target_handle)) = endpoints {
                edges.push(Edge::new(source_id, source_handle, &target.id, Some(target_handle)));
            }
        }
    }
    for (output_name, source) in &graph.output_values {
        let target = node_of(&state, nodes, output_name, NodeType::Output);
        if let (Some(target), Some((source_id, source_handle))) = (target, source_endpoint(&state, nodes, source)) {
            edges.push(Edge::new(source_id, source_handle, &target.id, None));
        }
    }
    for edge in edges {
        state.insert_edge(edge);
    }

    tracing::debug!(nodes = state.nodes.len(), edges = state.edges.len(), "Derived visual graph");
    Ok(state)
}

// ---------------------------------------------------------------------------
// Visual graph -> spec
// ---------------------------------------------------------------------------

/// Placement of `node`. The view holds `f32` coordinates, so a stored
/// position the node still shows is written back unchanged.
fn node_position(node: &Node, stored: Option<Position>) -> Position {
    let unchanged = |p: &Position| {
        p.x as f32 == node.position.x
            && p.y as f32 == node.position.y
            && p.width.zip(p.height).map(|(w, h)| Vec2::new(w as f32, h as f32)) == node.measured
    };
    match stored {
        Some(stored) if unchanged(&stored) => stored,
        _ => Position::new(node.position.x as f64, node.position.y as f64).with_size(
            node.measured.map(|size| size.x as f64),
            node.measured.map(|size| size.y as f64),
        ),
    }
}

/// The source an edge stands for, read back through the identity manager so
/// renamed entities report their current ids.
fn edge_source(state: &GraphState, nodes: &NodeManager, edge: &Edge) -> Option<ArgumentSource> {
    state.node(&edge.source)?;
    match nodes.get_ref_id(&edge.source)? {
        (NodeType::Task, _) => {
            let info = nodes.get_handle_info(edge.source_handle.as_deref()?)?;
            (info.kind == HandleKind::Output).then(|| ArgumentSource::task_output(info.task_id, info.handle_name))
        }
        (NodeType::Input, name) => Some(ArgumentSource::graph_input(name)),
        (NodeType::Output, _) => None,
    }
}

fn same_source(a: &ArgumentSource, b: &ArgumentSource) -> bool {
    match (a, b) {
        (ArgumentSource::TaskOutput { task_output: a }, ArgumentSource::TaskOutput { task_output: b }) => {
            a.task_id == b.task_id && a.output_name == b.output_name
        }
        (ArgumentSource::GraphInput { graph_input: a }, ArgumentSource::GraphInput { graph_input: b }) => {
            a.input_name == b.input_name
        }
        _ => false,
    }
}

/// Keeps `existing` when it already names `source` (it may carry a type).
fn prefer_existing(existing: Option<&ArgumentSource>, source: ArgumentSource) -> ArgumentSource {
    match existing {
        Some(existing) if same_source(existing, &source) => existing.clone(),
        _ => source,
    }
}

fn rebuild_arguments(
    task: &TaskSpec,
    node: &Node,
    state: &GraphState,
    nodes: &NodeManager,
) -> BTreeMap<String, ArgumentType> {
    let NodeKind::Task { handles, .. } = &node.kind else {
        return task.arguments.clone();
    };
    let is_managed = |name: &str| {
        handles
            .iter()
            .any(|h| h.kind == HandleKind::Input && h.name == name)
    };

    // Arguments the view cannot express survive as they are.
    let mut arguments: BTreeMap<String, ArgumentType> = task
        .arguments
        .iter()
        .filter(|(name, argument)| match argument.source() {
            None => true,
            Some(source) => !is_managed(name) || source_endpoint(state, nodes, &source).is_none(),
        })
        .map(|(name, argument)| (name.clone(), argument.clone()))
        .collect();

    for handle in handles.iter().filter(|h| h.kind == HandleKind::Input) {
        let source = state
            .incoming(&node.id)
            .filter(|edge| edge.target_handle.as_deref() == Some(handle.id.as_str()))
            .find_map(|edge| edge_source(state, nodes, edge));
        if let Some(source) = source {
            let existing = task.arguments.get(&handle.name).and_then(ArgumentType::source);
            let argument = ArgumentType::from(prefer_existing(existing.as_ref(), source));
            arguments.insert(handle.name.clone(), argument);
        }
    }
    arguments
}

fn rebuild_output_values(
    spec: &ComponentSpec,
    graph: &GraphSpec,
    state: &GraphState,
    nodes: &NodeManager,
) -> BTreeMap<String, ArgumentSource> {
    let mut values: BTreeMap<String, ArgumentSource> = graph
        .output_values
        .iter()
        .filter(|(name, source)| {
            node_of(state, nodes, name, NodeType::Output).is_none()
                || source_endpoint(state, nodes, source).is_none()
        })
        .map(|(name, source)| (name.clone(), source.clone()))
        .collect();

    for output in &spec.outputs {
        let Some(node) = node_of(state, nodes, &output.name, NodeType::Output) else {
            continue;
        };
        let source = state
            .incoming(&node.id)
            .find_map(|edge| edge_source(state, nodes, edge));
        if let Some(source) = source {
            let value = prefer_existing(graph.output_values.get(&output.name), source);
            values.insert(output.name.clone(), value);
        }
    }
    values
}

/// Reads positions and edges from the view into a copy of `spec`, keeping
/// embedded specs and without stamping provenance.
pub(crate) fn rebuild_from_view(
    spec: &ComponentSpec,
    state: &GraphState,
    nodes: &NodeManager,
) -> SyncResult<ComponentSpec> {
    let Some(graph) = spec.graph() else {
        return Ok(spec.clone());
    };
    let mut next = spec.clone();

    for input in next.inputs.iter_mut() {
        let node = node_of(state, nodes, &input.name, NodeType::Input)
            .ok_or_else(|| SyncError::MissingInputNode(input.name.clone()))?;
        let position = node_position(node, annotations::read_position(&input.annotations));
        annotations::write_position(&mut input.annotations, position);
    }
    for output in next.outputs.iter_mut() {
        let node = node_of(state, nodes, &output.name, NodeType::Output)
            .ok_or_else(|| SyncError::MissingOutputNode(output.name.clone()))?;
        let position = node_position(node, annotations::read_position(&output.annotations));
        annotations::write_position(&mut output.annotations, position);
    }

    let mut tasks = BTreeMap::new();
    for (task_id, task) in &graph.tasks {
        let node = node_of(state, nodes, task_id, NodeType::Task)
            .ok_or_else(|| SyncError::MissingTaskNode(task_id.clone()))?;
        let arguments = rebuild_arguments(task, node, state, nodes);
        let mut task = task.clone();
        task.arguments = arguments;
        let position = node_position(node, annotations::read_position(&task.annotations));
        annotations::write_position(&mut task.annotations, position);
        tasks.insert(task_id.clone(), task);
    }

    let output_values = rebuild_output_values(spec, graph, state, nodes);
    next.implementation = ImplementationType::Graph(GraphSpec { tasks, output_values });
    Ok(next)
}

fn apply_options(spec: &ComponentSpec, options: &SyncOptions) -> ComponentSpec {
    let mut next = spec.clone();
    if !options.include_positions {
        for input in next.inputs.iter_mut() {
            input.annotations.remove(POSITION_ANNOTATION);
        }
        for output in next.outputs.iter_mut() {
            output.annotations.remove(POSITION_ANNOTATION);
        }
    }
    let Some(graph) = next.graph_mut() else {
        return next;
    };
    for (task_id, task) in graph.tasks.iter_mut() {
        if !options.include_positions {
            task.annotations.remove(POSITION_ANNOTATION);
        }
        if !options.include_specs {
            if is_discoverable_component_reference(&task.component_ref) {
                task.component_ref = task.component_ref.stripped();
            } else {
                tracing::debug!(task_id = %task_id, "Keeping inline spec of a reference that cannot be fetched");
                task.component_ref.text = None;
            }
        }
        if let Some(nested) = task.component_ref.spec.as_mut()
            && is_graph_implementation(&nested.implementation)
        {
            **nested = apply_options(nested, options);
        }
    }
    next
}

/// Applies `options` to an already regenerated spec and stamps provenance
/// into `metadata.annotations`. Container implementations pass through
/// unchanged.
pub fn export_spec(spec: &ComponentSpec, options: &SyncOptions) -> ComponentSpec {
    if !is_graph_implementation(&spec.implementation) {
        return spec.clone();
    }
    let mut next = apply_options(spec, options);
    next.annotations_mut()
        .insert(SDK_ANNOTATION.to_string(), SDK_MARKER.to_string());
    next
}

/// Regenerates `spec` from the visual graph.
///
/// Every input, output and task of `spec` must have its node in `state`; a
/// missing node is an internal inconsistency and aborts with an error naming
/// the entity. Container implementations pass through unchanged.
#[tracing::instrument(skip_all, fields(component = spec.display_name()))]
pub fn graph_to_spec(
    spec: &ComponentSpec,
    state: &GraphState,
    nodes: &NodeManager,
    options: &SyncOptions,
) -> SyncResult<ComponentSpec> {
    if !is_graph_implementation(&spec.implementation) {
        return Ok(spec.clone());
    }
    let rebuilt = rebuild_from_view(spec, state, nodes)?;
    Ok(export_spec(&rebuilt, options))
}
