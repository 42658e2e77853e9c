//! # Argument & Reference Rewriting
//!
//! Pure rewrites over a [`GraphSpec`] or [`ComponentSpec`]. Every function
//! takes the current value by reference and returns a new one; nothing is
//! mutated in place, so the caller can keep the previous value as an undo
//! snapshot.

use crate::annotations::{self, Position};
use crate::error::{SpecError, SpecResult};
use crate::naming::{generate_unique_duplicate_id, generate_unique_name};
use crate::spec::{
    Annotations, ArgumentSource, ArgumentType, CommandlineArgument, ComponentReference,
    ComponentSpec, GraphSpec, ImplementationType, InputSpec, OutputSpec, TaskSpec,
};
use std::collections::{BTreeMap, HashSet};

/// Borrows the graph of a component, failing for container components.
pub fn graph_of(spec: &ComponentSpec) -> SpecResult<&GraphSpec> {
    spec.graph()
        .ok_or_else(|| SpecError::NotAGraph(spec.display_name().to_string()))
}

/// Returns a copy of `spec` whose implementation is `graph`.
pub fn with_graph(spec: &ComponentSpec, graph: GraphSpec) -> ComponentSpec {
    ComponentSpec {
        implementation: ImplementationType::Graph(graph),
        ..spec.clone()
    }
}

fn task<'a>(graph: &'a GraphSpec, task_id: &str) -> SpecResult<&'a TaskSpec> {
    graph
        .tasks
        .get(task_id)
        .ok_or_else(|| SpecError::TaskNotFound(task_id.to_string()))
}

fn task_mut<'a>(graph: &'a mut GraphSpec, task_id: &str) -> SpecResult<&'a mut TaskSpec> {
    graph
        .tasks
        .get_mut(task_id)
        .ok_or_else(|| SpecError::TaskNotFound(task_id.to_string()))
}

// ---------------------------------------------------------------------------
// Graph inputs and outputs
// ---------------------------------------------------------------------------

/// Renames a component input and every reference to it.
///
/// Rewrites `graphInput` arguments and output values of a graph
/// implementation, or the `inputValue`/`inputPath`/`isPresent` placeholders of
/// a container implementation. Renaming to the same name is a no-op.
pub fn rename_input(spec: &ComponentSpec, old_name: &str, new_name: &str) -> SpecResult<ComponentSpec> {
    if old_name == new_name {
        return Ok(spec.clone());
    }
    if spec.input(new_name).is_some() {
        return Err(SpecError::NameTaken(new_name.to_string()));
    }

    let mut next = spec.clone();
    for input in next.inputs.iter_mut().filter(|i| i.name == old_name) {
        input.name = new_name.to_string();
    }

    match &mut next.implementation {
        ImplementationType::Graph(graph) => {
            for task in graph.tasks.values_mut() {
                for argument in task.arguments.values_mut() {
                    if let ArgumentType::GraphInput { graph_input } = argument
                        && graph_input.input_name == old_name
                    {
                        graph_input.input_name = new_name.to_string();
                    }
                }
            }
            for source in graph.output_values.values_mut() {
                if let ArgumentSource::GraphInput { graph_input } = source
                    && graph_input.input_name == old_name
                {
                    graph_input.input_name = new_name.to_string();
                }
            }
        }
        ImplementationType::Container(container) => {
            let rename = |arg: &mut CommandlineArgument| match arg {
                CommandlineArgument::InputValue { input_value: name }
                | CommandlineArgument::InputPath { input_path: name }
                | CommandlineArgument::IsPresent { is_present: name }
                    if *name == old_name =>
                {
                    *name = new_name.to_string();
                }
                _ => {}
            };
            for arg in container.command.iter_mut().chain(container.args.iter_mut()) {
                visit_placeholders(arg, &rename);
            }
        }
    }

    tracing::debug!(old_name, new_name, "Renamed input");
    Ok(next)
}

/// Renames a component output, its `outputValues` key, and any `outputPath`
/// placeholder of a container implementation.
pub fn rename_output(spec: &ComponentSpec, old_name: &str, new_name: &str) -> SpecResult<ComponentSpec> {
    if old_name == new_name {
        return Ok(spec.clone());
    }
    if spec.output(new_name).is_some() {
        return Err(SpecError::NameTaken(new_name.to_string()));
    }

    let mut next = spec.clone();
    for output in next.outputs.iter_mut().filter(|o| o.name == old_name) {
        output.name = new_name.to_string();
    }

    match &mut next.implementation {
        ImplementationType::Graph(graph) => {
            if let Some(source) = graph.output_values.remove(old_name) {
                graph.output_values.insert(new_name.to_string(), source);
            }
        }
        ImplementationType::Container(container) => {
            let rename = |arg: &mut CommandlineArgument| {
                if let CommandlineArgument::OutputPath { output_path } = arg
                    && *output_path == old_name
                {
                    *output_path = new_name.to_string();
                }
            };
            for arg in container.command.iter_mut().chain(container.args.iter_mut()) {
                visit_placeholders(arg, &rename);
            }
        }
    }

    tracing::debug!(old_name, new_name, "Renamed output");
    Ok(next)
}

fn visit_placeholders(arg: &mut CommandlineArgument, f: &impl Fn(&mut CommandlineArgument)) {
    match arg {
        CommandlineArgument::Concat { concat } => {
            for inner in concat {
                visit_placeholders(inner, f);
            }
        }
        CommandlineArgument::If { if_placeholder } => {
            visit_placeholders(&mut if_placeholder.cond, f);
            for inner in if_placeholder.then.iter_mut() {
                visit_placeholders(inner, f);
            }
            for inner in if_placeholder.otherwise.iter_mut().flatten() {
                visit_placeholders(inner, f);
            }
        }
        _ => f(arg),
    }
}

/// Appends a new input named after `base`, made unique among existing inputs.
pub fn add_graph_input(spec: &ComponentSpec, base: &str) -> (ComponentSpec, String) {
    let existing: HashSet<&str> = spec.inputs.iter().map(|i| i.name.as_str()).collect();
    let name = generate_unique_name(base, &existing);
    let mut next = spec.clone();
    next.inputs.push(InputSpec::new(name.clone()));
    (next, name)
}

/// Appends a new output named after `base`, made unique among existing outputs.
pub fn add_graph_output(spec: &ComponentSpec, base: &str) -> (ComponentSpec, String) {
    let existing: HashSet<&str> = spec.outputs.iter().map(|o| o.name.as_str()).collect();
    let name = generate_unique_name(base, &existing);
    let mut next = spec.clone();
    next.outputs.push(OutputSpec::new(name.clone()));
    (next, name)
}

/// Removes an input and every `graphInput` binding that pointed at it.
pub fn delete_graph_input(spec: &ComponentSpec, name: &str) -> ComponentSpec {
    let mut next = spec.clone();
    next.inputs.retain(|i| i.name != name);
    if let Some(graph) = next.graph_mut() {
        for task in graph.tasks.values_mut() {
            task.arguments.retain(|_, argument| {
                !matches!(argument, ArgumentType::GraphInput { graph_input } if graph_input.input_name == name)
            });
        }
        graph.output_values.retain(|_, source| {
            !matches!(source, ArgumentSource::GraphInput { graph_input } if graph_input.input_name == name)
        });
    }
    tracing::debug!(name, "Deleted graph input");
    next
}

/// Removes an output and its output value binding.
pub fn delete_graph_output(spec: &ComponentSpec, name: &str) -> ComponentSpec {
    let mut next = spec.clone();
    next.outputs.retain(|o| o.name != name);
    if let Some(graph) = next.graph_mut() {
        graph.output_values.remove(name);
    }
    tracing::debug!(name, "Deleted graph output");
    next
}

/// Binds (or rebinds) a graph output.
pub fn set_output_value(graph: &GraphSpec, output_name: &str, source: ArgumentSource) -> GraphSpec {
    let mut next = graph.clone();
    next.output_values.insert(output_name.to_string(), source);
    next
}

pub fn remove_output_value(graph: &GraphSpec, output_name: &str) -> GraphSpec {
    let mut next = graph.clone();
    next.output_values.remove(output_name);
    next
}

// ---------------------------------------------------------------------------
// Task arguments and annotations
// ---------------------------------------------------------------------------

/// Replaces the whole `arguments` map of one task.
pub fn replace_task_arguments(
    graph: &GraphSpec,
    task_id: &str,
    arguments: BTreeMap<String, ArgumentType>,
) -> SpecResult<GraphSpec> {
    let mut next = graph.clone();
    task_mut(&mut next, task_id)?.arguments = arguments;
    tracing::debug!(task_id, "Replaced task arguments");
    Ok(next)
}

/// Replaces the whole `annotations` map of one task.
pub fn replace_task_annotations(
    graph: &GraphSpec,
    task_id: &str,
    annotations: Annotations,
) -> SpecResult<GraphSpec> {
    let mut next = graph.clone();
    task_mut(&mut next, task_id)?.annotations = annotations;
    tracing::debug!(task_id, "Replaced task annotations");
    Ok(next)
}

/// Binds one task input. Used when an edge is connected.
pub fn set_argument(
    graph: &GraphSpec,
    task_id: &str,
    input_name: &str,
    argument: ArgumentType,
) -> SpecResult<GraphSpec> {
    let mut arguments = task(graph, task_id)?.arguments.clone();
    arguments.insert(input_name.to_string(), argument);
    replace_task_arguments(graph, task_id, arguments)
}

/// Unbinds one task input. Used when an edge is removed.
pub fn remove_argument(graph: &GraphSpec, task_id: &str, input_name: &str) -> SpecResult<GraphSpec> {
    let mut arguments = task(graph, task_id)?.arguments.clone();
    arguments.remove(input_name);
    replace_task_arguments(graph, task_id, arguments)
}

// ---------------------------------------------------------------------------
// Task lifecycle
// ---------------------------------------------------------------------------

/// Adds a task for `component_ref`, named after the component.
pub fn add_task(
    graph: &GraphSpec,
    component_ref: ComponentReference,
    position: Option<Position>,
) -> (GraphSpec, String) {
    let base = component_ref
        .spec
        .as_ref()
        .and_then(|s| s.name.clone())
        .or_else(|| component_ref.name.clone())
        .unwrap_or_else(|| "Task".to_string());
    let existing: HashSet<&str> = graph.tasks.keys().map(String::as_str).collect();
    let task_id = generate_unique_name(&base, &existing);

    let mut task = TaskSpec::new(component_ref);
    if let Some(position) = position {
        annotations::write_position(&mut task.annotations, position);
    }

    let mut next = graph.clone();
    next.tasks.insert(task_id.clone(), task);
    tracing::debug!(task_id = %task_id, "Added task");
    (next, task_id)
}

/// Removes tasks and prunes every argument and output value that consumed
/// one of their outputs.
pub fn delete_tasks(graph: &GraphSpec, task_ids: &[String]) -> GraphSpec {
    let doomed: HashSet<&str> = task_ids.iter().map(String::as_str).collect();
    let mut next = graph.clone();
    next.tasks.retain(|id, _| !doomed.contains(id.as_str()));
    for task in next.tasks.values_mut() {
        task.arguments.retain(|_, argument| {
            !matches!(argument, ArgumentType::TaskOutput { task_output } if doomed.contains(task_output.task_id.as_str()))
        });
    }
    next.output_values.retain(|_, source| {
        !matches!(source, ArgumentSource::TaskOutput { task_output } if doomed.contains(task_output.task_id.as_str()))
    });
    tracing::debug!(count = doomed.len(), "Deleted tasks");
    next
}

/// Renames a task and rewrites every `taskOutput` reference to it.
pub fn rename_task(graph: &GraphSpec, old_id: &str, new_id: &str) -> SpecResult<GraphSpec> {
    if old_id == new_id {
        task(graph, old_id)?;
        return Ok(graph.clone());
    }
    if graph.tasks.contains_key(new_id) {
        return Err(SpecError::NameTaken(new_id.to_string()));
    }

    let mut next = graph.clone();
    let moved = next
        .tasks
        .remove(old_id)
        .ok_or_else(|| SpecError::TaskNotFound(old_id.to_string()))?;
    next.tasks.insert(new_id.to_string(), moved);

    for task in next.tasks.values_mut() {
        for argument in task.arguments.values_mut() {
            if let ArgumentType::TaskOutput { task_output } = argument
                && task_output.task_id == old_id
            {
                task_output.task_id = new_id.to_string();
            }
        }
    }
    for source in next.output_values.values_mut() {
        if let ArgumentSource::TaskOutput { task_output } = source
            && task_output.task_id == old_id
        {
            task_output.task_id = new_id.to_string();
        }
    }

    tracing::debug!(old_id, new_id, "Renamed task");
    Ok(next)
}

/// Result of [`duplicate_tasks`].
#[derive(Debug, Clone)]
pub struct Duplication {
    pub graph: GraphSpec,
    /// Original task id -> duplicate task id, in selection order.
    pub id_map: Vec<(String, String)>,
}

impl Duplication {
    pub fn duplicate_of(&self, original: &str) -> Option<&str> {
        self.id_map
            .iter()
            .find(|(from, _)| from == original)
            .map(|(_, to)| to.as_str())
    }
}

/// Duplicates the selected tasks as a unit.
///
/// Each duplicate gets a fresh `_copy` id and its position is shifted by
/// `offset`. A `taskOutput` argument is redirected to a duplicate only when
/// the task holding the argument is itself a duplicate; tasks outside the
/// selection keep pointing at the originals.
pub fn duplicate_tasks(
    graph: &GraphSpec,
    selected: &[String],
    offset: (f64, f64),
) -> SpecResult<Duplication> {
    let mut taken: HashSet<String> = graph.tasks.keys().cloned().collect();
    let mut id_map: Vec<(String, String)> = Vec::with_capacity(selected.len());
    for original in selected {
        task(graph, original)?;
        if id_map.iter().any(|(from, _)| from == original) {
            continue;
        }
        let duplicate = generate_unique_duplicate_id(original, &taken);
        taken.insert(duplicate.clone());
        id_map.push((original.clone(), duplicate));
    }

    let lookup: BTreeMap<&str, &str> = id_map
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();

    let mut next = graph.clone();
    for (original, duplicate) in &id_map {
        let mut copy = task(graph, original)?.clone();
        for argument in copy.arguments.values_mut() {
            if let ArgumentType::TaskOutput { task_output } = argument
                && let Some(target) = lookup.get(task_output.task_id.as_str())
            {
                task_output.task_id = target.to_string();
            }
        }
        if let Some(position) = annotations::read_position(&copy.annotations) {
            annotations::write_position(&mut copy.annotations, position.offset(offset.0, offset.1));
        }
        next.tasks.insert(duplicate.clone(), copy);
    }

    tracing::debug!(count = id_map.len(), "Duplicated tasks");
    Ok(Duplication { graph: next, id_map })
}

// ---------------------------------------------------------------------------
// Component upgrade
// ---------------------------------------------------------------------------

/// A binding in another task that consumes an output the upgraded component
/// no longer has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedConsumer {
    pub task_id: String,
    pub input_name: String,
    pub output_name: String,
}

/// Result of [`upgrade_task`].
#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    pub graph: GraphSpec,
    /// Argument names dropped from the upgraded task, sorted.
    pub lost_arguments: Vec<String>,
    /// Downstream bindings left dangling; validation will flag them.
    pub orphaned_consumers: Vec<OrphanedConsumer>,
}

fn lost_arguments(task: &TaskSpec, new_spec: &ComponentSpec) -> Vec<String> {
    task.arguments
        .keys()
        .filter(|name| new_spec.input(name).is_none())
        .cloned()
        .collect()
}

/// Lists the arguments an upgrade would drop, without applying it.
pub fn preview_upgrade(
    graph: &GraphSpec,
    task_id: &str,
    new_ref: &ComponentReference,
) -> SpecResult<Vec<String>> {
    let new_spec = new_ref
        .spec
        .as_deref()
        .ok_or_else(|| SpecError::UnhydratedReference {
            task_id: task_id.to_string(),
        })?;
    Ok(lost_arguments(task(graph, task_id)?, new_spec))
}

/// Swaps a task's component reference, dropping arguments bound to inputs
/// the new component does not declare.
pub fn upgrade_task(
    graph: &GraphSpec,
    task_id: &str,
    new_ref: ComponentReference,
) -> SpecResult<UpgradeOutcome> {
    let new_spec = new_ref
        .spec
        .as_deref()
        .ok_or_else(|| SpecError::UnhydratedReference {
            task_id: task_id.to_string(),
        })?;
    let current = task(graph, task_id)?;
    let lost = lost_arguments(current, new_spec);

    let mut orphaned_consumers = Vec::new();
    for (consumer_id, consumer) in &graph.tasks {
        for (input_name, argument) in &consumer.arguments {
            if let ArgumentType::TaskOutput { task_output } = argument
                && task_output.task_id == task_id
                && new_spec.output(&task_output.output_name).is_none()
            {
                orphaned_consumers.push(OrphanedConsumer {
                    task_id: consumer_id.clone(),
                    input_name: input_name.clone(),
                    output_name: task_output.output_name.clone(),
                });
            }
        }
    }

    let mut upgraded = current.clone();
    upgraded.arguments.retain(|name, _| !lost.contains(name));
    upgraded.component_ref = new_ref;

    let mut next = graph.clone();
    next.tasks.insert(task_id.to_string(), upgraded);

    if !lost.is_empty() {
        tracing::warn!(task_id, lost = ?lost, "Upgrade dropped arguments");
    }
    Ok(UpgradeOutcome {
        graph: next,
        lost_arguments: lost,
        orphaned_consumers,
    })
}
