//! Addressing nested graph implementations by a path of task ids.
//!
//! A path is the list of task ids walked from the root component; the empty
//! path addresses the root itself.

use crate::error::{SpecError, SpecResult};
use crate::rewrite::{graph_of, with_graph};
use crate::spec::{ComponentSpec, TaskSpec, is_graph_implementation};

/// True when entering the task would open a nested graph.
pub fn is_subgraph_task(task: &TaskSpec) -> bool {
    task.component_spec()
        .is_some_and(|spec| is_graph_implementation(&spec.implementation))
}

fn enter<'a>(spec: &'a ComponentSpec, segment: &str) -> SpecResult<&'a ComponentSpec> {
    let invalid = || SpecError::InvalidSubgraphPath {
        segment: segment.to_string(),
    };
    let task = graph_of(spec)
        .map_err(|_| invalid())?
        .tasks
        .get(segment)
        .ok_or_else(invalid)?;
    let nested = task
        .component_spec()
        .ok_or_else(|| SpecError::UnhydratedReference {
            task_id: segment.to_string(),
        })?;
    if !is_graph_implementation(&nested.implementation) {
        return Err(invalid());
    }
    Ok(nested)
}

/// Resolves the component spec addressed by `task_path`.
pub fn subgraph_spec<'a>(root: &'a ComponentSpec, task_path: &[String]) -> SpecResult<&'a ComponentSpec> {
    task_path
        .iter()
        .try_fold(root, |spec, segment| enter(spec, segment))
}

/// Returns a copy of `root` with the component at `task_path` replaced by
/// `replacement`. Every ancestor on the path is copied; siblings are shared
/// by value.
pub fn replace_subgraph_spec(
    root: &ComponentSpec,
    task_path: &[String],
    replacement: ComponentSpec,
) -> SpecResult<ComponentSpec> {
    let Some((segment, rest)) = task_path.split_first() else {
        return Ok(replacement);
    };

    let nested = enter(root, segment)?;
    let updated_nested = replace_subgraph_spec(nested, rest, replacement)?;

    let mut graph = graph_of(root)?.clone();
    if let Some(task) = graph.tasks.get_mut(segment) {
        // The stored text and digest described the unedited component.
        task.component_ref.text = None;
        task.component_ref.digest = None;
        task.component_ref.spec = Some(Box::new(updated_nested));
    }
    Ok(with_graph(root, graph))
}
