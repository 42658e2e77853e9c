//! Referential checks over a graph.
//!
//! Dangling references are a normal transient state while editing (a task was
//! deleted, a component was upgraded). They are reported here so the UI can
//! flag them; nothing in the core refuses to store them.

use crate::spec::{ArgumentType, ComponentSpec, GraphSpec};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// `taskOutput` names a task that is not in the graph.
    MissingTask {
        task_id: String,
        input_name: String,
        referenced_task: String,
    },
    /// `taskOutput` names an output the referenced component does not declare.
    MissingTaskOutput {
        task_id: String,
        input_name: String,
        referenced_task: String,
        output_name: String,
    },
    /// `graphInput` names an input the enclosing component does not declare.
    MissingGraphInput { task_id: String, input_name: String, graph_input: String },
    /// A graph output is bound to something that does not exist.
    DanglingOutputValue { output_name: String },
    /// A graph output is declared but never bound.
    UnboundOutput { output_name: String },
    /// A required input of a task has no argument.
    MissingRequiredArgument { task_id: String, input_name: String },
    /// A task's component reference has no resolved spec.
    UnresolvedComponent { task_id: String },
}

impl ValidationIssue {
    /// The task the issue is attached to, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            ValidationIssue::MissingTask { task_id, .. }
            | ValidationIssue::MissingTaskOutput { task_id, .. }
            | ValidationIssue::MissingGraphInput { task_id, .. }
            | ValidationIssue::MissingRequiredArgument { task_id, .. }
            | ValidationIssue::UnresolvedComponent { task_id } => Some(task_id),
            ValidationIssue::DanglingOutputValue { .. } | ValidationIssue::UnboundOutput { .. } => None,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingTask {
                task_id,
                input_name,
                referenced_task,
            } => write!(
                f,
                "Argument '{input_name}' of task '{task_id}' references missing task '{referenced_task}'"
            ),
            ValidationIssue::MissingTaskOutput {
                task_id,
                input_name,
                referenced_task,
                output_name,
            } => write!(
                f,
                "Argument '{input_name}' of task '{task_id}' references missing output '{output_name}' of task '{referenced_task}'"
            ),
            ValidationIssue::MissingGraphInput {
                task_id,
                input_name,
                graph_input,
            } => write!(
                f,
                "Argument '{input_name}' of task '{task_id}' references missing graph input '{graph_input}'"
            ),
            ValidationIssue::DanglingOutputValue { output_name } => {
                write!(f, "Graph output '{output_name}' is bound to a missing source")
            }
            ValidationIssue::UnboundOutput { output_name } => {
                write!(f, "Graph output '{output_name}' is not bound")
            }
            ValidationIssue::MissingRequiredArgument { task_id, input_name } => {
                write!(f, "Required input '{input_name}' of task '{task_id}' has no argument")
            }
            ValidationIssue::UnresolvedComponent { task_id } => {
                write!(f, "Component of task '{task_id}' is not resolved")
            }
        }
    }
}

enum SourceCheck {
    Ok,
    MissingTask,
    MissingOutput,
    MissingInput,
}

fn check_source(spec: &ComponentSpec, graph: &GraphSpec, argument: &ArgumentType) -> SourceCheck {
    match argument {
        ArgumentType::Literal(_) => SourceCheck::Ok,
        ArgumentType::TaskOutput { task_output } => match graph.tasks.get(&task_output.task_id) {
            None => SourceCheck::MissingTask,
            // Outputs of unresolved components cannot be checked.
            Some(source) => match source.component_spec() {
                Some(source_spec) if source_spec.output(&task_output.output_name).is_none() => {
                    SourceCheck::MissingOutput
                }
                _ => SourceCheck::Ok,
            },
        },
        ArgumentType::GraphInput { graph_input } => {
            if spec.input(&graph_input.input_name).is_some() {
                SourceCheck::Ok
            } else {
                SourceCheck::MissingInput
            }
        }
    }
}

/// Lists every referential problem in the graph of `spec`.
///
/// Container components have nothing to check and yield no issues.
pub fn validate_graph(spec: &ComponentSpec) -> Vec<ValidationIssue> {
    let Some(graph) = spec.graph() else {
        return Vec::new();
    };
    let mut issues = Vec::new();

    for (task_id, task) in &graph.tasks {
        for (input_name, argument) in &task.arguments {
            let issue = match (check_source(spec, graph, argument), argument) {
                (SourceCheck::Ok, _) => None,
                (SourceCheck::MissingTask, ArgumentType::TaskOutput { task_output }) => {
                    Some(ValidationIssue::MissingTask {
                        task_id: task_id.clone(),
                        input_name: input_name.clone(),
                        referenced_task: task_output.task_id.clone(),
                    })
                }
                (SourceCheck::MissingOutput, ArgumentType::TaskOutput { task_output }) => {
                    Some(ValidationIssue::MissingTaskOutput {
                        task_id: task_id.clone(),
                        input_name: input_name.clone(),
                        referenced_task: task_output.task_id.clone(),
                        output_name: task_output.output_name.clone(),
                    })
                }
                (SourceCheck::MissingInput, ArgumentType::GraphInput { graph_input }) => {
                    Some(ValidationIssue::MissingGraphInput {
                        task_id: task_id.clone(),
                        input_name: input_name.clone(),
                        graph_input: graph_input.input_name.clone(),
                    })
                }
                _ => None,
            };
            issues.extend(issue);
        }

        match task.component_spec() {
            None => issues.push(ValidationIssue::UnresolvedComponent {
                task_id: task_id.clone(),
            }),
            Some(component) => {
                for input in component.inputs.iter().filter(|i| i.is_required()) {
                    if !task.arguments.contains_key(&input.name) {
                        issues.push(ValidationIssue::MissingRequiredArgument {
                            task_id: task_id.clone(),
                            input_name: input.name.clone(),
                        });
                    }
                }
            }
        }
    }

    for output in &spec.outputs {
        match graph.output_values.get(&output.name) {
            None => issues.push(ValidationIssue::UnboundOutput {
                output_name: output.name.clone(),
            }),
            Some(source) => {
                let argument = ArgumentType::from(source.clone());
                if !matches!(check_source(spec, graph, &argument), SourceCheck::Ok) {
                    issues.push(ValidationIssue::DanglingOutputValue {
                        output_name: output.name.clone(),
                    });
                }
            }
        }
    }

    if !issues.is_empty() {
        tracing::debug!(component = spec.display_name(), count = issues.len(), "Graph has validation issues");
    }
    issues
}
