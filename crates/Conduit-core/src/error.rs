use thiserror::Error;

/// Errors raised by the component spec layer.
///
/// Dangling argument references are *not* errors; they are reported by
/// [`crate::validation::validate_graph`] instead.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Failed to parse component YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task '{0}' does not exist in the graph")]
    TaskNotFound(String),

    #[error("Component reference of task '{task_id}' has not been hydrated")]
    UnhydratedReference { task_id: String },

    #[error("Component '{0}' does not have a graph implementation")]
    NotAGraph(String),

    #[error("Subgraph path segment '{segment}' does not resolve to a graph task")]
    InvalidSubgraphPath { segment: String },

    #[error("Name '{0}' is already in use")]
    NameTaken(String),

    #[error("Failed to fetch component '{reference}': {message}")]
    Fetch { reference: String, message: String },

    #[error("Pipeline store operation on '{name}' failed: {message}")]
    Store { name: String, message: String },
}

pub type SpecResult<T> = std::result::Result<T, SpecError>;
