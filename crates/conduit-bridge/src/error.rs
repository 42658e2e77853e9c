use conduit_core::SpecError;
use thiserror::Error;

/// Failures while moving between the visual graph and the spec.
///
/// The `Missing*Node` variants are internal-consistency violations: the view
/// and the spec disagree about which entities exist. They abort the current
/// operation instead of producing a corrupted spec.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("the nodes array does not have task node `{0}`")]
    MissingTaskNode(String),

    #[error("the nodes array does not have input node `{0}`")]
    MissingInputNode(String),

    #[error("the nodes array does not have output node `{0}`")]
    MissingOutputNode(String),

    #[error("Cannot connect `{source_id}` to `{target_id}`: {reason}")]
    InvalidConnection {
        source_id: String,
        target_id: String,
        reason: String,
    },

    #[error("Edge `{0}` is not part of the graph")]
    UnknownEdge(String),

    #[error("Failed to restore subgraph path: {0}")]
    Restore(String),

    #[error(transparent)]
    Spec(#[from] SpecError),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
