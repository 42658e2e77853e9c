//! Work that has to wait until a commit has been rendered.
//!
//! Some actions can only run once the view has been re-derived from the new
//! spec: selecting a renamed task must look up its node after the identity
//! manager has been updated and the node exists again. Such actions are
//! queued before the commit and flushed right after the view is rebuilt.

use conduit_canvas::{GraphState, NodeManager, NodeType};
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostCommitAction {
    /// Select the node of an entity, addressed by its domain id.
    Select { node_type: NodeType, ref_id: String },
    /// Drop the selection before the queued selections apply.
    ClearSelection,
}

#[derive(Clone, Debug, Default)]
pub struct PostCommitQueue {
    pending: VecDeque<PostCommitAction>,
}

impl PostCommitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: PostCommitAction) {
        self.pending.push_back(action);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applies and drains every queued action in order. Actions whose target
    /// no longer exists are skipped. Returns the number applied.
    pub fn flush(&mut self, state: &mut GraphState, nodes: &NodeManager) -> usize {
        let mut applied = 0;
        while let Some(action) = self.pending.pop_front() {
            let done = match &action {
                PostCommitAction::Select { node_type, ref_id } => nodes
                    .find_node_id(ref_id, *node_type)
                    .is_some_and(|id| state.set_selected(id, true)),
                PostCommitAction::ClearSelection => {
                    state.clear_selection();
                    true
                }
            };
            if done {
                applied += 1;
            } else {
                tracing::debug!(?action, "Skipped post-commit action");
            }
        }
        applied
    }
}
