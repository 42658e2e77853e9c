use std::collections::VecDeque;

/// Manages the Undo/Redo history of an edited value.
///
/// This implementation uses a simple Full State Snapshot approach: every
/// entry is an independent clone, so no two stack entries alias. Linear
/// history only; saving a new version discards the redo branch.
///
/// Both stacks are capped at `max_history`; the oldest entry is dropped
/// silently when the cap is exceeded, so very long sessions lose their
/// earliest history.
#[derive(Clone, Debug)]
pub struct HistoryManager<S> {
    undo_stack: VecDeque<S>,
    redo_stack: VecDeque<S>,
    pub max_history: usize,
}

impl<S> Default for HistoryManager<S> {
    fn default() -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history: 50,
        }
    }
}

fn push_capped<S>(stack: &mut VecDeque<S>, state: S, cap: usize) {
    if cap == 0 {
        return;
    }
    while stack.len() >= cap {
        stack.pop_front(); // Drop oldest
    }
    stack.push_back(state);
}

impl<S: Clone> HistoryManager<S> {
    /// Creates a new HistoryManager with a specified limit.
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::new(),
            max_history,
        }
    }

    /// Helper to check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Helper to check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Saves the state that is about to be replaced.
    ///
    /// Call this *before* committing a new value, passing the value being
    /// replaced (not the new one).
    pub fn save_version(&mut self, previous: &S) {
        push_capped(&mut self.undo_stack, previous.clone(), self.max_history);
        self.redo_stack.clear(); // New timeline branch
    }

    /// Performs Undo.
    ///
    /// Returns the snapshot to install, or `None` when there is nothing to
    /// undo. `current` is kept for redo.
    pub fn undo(&mut self, current: &S) -> Option<S> {
        let previous = self.undo_stack.pop_back()?;
        push_capped(&mut self.redo_stack, current.clone(), self.max_history);
        Some(previous)
    }

    /// Performs Redo.
    ///
    /// Returns the snapshot to install, or `None` when there is nothing to
    /// redo. `current` is kept for undo.
    pub fn redo(&mut self, current: &S) -> Option<S> {
        let next = self.redo_stack.pop_back()?;
        push_capped(&mut self.undo_stack, current.clone(), self.max_history);
        Some(next)
    }

    /// Drops both stacks (e.g. when a different pipeline is loaded).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
