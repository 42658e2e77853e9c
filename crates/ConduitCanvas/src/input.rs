//! # Input Protocol
//!
//! Keyboard state the host passes in, and the editor commands it maps to.

use serde::{Deserialize, Serialize};

/// State of keyboard modifiers (Shift, Ctrl, Alt, Meta).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ModifiersState {
    /// Shift key is pressed.
    pub shift: bool,
    /// Ctrl key is pressed.
    pub ctrl: bool,
    /// Alt / Option key is pressed.
    pub alt: bool,
    /// Meta / Command / Windows key is pressed.
    pub meta: bool,
}

impl ModifiersState {
    /// Ctrl on most platforms, Command on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Standard keyboard keys that the editor cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    A,
    D,
    Y,
    Z,
}

/// The keyboard input for a single frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputState {
    /// State of keyboard modifiers.
    pub modifiers: ModifiersState,
    /// Keys pressed *this frame*.
    pub pressed_keys: Vec<Key>,
    /// If true, shortcuts are ignored because a text field inside a node
    /// consumed the keystrokes.
    pub event_consumed_by_content: bool,
}

/// Editing actions triggered from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorCommand {
    /// Leave the current subgraph.
    NavigateBack,
    DeleteSelection,
    SelectAll,
    DuplicateSelection,
    Undo,
    Redo,
}

/// Maps the keys pressed this frame to editor commands, in key order.
pub fn commands_for(input: &InputState) -> Vec<EditorCommand> {
    if input.event_consumed_by_content {
        return Vec::new();
    }
    let command = input.modifiers.command();
    input
        .pressed_keys
        .iter()
        .filter_map(|key| match key {
            Key::Escape => Some(EditorCommand::NavigateBack),
            Key::Delete | Key::Backspace => Some(EditorCommand::DeleteSelection),
            Key::A if command => Some(EditorCommand::SelectAll),
            Key::D if command => Some(EditorCommand::DuplicateSelection),
            Key::Z if command && input.modifiers.shift => Some(EditorCommand::Redo),
            Key::Z if command => Some(EditorCommand::Undo),
            Key::Y if command => Some(EditorCommand::Redo),
            _ => None,
        })
        .collect()
}
