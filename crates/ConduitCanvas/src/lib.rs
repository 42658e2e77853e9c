//! # ConduitCanvas
//!
//! `conduit_canvas` is the headless editor-side state of the pipeline editor.
//! It knows nothing about component specs; it holds what the host renders and
//! the bookkeeping that must survive re-renders.
//!
//! ## Core Architecture
//! - **Model (`src/model.rs`)**: Stores the visual node/edge list in flat arenas (SlotMap).
//! - **Node Identity (`src/node_manager.rs`)**: Stable node ids for tasks, inputs, outputs and handles.
//! - **History (`src/history.rs`)**: Snapshot based undo/redo, generic over the snapshot type.
//! - **Navigation (`src/navigation.rs`)**: The path of the nested graph being edited.
//! - **Input (`src/input.rs`)**: Keyboard shortcuts mapped to editor commands.

pub mod config;
pub mod history;
pub mod input;
pub mod model;
pub mod navigation;
pub mod node_manager;

// Re-exports for convenience
pub use config::EditorConfig;
pub use history::HistoryManager;
pub use input::{EditorCommand, InputState, Key};
pub use model::{Edge, GraphState, Handle, HandleKind, Node, NodeFlags, NodeKind};
pub use navigation::{ROOT_SEGMENT, RestoreMode, SubgraphNavigator};
pub use node_manager::{HandleInfo, NodeManager, NodeType};
