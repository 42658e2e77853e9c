//! # Configuration
//!
//! This module defines the configuration struct for the editor.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Configuration parameters for an editing session.
///
/// These settings allow the host application to tune history depth and
/// layout without touching the spec model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo (and redo) snapshots. Default: 50.
    pub max_history: usize,
    /// Offset applied to duplicated nodes (World Space). Default: (10, 10).
    pub duplicate_offset: Vec2,
    /// Distance between grid cells used for nodes without a stored position.
    pub layout_spacing: Vec2,
    /// Number of columns of the fallback grid layout.
    pub layout_columns: usize,
    /// URL query parameter carrying the subgraph path.
    pub subgraph_query_param: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            duplicate_offset: Vec2::new(10.0, 10.0),
            layout_spacing: Vec2::new(300.0, 150.0),
            layout_columns: 4,
            subgraph_query_param: "subgraph".to_string(),
        }
    }
}

impl EditorConfig {
    /// World position of a cell of the fallback grid.
    ///
    /// Column 0 holds graph inputs, tasks start at column 1, graph outputs
    /// follow the last task column.
    pub fn grid_position(&self, column: usize, row: usize) -> Vec2 {
        Vec2::new(
            column as f32 * self.layout_spacing.x,
            row as f32 * self.layout_spacing.y,
        )
    }

    /// Fallback position for the `index`-th task.
    pub fn task_grid_position(&self, index: usize) -> Vec2 {
        let columns = self.layout_columns.max(1);
        self.grid_position(1 + index % columns, index / columns)
    }
}
