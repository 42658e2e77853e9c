//! # Visual Graph Model
//!
//! The node/edge list the host renders. Nodes live in a flat arena
//! (`SlotMap`) and are also indexed by their string node id, which is the id
//! handed out by [`crate::node_manager::NodeManager`].
//!
//! This model carries no pipeline semantics of its own; the bridge derives it
//! from a component spec and reads it back.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use slotmap::new_key_type;
use std::collections::HashMap;

new_key_type! {
    /// Arena key for a Node.
    pub struct NodeKey;
    /// Arena key for an Edge.
    pub struct EdgeKey;
}

use bitflags::bitflags;

bitflags! {
    /// Bitflags representing various boolean states of a Node or Edge.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// The node is currently selected by the user.
        const SELECTED = 1 << 0;
        /// The node or edge refers to something the spec cannot resolve.
        const INVALID = 1 << 1;
        /// The task opens a nested graph.
        const SUBGRAPH = 1 << 2;
    }
}

// Serialized as plain bits so snapshots stay compact.
impl Serialize for NodeFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for NodeFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

/// Direction of a connection point on a task node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Input,
    Output,
}

/// A connection point of a task node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    /// Handle node id (see `NodeManager::get_task_handle_node_id`).
    pub id: String,
    /// Input or output name on the task's component.
    pub name: String,
    pub kind: HandleKind,
}

/// What a node stands for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Task {
        task_id: String,
        handles: Vec<Handle>,
    },
    /// A declared graph input.
    Input { name: String },
    /// A declared graph output.
    Output { name: String },
}

impl NodeKind {
    pub fn handle(&self, handle_id: &str) -> Option<&Handle> {
        match self {
            NodeKind::Task { handles, .. } => handles.iter().find(|h| h.id == handle_id),
            _ => None,
        }
    }
}

/// A Node in the visual graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    /// Self-reference key (arena).
    pub key: NodeKey,
    /// Node id from the identity manager.
    pub id: String,
    pub kind: NodeKind,
    /// Display label.
    pub label: String,
    /// World-space position of the top-left corner.
    pub position: Vec2,
    /// Size measured by the host renderer, once known.
    pub measured: Option<Vec2>,
    /// State flags.
    pub flags: NodeFlags,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>, position: Vec2) -> Self {
        Self {
            key: NodeKey::default(),
            id: id.into(),
            kind,
            label: label.into(),
            position,
            measured: None,
            flags: NodeFlags::default(),
        }
    }

    pub fn is_selected(&self) -> bool {
        self.flags.contains(NodeFlags::SELECTED)
    }
}

/// A connection between two nodes.
///
/// Task endpoints carry a handle id; graph input sources and graph output
/// targets do not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_handle: Option<String>,
    pub target: String,
    pub target_handle: Option<String>,
    pub flags: NodeFlags,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        source_handle: Option<String>,
        target: impl Into<String>,
        target_handle: Option<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let id = format!(
            "{}:{}->{}:{}",
            source,
            source_handle.as_deref().unwrap_or_default(),
            target,
            target_handle.as_deref().unwrap_or_default()
        );
        Self {
            id,
            source,
            source_handle,
            target,
            target_handle,
            flags: NodeFlags::default(),
        }
    }
}

/// The entire state of the visual graph.
///
/// Holds nodes and edges in flat arenas. It is responsible for storage, not
/// for deriving nodes from a spec.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphState {
    /// Arena for Nodes.
    pub nodes: SlotMap<NodeKey, Node>,
    /// Arena for Edges.
    pub edges: SlotMap<EdgeKey, Edge>,
    /// Draw order cache. Lower index = Background/Bottom.
    pub draw_order: Vec<NodeKey>,
    /// Index for node id -> key lookup.
    #[serde(default, skip)]
    pub id_index: HashMap<String, NodeKey>,
}

impl GraphState {
    /// Inserts a node and updates the id index. A node with the same id is
    /// replaced.
    pub fn insert_node(&mut self, node: Node) -> NodeKey {
        if let Some(existing) = self.id_index.get(&node.id).copied() {
            self.remove_node(existing);
        }
        let key = self.nodes.insert_with_key(|key| Node { key, ..node });
        self.id_index.insert(self.nodes[key].id.clone(), key);
        self.draw_order.push(key);
        key
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<Node> {
        let node = self.nodes.remove(key)?;
        self.id_index.remove(&node.id);
        self.draw_order.retain(|k| *k != key);
        self.edges
            .retain(|_, edge| edge.source != node.id && edge.target != node.id);
        Some(node)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.id_index.get(id).and_then(|key| self.nodes.get(*key))
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let key = *self.id_index.get(id)?;
        self.nodes.get_mut(key)
    }

    /// Nodes in draw order.
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &Node> {
        self.draw_order.iter().filter_map(|key| self.nodes.get(*key))
    }

    pub fn insert_edge(&mut self, edge: Edge) -> EdgeKey {
        self.remove_edge(&edge.id);
        self.edges.insert(edge)
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> Option<Edge> {
        let key = self
            .edges
            .iter()
            .find(|(_, edge)| edge.id == edge_id)
            .map(|(key, _)| key)?;
        self.edges.remove(key)
    }

    /// Edges arriving at `node_id`.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |edge| edge.target == node_id)
    }

    pub fn move_node(&mut self, id: &str, position: Vec2) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Records the size the host measured for a node.
    pub fn set_measured(&mut self, id: &str, size: Vec2) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.measured = Some(size);
                true
            }
            None => false,
        }
    }

    pub fn set_selected(&mut self, id: &str, selected: bool) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.flags.set(NodeFlags::SELECTED, selected);
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        for node in self.nodes.values_mut() {
            node.flags.remove(NodeFlags::SELECTED);
        }
    }

    pub fn select_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.flags.insert(NodeFlags::SELECTED);
        }
    }

    /// Ids of selected nodes, in draw order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.ordered_nodes()
            .filter(|n| n.is_selected())
            .map(|n| n.id.clone())
            .collect()
    }

    /// Rebuilds the id index after deserialization.
    pub fn reindex(&mut self) {
        self.id_index = self
            .nodes
            .iter()
            .map(|(key, node)| (node.id.clone(), key))
            .collect();
    }
}
