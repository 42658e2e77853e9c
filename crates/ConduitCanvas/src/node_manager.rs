//! # Node Identity
//!
//! Maps stable domain identifiers (task ids, graph input and output names)
//! to visual node ids, and task connection points ("handles") to handle ids.
//!
//! A node id is derived from the entity the first time it is requested
//! (`task:<id>`, `input:<name>`, ...) and then *stays* with the entity: when a
//! task is renamed the mapping moves, the node id does not. The old name is
//! released, so looking it up afterwards yields `None` (or, through
//! [`NodeManager::get_node_id`], a brand new id) rather than the renamed
//! entity.

use crate::model::HandleKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of domain entity represented by a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Task,
    Input,
    Output,
}

impl NodeType {
    fn prefix(self) -> &'static str {
        match self {
            NodeType::Task => "task",
            NodeType::Input => "input",
            NodeType::Output => "output",
        }
    }
}

impl HandleKind {
    fn prefix(self) -> &'static str {
        match self {
            HandleKind::Input => "in",
            HandleKind::Output => "out",
        }
    }
}

/// Reverse lookup result for a handle id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleInfo {
    pub task_id: String,
    pub handle_name: String,
    pub kind: HandleKind,
}

#[derive(Clone, Debug)]
enum Binding {
    Entity {
        node_type: NodeType,
        ref_id: String,
    },
    Handle {
        owner: String,
        handle_name: String,
        kind: HandleKind,
    },
}

/// Bidirectional `domain id <-> node id` table for one editing session.
#[derive(Clone, Debug, Default)]
pub struct NodeManager {
    by_ref: HashMap<(NodeType, String), String>,
    handles: HashMap<(String, HandleKind, String), String>,
    bindings: HashMap<String, Binding>,
}

impl NodeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of managed ids (entities and handles).
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Forgets every mapping. Called when the edited pipeline changes identity.
    pub fn clear(&mut self) {
        self.by_ref.clear();
        self.handles.clear();
        self.bindings.clear();
    }

    fn allocate(&self, candidate: String) -> String {
        if !self.bindings.contains_key(&candidate) {
            return candidate;
        }
        (2..)
            .map(|n| format!("{candidate}#{n}"))
            .find(|id| !self.bindings.contains_key(id))
            .unwrap_or(candidate)
    }

    /// Node id of an entity, allocating one on first use.
    ///
    /// Repeated calls with the same `(ref_id, node_type)` return the same id.
    pub fn get_node_id(&mut self, ref_id: &str, node_type: NodeType) -> String {
        if let Some(id) = self.by_ref.get(&(node_type, ref_id.to_string())) {
            return id.clone();
        }
        let id = self.allocate(format!("{}:{}", node_type.prefix(), ref_id));
        self.by_ref.insert((node_type, ref_id.to_string()), id.clone());
        self.bindings.insert(
            id.clone(),
            Binding::Entity {
                node_type,
                ref_id: ref_id.to_string(),
            },
        );
        id
    }

    /// Node id of an entity without allocating.
    pub fn find_node_id(&self, ref_id: &str, node_type: NodeType) -> Option<&str> {
        self.by_ref
            .get(&(node_type, ref_id.to_string()))
            .map(String::as_str)
    }

    /// Domain id of an entity node.
    pub fn get_ref_id(&self, node_id: &str) -> Option<(NodeType, &str)> {
        match self.bindings.get(node_id)? {
            Binding::Entity { node_type, ref_id } => Some((*node_type, ref_id.as_str())),
            Binding::Handle { .. } => None,
        }
    }

    /// Id of one connection point of a task, allocating on first use.
    pub fn get_task_handle_node_id(&mut self, task_id: &str, handle_name: &str, kind: HandleKind) -> String {
        let owner = self.get_node_id(task_id, NodeType::Task);
        let key = (owner.clone(), kind, handle_name.to_string());
        if let Some(id) = self.handles.get(&key) {
            return id.clone();
        }
        let id = self.allocate(format!("{owner}/{}:{handle_name}", kind.prefix()));
        self.handles.insert(key, id.clone());
        self.bindings.insert(
            id.clone(),
            Binding::Handle {
                owner,
                handle_name: handle_name.to_string(),
                kind,
            },
        );
        id
    }

    /// Reverse of [`Self::get_task_handle_node_id`], reporting the task's
    /// current id.
    pub fn get_handle_info(&self, node_id: &str) -> Option<HandleInfo> {
        let Binding::Handle {
            owner,
            handle_name,
            kind,
        } = self.bindings.get(node_id)?
        else {
            return None;
        };
        let (_, task_id) = self.get_ref_id(owner)?;
        Some(HandleInfo {
            task_id: task_id.to_string(),
            handle_name: handle_name.clone(),
            kind: *kind,
        })
    }

    /// Moves the mapping of a renamed task. See [`Self::update_ref_id`].
    pub fn update_task_id(&mut self, old_id: &str, new_id: &str) -> bool {
        self.update_ref_id(old_id, new_id, NodeType::Task)
    }

    /// Moves the mapping of a renamed entity to its new domain id, keeping
    /// the node id. Returns `false` when `old_id` was not managed.
    ///
    /// A stale mapping already registered under `new_id` is released first.
    pub fn update_ref_id(&mut self, old_id: &str, new_id: &str, node_type: NodeType) -> bool {
        if old_id == new_id {
            return self.by_ref.contains_key(&(node_type, old_id.to_string()));
        }
        let Some(node_id) = self.by_ref.remove(&(node_type, old_id.to_string())) else {
            return false;
        };
        if self.by_ref.contains_key(&(node_type, new_id.to_string())) {
            tracing::debug!(new_id, "Releasing stale node mapping");
            self.remove_node(new_id, node_type);
        }
        self.by_ref
            .insert((node_type, new_id.to_string()), node_id.clone());
        self.bindings.insert(
            node_id.clone(),
            Binding::Entity {
                node_type,
                ref_id: new_id.to_string(),
            },
        );
        tracing::debug!(old_id, new_id, node_id = %node_id, "Remapped node");
        true
    }

    /// Moves a task handle mapping after the component input/output it
    /// stands for was renamed.
    pub fn rename_handle(&mut self, task_id: &str, old_name: &str, new_name: &str, kind: HandleKind) -> bool {
        let Some(owner) = self.find_node_id(task_id, NodeType::Task).map(str::to_string) else {
            return false;
        };
        let Some(handle_id) = self.handles.remove(&(owner.clone(), kind, old_name.to_string())) else {
            return false;
        };
        self.handles
            .insert((owner.clone(), kind, new_name.to_string()), handle_id.clone());
        self.bindings.insert(
            handle_id,
            Binding::Handle {
                owner,
                handle_name: new_name.to_string(),
                kind,
            },
        );
        true
    }

    /// Releases an entity and all of its handles. Returns the released node id.
    pub fn remove_node(&mut self, ref_id: &str, node_type: NodeType) -> Option<String> {
        let node_id = self.by_ref.remove(&(node_type, ref_id.to_string()))?;
        self.bindings.remove(&node_id);
        let owned: Vec<(String, HandleKind, String)> = self
            .handles
            .keys()
            .filter(|(owner, _, _)| *owner == node_id)
            .cloned()
            .collect();
        for key in owned {
            if let Some(handle_id) = self.handles.remove(&key) {
                self.bindings.remove(&handle_id);
            }
        }
        Some(node_id)
    }

    /// Releases every entity `keep` rejects, with its handles. Returns the
    /// number of released entities.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(NodeType, &str) -> bool,
    {
        let stale: Vec<(NodeType, String)> = self
            .by_ref
            .keys()
            .filter(|(node_type, ref_id)| !keep(*node_type, ref_id))
            .cloned()
            .collect();
        for (node_type, ref_id) in &stale {
            self.remove_node(ref_id, *node_type);
        }
        stale.len()
    }

    /// Releases a task. Shorthand for [`Self::remove_node`] with
    /// [`NodeType::Task`].
    pub fn remove_task(&mut self, task_id: &str) -> Option<String> {
        self.remove_node(task_id, NodeType::Task)
    }
}
