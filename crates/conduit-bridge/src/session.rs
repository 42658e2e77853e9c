//! # Editing Session
//!
//! Ties the spec, the visual graph and the editor state together. The root
//! component spec is the single source of truth: every edit folds the
//! current view into a new root, records the previous root in history and
//! re-derives the view of the subgraph that is open.

use crate::error::{SyncError, SyncResult};
use crate::post_commit::{PostCommitAction, PostCommitQueue};
use crate::sync::{SyncOptions, export_spec, rebuild_from_view, spec_to_graph};
use conduit_canvas::input::commands_for;
use conduit_canvas::{
    EditorCommand, EditorConfig, GraphState, HandleKind, HistoryManager, InputState, NodeManager, NodeType,
    RestoreMode, SubgraphNavigator,
};
use conduit_core::annotations::Position;
use conduit_core::resolver::{ComponentLoader, ComponentResolver};
use conduit_core::rewrite::{self, UpgradeOutcome, graph_of, with_graph};
use conduit_core::spec::Annotations;
use conduit_core::store::{self, PipelineStore};
use conduit_core::subgraph::{is_subgraph_task, replace_subgraph_spec, subgraph_spec};
use conduit_core::validation::{ValidationIssue, validate_graph};
use conduit_core::{
    ArgumentSource, ArgumentType, ComponentReference, ComponentSpec, GraphSpec, SpecError, SpecResult,
};
use glam::Vec2;
use std::future::Future;
use url::Url;

#[derive(Debug)]
pub struct EditorSession {
    root: ComponentSpec,
    config: EditorConfig,
    nodes: NodeManager,
    history: HistoryManager<ComponentSpec>,
    navigator: SubgraphNavigator,
    view: GraphState,
    post_commit: PostCommitQueue,
}

impl EditorSession {
    /// Opens `spec` for editing at the root level. Every task reference must
    /// be hydrated.
    pub fn new(spec: ComponentSpec, config: EditorConfig) -> SyncResult<Self> {
        let mut nodes = NodeManager::new();
        let view = spec_to_graph(&spec, &mut nodes, &config)?;
        Ok(Self {
            history: HistoryManager::new(config.max_history),
            root: spec,
            config,
            nodes,
            navigator: SubgraphNavigator::new(),
            view,
            post_commit: PostCommitQueue::new(),
        })
    }

    /// Hydrates every reference of `spec` through `resolver`, then opens it.
    pub async fn open<L: ComponentLoader>(
        spec: &ComponentSpec,
        config: EditorConfig,
        resolver: &ComponentResolver<L>,
    ) -> SyncResult<Self> {
        let hydrated = resolver.preload(spec).await?;
        Self::new(hydrated, config)
    }

    /// Opens the pipeline saved under `name`, or `None` if there is none.
    pub async fn open_saved<L: ComponentLoader>(
        store: &dyn PipelineStore,
        name: &str,
        config: EditorConfig,
        resolver: &ComponentResolver<L>,
    ) -> SyncResult<Option<Self>> {
        let Some(spec) = store::load_pipeline(store, name).await? else {
            return Ok(None);
        };
        Ok(Some(Self::open(&spec, config, resolver).await?))
    }

    /// Replaces the edited pipeline. Node identity, history and navigation
    /// start over.
    pub fn load(&mut self, spec: ComponentSpec) -> SyncResult<()> {
        let mut nodes = NodeManager::new();
        self.view = spec_to_graph(&spec, &mut nodes, &self.config)?;
        self.nodes = nodes;
        self.root = spec;
        self.history.clear();
        self.navigator.reset();
        self.post_commit = PostCommitQueue::new();
        tracing::info!(component = self.root.display_name(), "Loaded pipeline");
        Ok(())
    }

    pub fn root(&self) -> &ComponentSpec {
        &self.root
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The visual graph of the open subgraph.
    pub fn view(&self) -> &GraphState {
        &self.view
    }

    pub fn node_manager(&self) -> &NodeManager {
        &self.nodes
    }

    pub fn navigator(&self) -> &SubgraphNavigator {
        &self.navigator
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// The component spec of the open subgraph.
    pub fn current_spec(&self) -> SyncResult<&ComponentSpec> {
        Ok(subgraph_spec(&self.root, self.navigator.task_path())?)
    }

    /// Referential issues of the open subgraph.
    pub fn validate(&self) -> SyncResult<Vec<ValidationIssue>> {
        let issues = validate_graph(self.current_spec()?);
        if !issues.is_empty() {
            tracing::warn!(path = ?self.navigator.path(), count = issues.len(), "Open graph has dangling references");
        }
        Ok(issues)
    }

    // -----------------------------------------------------------------------
    // Commit pipeline
    // -----------------------------------------------------------------------

    /// Derives the view of the level at `path` of `root`, allocating ids in
    /// `nodes`. Nothing is installed, so a failure leaves the session as it
    /// was.
    fn derive_level(
        &self,
        root: &ComponentSpec,
        path: &[String],
        mut nodes: NodeManager,
    ) -> SyncResult<(NodeManager, GraphState)> {
        let current = subgraph_spec(root, path)?;
        let view = spec_to_graph(current, &mut nodes, &self.config)?;
        Ok((nodes, view))
    }

    fn show(&mut self, nodes: NodeManager, mut view: GraphState, keep_selection: bool) {
        if keep_selection {
            for id in self.view.selected_ids() {
                view.set_selected(&id, true);
            }
        }
        self.post_commit.flush(&mut view, &nodes);
        self.nodes = nodes;
        self.view = view;
    }

    /// The root with the open subgraph's view folded in.
    fn synced_root(&self) -> SyncResult<ComponentSpec> {
        let path = self.navigator.task_path();
        let current = subgraph_spec(&self.root, path)?;
        let synced = rebuild_from_view(current, &self.view, &self.nodes)?;
        if synced == *current {
            return Ok(self.root.clone());
        }
        Ok(replace_subgraph_spec(&self.root, path, synced)?)
    }

    /// Applies `edit` to the open subgraph of the synced root.
    fn prepare<T, F>(&self, edit: F) -> SyncResult<(ComponentSpec, T)>
    where
        F: FnOnce(&ComponentSpec) -> SpecResult<(ComponentSpec, T)>,
    {
        let root = self.synced_root()?;
        let path = self.navigator.task_path();
        let (next, value) = edit(subgraph_spec(&root, path)?)?;
        Ok((replace_subgraph_spec(&root, path, next)?, value))
    }

    fn prepare_graph<T, F>(&self, edit: F) -> SyncResult<(ComponentSpec, T)>
    where
        F: FnOnce(&GraphSpec) -> SpecResult<(GraphSpec, T)>,
    {
        self.prepare(|spec| {
            let (graph, value) = edit(graph_of(spec)?)?;
            Ok((with_graph(spec, graph), value))
        })
    }

    fn commit(&mut self, next_root: ComponentSpec) -> SyncResult<()> {
        self.commit_with(next_root, self.nodes.clone())
    }

    /// Installs `next_root` with the identity table `nodes`, saving the
    /// replaced root for undo when it differs. The view is derived before
    /// anything is replaced; on failure queued post-commit actions are
    /// dropped and the session is unchanged.
    fn commit_with(&mut self, next_root: ComponentSpec, nodes: NodeManager) -> SyncResult<()> {
        let (nodes, view) = match self.derive_level(&next_root, self.navigator.task_path(), nodes) {
            Ok(level) => level,
            Err(error) => {
                self.post_commit = PostCommitQueue::new();
                return Err(error);
            }
        };
        if next_root != self.root {
            self.history.save_version(&self.root);
            self.root = next_root;
            tracing::debug!(undo = self.history.undo_len(), "Committed pipeline");
        }
        self.show(nodes, view, true);
        Ok(())
    }

    /// Folds the view into the root without recording history. Used before
    /// leaving a level, where nothing was edited.
    fn absorb_view(&mut self) -> SyncResult<()> {
        self.root = self.synced_root()?;
        Ok(())
    }

    /// Opens the level `navigator` points at with a fresh identity table.
    fn switch_level(&mut self, navigator: SubgraphNavigator) -> SyncResult<()> {
        let (nodes, view) = self.derive_level(&self.root, navigator.task_path(), NodeManager::new())?;
        self.navigator = navigator;
        self.show(nodes, view, false);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Adds a task for a hydrated component and selects it.
    pub fn add_task(&mut self, component_ref: ComponentReference, position: Option<Vec2>) -> SyncResult<String> {
        if !component_ref.is_hydrated() {
            return Err(SpecError::UnhydratedReference {
                task_id: component_ref.display_name(),
            }
            .into());
        }
        let position = position.map(|p| Position::new(p.x as f64, p.y as f64));
        let (next, task_id) = self.prepare_graph(|graph| Ok(rewrite::add_task(graph, component_ref, position)))?;
        self.post_commit.push(PostCommitAction::ClearSelection);
        self.post_commit.push(PostCommitAction::Select {
            node_type: NodeType::Task,
            ref_id: task_id.clone(),
        });
        self.commit(next)?;
        Ok(task_id)
    }

    /// Renames a task. The node keeps its id and its selection.
    pub fn rename_task(&mut self, old_id: &str, new_id: &str) -> SyncResult<()> {
        if old_id == new_id {
            return Ok(());
        }
        let (next, ()) = self.prepare_graph(|graph| Ok((rewrite::rename_task(graph, old_id, new_id)?, ())))?;
        let was_selected = self
            .nodes
            .find_node_id(old_id, NodeType::Task)
            .and_then(|id| self.view.node(id))
            .is_some_and(|node| node.is_selected());
        let mut nodes = self.nodes.clone();
        nodes.update_task_id(old_id, new_id);
        if was_selected {
            self.post_commit.push(PostCommitAction::Select {
                node_type: NodeType::Task,
                ref_id: new_id.to_string(),
            });
        }
        self.commit_with(next, nodes)
    }

    /// Deletes the selected tasks, inputs and outputs. Bindings that referred
    /// to them are removed. Returns the number of deleted entities.
    pub fn delete_selection(&mut self) -> SyncResult<usize> {
        let mut tasks = Vec::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for node_id in self.view.selected_ids() {
            match self.nodes.get_ref_id(&node_id) {
                Some((NodeType::Task, id)) => tasks.push(id.to_string()),
                Some((NodeType::Input, name)) => inputs.push(name.to_string()),
                Some((NodeType::Output, name)) => outputs.push(name.to_string()),
                None => {}
            }
        }
        let count = tasks.len() + inputs.len() + outputs.len();
        if count == 0 {
            return Ok(0);
        }

        let (next, ()) = self.prepare(|spec| {
            let mut next = with_graph(spec, rewrite::delete_tasks(graph_of(spec)?, &tasks));
            for name in &inputs {
                next = rewrite::delete_graph_input(&next, name);
            }
            for name in &outputs {
                next = rewrite::delete_graph_output(&next, name);
            }
            Ok((next, ()))
        })?;

        let mut nodes = self.nodes.clone();
        for id in &tasks {
            nodes.remove_task(id);
        }
        for name in &inputs {
            nodes.remove_node(name, NodeType::Input);
        }
        for name in &outputs {
            nodes.remove_node(name, NodeType::Output);
        }
        self.commit_with(next, nodes)?;
        tracing::info!(count, "Deleted selection");
        Ok(count)
    }

    /// Duplicates the selected tasks and selects the copies. Returns the new
    /// task ids in selection order.
    pub fn duplicate_selection(&mut self) -> SyncResult<Vec<String>> {
        let selected: Vec<String> = self
            .view
            .selected_ids()
            .iter()
            .filter_map(|id| match self.nodes.get_ref_id(id) {
                Some((NodeType::Task, task_id)) => Some(task_id.to_string()),
                _ => None,
            })
            .collect();
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let offset = (
            self.config.duplicate_offset.x as f64,
            self.config.duplicate_offset.y as f64,
        );
        let (next, copies) = self.prepare_graph(|graph| {
            let duplication = rewrite::duplicate_tasks(graph, &selected, offset)?;
            let copies: Vec<String> = duplication.id_map.iter().map(|(_, to)| to.clone()).collect();
            Ok((duplication.graph, copies))
        })?;

        self.post_commit.push(PostCommitAction::ClearSelection);
        for id in &copies {
            self.post_commit.push(PostCommitAction::Select {
                node_type: NodeType::Task,
                ref_id: id.clone(),
            });
        }
        self.commit(next)?;
        Ok(copies)
    }

    /// Arguments an upgrade of `task_id` to `new_ref` would drop.
    pub fn preview_upgrade(&self, task_id: &str, new_ref: &ComponentReference) -> SyncResult<Vec<String>> {
        let graph = graph_of(self.current_spec()?)?;
        Ok(rewrite::preview_upgrade(graph, task_id, new_ref)?)
    }

    /// Swaps the component of a task. See [`rewrite::upgrade_task`].
    pub fn upgrade_task(&mut self, task_id: &str, new_ref: ComponentReference) -> SyncResult<UpgradeOutcome> {
        let (next, outcome) = self.prepare_graph(|graph| {
            let outcome = rewrite::upgrade_task(graph, task_id, new_ref)?;
            Ok((outcome.graph.clone(), outcome))
        })?;
        self.commit(next)?;
        Ok(outcome)
    }

    pub fn set_argument(&mut self, task_id: &str, input_name: &str, argument: ArgumentType) -> SyncResult<()> {
        let (next, ()) =
            self.prepare_graph(|graph| Ok((rewrite::set_argument(graph, task_id, input_name, argument)?, ())))?;
        self.commit(next)
    }

    pub fn remove_argument(&mut self, task_id: &str, input_name: &str) -> SyncResult<()> {
        let (next, ()) = self.prepare_graph(|graph| Ok((rewrite::remove_argument(graph, task_id, input_name)?, ())))?;
        self.commit(next)
    }

    pub fn replace_task_annotations(&mut self, task_id: &str, annotations: Annotations) -> SyncResult<()> {
        let (next, ()) =
            self.prepare_graph(|graph| Ok((rewrite::replace_task_annotations(graph, task_id, annotations)?, ())))?;
        self.commit(next)
    }

    // -----------------------------------------------------------------------
    // Graph inputs and outputs
    // -----------------------------------------------------------------------

    pub fn add_graph_input(&mut self, base: &str) -> SyncResult<String> {
        let (next, name) = self.prepare(|spec| Ok(rewrite::add_graph_input(spec, base)))?;
        self.commit(next)?;
        Ok(name)
    }

    pub fn add_graph_output(&mut self, base: &str) -> SyncResult<String> {
        let (next, name) = self.prepare(|spec| Ok(rewrite::add_graph_output(spec, base)))?;
        self.commit(next)?;
        Ok(name)
    }

    /// Renames an input of the open component. Inside a subgraph the
    /// argument bound to it on the enclosing task moves along.
    pub fn rename_input(&mut self, old_name: &str, new_name: &str) -> SyncResult<()> {
        let (next, ()) = self.prepare(|spec| Ok((rewrite::rename_input(spec, old_name, new_name)?, ())))?;
        let next = rename_parent_argument(next, self.navigator.task_path(), old_name, new_name)?;
        let mut nodes = self.nodes.clone();
        nodes.update_ref_id(old_name, new_name, NodeType::Input);
        self.commit_with(next, nodes)
    }

    /// Renames an output of the open component. Inside a subgraph the
    /// enclosing graph's consumers of that output move along.
    pub fn rename_output(&mut self, old_name: &str, new_name: &str) -> SyncResult<()> {
        let (next, ()) = self.prepare(|spec| Ok((rewrite::rename_output(spec, old_name, new_name)?, ())))?;
        let next = rename_parent_output_references(next, self.navigator.task_path(), old_name, new_name)?;
        let mut nodes = self.nodes.clone();
        nodes.update_ref_id(old_name, new_name, NodeType::Output);
        self.commit_with(next, nodes)
    }

    // -----------------------------------------------------------------------
    // View edits
    // -----------------------------------------------------------------------

    /// Connects two endpoints of the view, binding the target to the source.
    ///
    /// The source is a task output handle or a graph input node; the target
    /// is a task input handle or a graph output node.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: Option<&str>,
        target: &str,
        target_handle: Option<&str>,
    ) -> SyncResult<()> {
        let invalid = |reason: &str| SyncError::InvalidConnection {
            source_id: source.to_string(),
            target_id: target.to_string(),
            reason: reason.to_string(),
        };

        let bound = match self.nodes.get_ref_id(source) {
            Some((NodeType::Task, task_id)) => {
                let info = source_handle
                    .and_then(|h| self.nodes.get_handle_info(h))
                    .filter(|info| info.kind == HandleKind::Output && info.task_id == task_id)
                    .ok_or_else(|| invalid("source handle is not an output of the task"))?;
                ArgumentSource::task_output(info.task_id, info.handle_name)
            }
            Some((NodeType::Input, name)) => ArgumentSource::graph_input(name),
            _ => return Err(invalid("source is not a task output or a graph input")),
        };

        let (next, ()) = match self.nodes.get_ref_id(target) {
            Some((NodeType::Task, task_id)) => {
                let info = target_handle
                    .and_then(|h| self.nodes.get_handle_info(h))
                    .filter(|info| info.kind == HandleKind::Input && info.task_id == task_id)
                    .ok_or_else(|| invalid("target handle is not an input of the task"))?;
                if let ArgumentSource::TaskOutput { task_output } = &bound
                    && task_output.task_id == info.task_id
                {
                    return Err(invalid("a task cannot consume its own output"));
                }
                self.prepare_graph(|graph| {
                    let next = rewrite::set_argument(graph, &info.task_id, &info.handle_name, bound.into())?;
                    Ok((next, ()))
                })?
            }
            Some((NodeType::Output, name)) => {
                let name = name.to_string();
                self.prepare_graph(|graph| Ok((rewrite::set_output_value(graph, &name, bound), ())))?
            }
            _ => return Err(invalid("target is not a task input or a graph output")),
        };
        self.commit(next)
    }

    /// Removes the binding an edge of the view stands for.
    pub fn disconnect(&mut self, edge_id: &str) -> SyncResult<()> {
        let unknown = || SyncError::UnknownEdge(edge_id.to_string());
        let edge = self
            .view
            .edges
            .values()
            .find(|edge| edge.id == edge_id)
            .cloned()
            .ok_or_else(unknown)?;

        let (next, ()) = match self.nodes.get_ref_id(&edge.target) {
            Some((NodeType::Task, _)) => {
                let info = edge
                    .target_handle
                    .as_deref()
                    .and_then(|h| self.nodes.get_handle_info(h))
                    .ok_or_else(unknown)?;
                self.prepare_graph(|graph| {
                    Ok((rewrite::remove_argument(graph, &info.task_id, &info.handle_name)?, ()))
                })?
            }
            Some((NodeType::Output, name)) => {
                let name = name.to_string();
                self.prepare_graph(|graph| Ok((rewrite::remove_output_value(graph, &name), ())))?
            }
            _ => return Err(unknown()),
        };
        self.commit(next)
    }

    /// Moves a node and records the new position in the spec.
    pub fn move_node(&mut self, node_id: &str, position: Vec2) -> SyncResult<bool> {
        if !self.view.move_node(node_id, position) {
            return Ok(false);
        }
        let next = self.synced_root()?;
        self.commit(next)?;
        Ok(true)
    }

    /// Records a size measured by the host. Written to the spec with the
    /// next edit.
    pub fn set_measured(&mut self, node_id: &str, size: Vec2) -> bool {
        self.view.set_measured(node_id, size)
    }

    pub fn select(&mut self, node_id: &str, selected: bool) -> bool {
        self.view.set_selected(node_id, selected)
    }

    pub fn clear_selection(&mut self) {
        self.view.clear_selection();
    }

    pub fn select_all(&mut self) {
        self.view.select_all();
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Installs a snapshot. Falls back to the root level when the open
    /// subgraph does not exist in it. Entities the snapshot does not declare
    /// are released from the identity table.
    fn install(&mut self, root: &ComponentSpec) -> SyncResult<()> {
        let same_level = subgraph_spec(root, self.navigator.task_path()).is_ok();
        let (navigator, nodes) = if same_level {
            let current = subgraph_spec(root, self.navigator.task_path())?;
            let mut nodes = self.nodes.clone();
            let released = nodes.retain(|node_type, ref_id| is_declared(current, node_type, ref_id));
            if released > 0 {
                tracing::debug!(released, "Released stale node mappings");
            }
            (self.navigator.clone(), nodes)
        } else {
            tracing::debug!(path = ?self.navigator.path(), "Subgraph no longer exists, returning to root");
            (SubgraphNavigator::new(), NodeManager::new())
        };
        let (nodes, view) = self.derive_level(root, navigator.task_path(), nodes)?;
        self.root = root.clone();
        self.navigator = navigator;
        self.show(nodes, view, same_level);
        Ok(())
    }

    /// Restores the previous root. Returns `false` when there is nothing to
    /// undo. When the snapshot cannot be shown the history is restored.
    pub fn undo(&mut self) -> SyncResult<bool> {
        let Some(previous) = self.history.undo(&self.root) else {
            return Ok(false);
        };
        if let Err(error) = self.install(&previous) {
            self.history.redo(&previous);
            return Err(error);
        }
        Ok(true)
    }

    pub fn redo(&mut self) -> SyncResult<bool> {
        let Some(next) = self.history.redo(&self.root) else {
            return Ok(false);
        };
        if let Err(error) = self.install(&next) {
            self.history.undo(&next);
            return Err(error);
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Opens the nested graph of `task_id`.
    pub fn enter_subgraph(&mut self, task_id: &str) -> SyncResult<()> {
        self.absorb_view()?;
        let task = graph_of(self.current_spec()?)?
            .tasks
            .get(task_id)
            .ok_or_else(|| SpecError::TaskNotFound(task_id.to_string()))?;
        if !is_subgraph_task(task) {
            return Err(SpecError::InvalidSubgraphPath {
                segment: task_id.to_string(),
            }
            .into());
        }
        let mut navigator = self.navigator.clone();
        navigator.enter(task_id);
        self.switch_level(navigator)?;
        tracing::debug!(path = ?self.navigator.path(), "Entered subgraph");
        Ok(())
    }

    /// Leaves the open subgraph. Returns `false` at the root.
    pub fn navigate_back(&mut self) -> SyncResult<bool> {
        if self.navigator.is_root() {
            return Ok(false);
        }
        self.absorb_view()?;
        let mut navigator = self.navigator.clone();
        navigator.navigate_back();
        self.switch_level(navigator)?;
        Ok(true)
    }

    /// Opens the subgraph at `path` (breadcrumbs). The path must resolve.
    pub fn navigate_to_path(&mut self, path: Vec<String>) -> SyncResult<()> {
        self.absorb_view()?;
        let mut navigator = self.navigator.clone();
        navigator.navigate_to_path(path);
        self.switch_level(navigator)
    }

    /// Writes the open subgraph path into `url`.
    pub fn write_url(&self, url: &mut Url) {
        self.navigator
            .write_to_url(url, &self.config.subgraph_query_param);
    }

    /// Restores the subgraph path carried by `url`.
    ///
    /// Every level is checked against the spec before `on_level` runs for
    /// it. When a level fails the session stays on the deepest level reached
    /// and the failure is returned.
    pub async fn restore_from_url<F, Fut>(&mut self, url: &Url, mode: RestoreMode, mut on_level: F) -> SyncResult<()>
    where
        F: FnMut(Vec<String>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let Some(target) = SubgraphNavigator::read_from_url(url, &self.config.subgraph_query_param) else {
            return Ok(());
        };
        self.absorb_view()?;

        let mut navigator = self.navigator.clone();
        let root = &self.root;
        let outcome = navigator
            .restore(target, mode, |level| {
                let check = subgraph_spec(root, &level[1..])
                    .map(|_| ())
                    .map_err(anyhow::Error::from);
                let hook = check.is_ok().then(|| on_level(level));
                async move {
                    check?;
                    if let Some(hook) = hook {
                        hook.await?;
                    }
                    Ok(())
                }
            })
            .await;

        self.switch_level(navigator)?;
        outcome.map_err(|e| SyncError::Restore(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Keyboard
    // -----------------------------------------------------------------------

    /// Runs the commands bound to this frame's keys. Returns the commands.
    pub fn handle_input(&mut self, input: &InputState) -> SyncResult<Vec<EditorCommand>> {
        let commands = commands_for(input);
        for command in &commands {
            self.apply_command(*command)?;
        }
        Ok(commands)
    }

    pub fn apply_command(&mut self, command: EditorCommand) -> SyncResult<()> {
        match command {
            EditorCommand::NavigateBack => {
                self.navigate_back()?;
            }
            EditorCommand::DeleteSelection => {
                self.delete_selection()?;
            }
            EditorCommand::SelectAll => self.view.select_all(),
            EditorCommand::DuplicateSelection => {
                self.duplicate_selection()?;
            }
            EditorCommand::Undo => {
                self.undo()?;
            }
            EditorCommand::Redo => {
                self.redo()?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Export and persistence
    // -----------------------------------------------------------------------

    /// The whole pipeline, regenerated with `options`.
    pub fn export(&self, options: &SyncOptions) -> SyncResult<ComponentSpec> {
        let spec = export_spec(&self.synced_root()?, options);
        tracing::info!(component = spec.display_name(), ?options, "Exported pipeline");
        Ok(spec)
    }

    pub fn export_yaml(&self, options: &SyncOptions) -> SyncResult<String> {
        Ok(self.export(options)?.to_yaml()?)
    }

    /// Saves an editable copy (specs and positions kept) under `name`.
    pub async fn save(&self, store: &dyn PipelineStore, name: &str) -> SyncResult<()> {
        let spec = self.export(&SyncOptions::editing())?;
        store::save_pipeline(store, name, &spec).await?;
        Ok(())
    }
}

fn is_declared(spec: &ComponentSpec, node_type: NodeType, ref_id: &str) -> bool {
    match node_type {
        NodeType::Task => spec.graph().is_some_and(|graph| graph.tasks.contains_key(ref_id)),
        NodeType::Input => spec.input(ref_id).is_some(),
        NodeType::Output => spec.output(ref_id).is_some(),
    }
}

/// Moves the argument bound to a renamed input of the nested component at
/// `path` on the task that embeds it.
fn rename_parent_argument(
    root: ComponentSpec,
    path: &[String],
    old_name: &str,
    new_name: &str,
) -> SpecResult<ComponentSpec> {
    let Some((task_id, parent_path)) = path.split_last() else {
        return Ok(root);
    };
    let parent = subgraph_spec(&root, parent_path)?;
    let graph = graph_of(parent)?;
    let task = graph
        .tasks
        .get(task_id)
        .ok_or_else(|| SpecError::TaskNotFound(task_id.clone()))?;
    let Some(argument) = task.arguments.get(old_name) else {
        return Ok(root);
    };
    let mut arguments = task.arguments.clone();
    arguments.remove(old_name);
    arguments.insert(new_name.to_string(), argument.clone());
    let next_parent = with_graph(parent, rewrite::replace_task_arguments(graph, task_id, arguments)?);
    replace_subgraph_spec(&root, parent_path, next_parent)
}

/// Redirects the enclosing graph's consumers of a renamed output of the
/// nested component at `path`.
fn rename_parent_output_references(
    root: ComponentSpec,
    path: &[String],
    old_name: &str,
    new_name: &str,
) -> SpecResult<ComponentSpec> {
    let Some((task_id, parent_path)) = path.split_last() else {
        return Ok(root);
    };
    let parent = subgraph_spec(&root, parent_path)?;
    let mut graph = graph_of(parent)?.clone();
    let mut changed = false;
    for task in graph.tasks.values_mut() {
        for argument in task.arguments.values_mut() {
            if let ArgumentType::TaskOutput { task_output } = argument
                && task_output.task_id == *task_id
                && task_output.output_name == old_name
            {
                task_output.output_name = new_name.to_string();
                changed = true;
            }
        }
    }
    for source in graph.output_values.values_mut() {
        if let ArgumentSource::TaskOutput { task_output } = source
            && task_output.task_id == *task_id
            && task_output.output_name == old_name
        {
            task_output.output_name = new_name.to_string();
            changed = true;
        }
    }
    if !changed {
        return Ok(root);
    }
    let next_parent = with_graph(parent, graph);
    replace_subgraph_spec(&root, parent_path, next_parent)
}
