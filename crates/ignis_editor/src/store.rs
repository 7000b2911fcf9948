// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph store: the single owner of editable blueprint graphs.
//!
//! Graphs are held as `Arc<Graph>` snapshots. A mutation clones the active
//! snapshot, applies [`GraphOperation`]s to the clone and swaps the new `Arc`
//! in under one write lock, so readers never observe a half-applied edit and
//! a failed edit leaves nothing behind. Committed changes are published to
//! [`StoreObserver`]s after the lock is released.

use crate::history::{History, HistoryError, HistoryStats, DEFAULT_MAX_DEPTH};
use crate::operation::{GraphOperation, NodeUpdate};
use crate::selection::Selection;
use ignis_blueprint::{
    Connection, ConnectionId, Graph, GraphId, Node, NodeId, NodeRegistry, SocketId, SocketType, ValidationError,
    Value, VariableDecl,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Offset applied to duplicated nodes
pub const DUPLICATE_OFFSET: [f32; 2] = [50.0, 50.0];

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No graph is active
    #[error("No active graph")]
    NoActiveGraph,

    /// Graph not found
    #[error("Graph not found: {graph_id}")]
    GraphNotFound {
        /// Requested graph
        graph_id: GraphId,
    },

    /// Node not found
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// Requested node
        node_id: NodeId,
    },

    /// Connection not found
    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound {
        /// Requested connection
        connection_id: ConnectionId,
    },

    /// Variable not found
    #[error("Variable not found: {name}")]
    VariableNotFound {
        /// Requested variable
        name: String,
    },

    /// The edit would break a graph invariant
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// History error
    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Where a committed edit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// This editor
    Local,
    /// The collaboration layer
    Remote,
}

/// A committed store change
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    /// A graph was created or imported
    GraphCreated {
        /// New graph
        graph_id: GraphId,
    },
    /// A graph was deleted
    GraphDeleted {
        /// Removed graph
        graph_id: GraphId,
    },
    /// The active graph changed
    ActiveChanged {
        /// New active graph
        graph_id: Option<GraphId>,
    },
    /// Operations were applied atomically to a graph
    Applied {
        /// Edited graph
        graph_id: GraphId,
        /// Applied operations, in order
        operations: Vec<GraphOperation>,
        /// Who made the edit
        origin: ChangeOrigin,
    },
    /// A graph was replaced wholesale (undo/redo)
    Restored {
        /// Restored graph
        graph_id: GraphId,
    },
    /// The selection changed
    SelectionChanged,
}

/// Receives committed store changes
pub trait StoreObserver: Send + Sync {
    /// Called after a change is committed
    fn on_change(&self, change: &GraphChange);
}

impl<F> StoreObserver for F
where
    F: Fn(&GraphChange) + Send + Sync,
{
    fn on_change(&self, change: &GraphChange) {
        self(change)
    }
}

/// Nodes and their internal connections held for paste
#[derive(Debug, Clone, Default)]
struct Clipboard {
    nodes: Vec<Node>,
    connections: Vec<Connection>,
}

#[derive(Debug)]
struct StoreState {
    graphs: IndexMap<GraphId, Arc<Graph>>,
    active: Option<GraphId>,
    selection: Selection,
    clipboard: Clipboard,
    history: History,
}

impl StoreState {
    fn active_id(&self) -> Result<GraphId> {
        self.active.ok_or(StoreError::NoActiveGraph)
    }

    fn active(&self) -> Result<&Arc<Graph>> {
        let graph_id = self.active_id()?;
        self.graphs
            .get(&graph_id)
            .ok_or(StoreError::GraphNotFound { graph_id })
    }

    fn prune_selection(&mut self) {
        let Some(graph) = self.active.and_then(|id| self.graphs.get(&id)).cloned() else {
            self.selection.clear();
            return;
        };
        self.selection
            .retain(|n| graph.contains_node(n), |c| graph.connection(c).is_some());
    }
}

/// Owner of every open graph
pub struct GraphStore {
    registry: Arc<NodeRegistry>,
    state: RwLock<StoreState>,
    observers: RwLock<Vec<Arc<dyn StoreObserver>>>,
}

impl GraphStore {
    /// Create an empty store
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_history_depth(registry, DEFAULT_MAX_DEPTH)
    }

    /// Create an empty store with a bounded undo depth
    pub fn with_history_depth(registry: Arc<NodeRegistry>, max_depth: usize) -> Self {
        Self {
            registry,
            state: RwLock::new(StoreState {
                graphs: IndexMap::new(),
                active: None,
                selection: Selection::new(),
                clipboard: Clipboard::default(),
                history: History::with_max_depth(max_depth),
            }),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Node registry the store validates against
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Register an observer for committed changes
    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) {
        self.observers.write().push(observer);
    }

    fn notify(&self, changes: &[GraphChange]) {
        let observers = self.observers.read().clone();
        for change in changes {
            for observer in &observers {
                observer.on_change(change);
            }
        }
    }

    // Graphs

    /// Create an empty graph and make it active
    pub fn create_graph(&self, name: impl Into<String>) -> GraphId {
        let graph = Graph::new(name);
        let graph_id = graph.id;
        {
            let mut state = self.state.write();
            state.graphs.insert(graph_id, Arc::new(graph));
            state.active = Some(graph_id);
            state.selection.clear();
        }
        tracing::debug!(%graph_id, "Graph created");
        self.notify(&[
            GraphChange::GraphCreated { graph_id },
            GraphChange::ActiveChanged {
                graph_id: Some(graph_id),
            },
        ]);
        graph_id
    }

    /// Validate and add an externally built graph, making it active
    ///
    /// A graph with the same id is replaced and its history dropped.
    pub fn import_graph(&self, graph: Graph) -> Result<GraphId> {
        graph.validate(&self.registry)?;
        let graph_id = graph.id;
        {
            let mut state = self.state.write();
            state.history.forget_graph(graph_id);
            state.graphs.insert(graph_id, Arc::new(graph));
            state.active = Some(graph_id);
            state.selection.clear();
        }
        tracing::debug!(%graph_id, "Graph imported");
        self.notify(&[
            GraphChange::GraphCreated { graph_id },
            GraphChange::ActiveChanged {
                graph_id: Some(graph_id),
            },
        ]);
        Ok(graph_id)
    }

    /// Current snapshot of the active graph
    pub fn active_graph(&self) -> Option<Arc<Graph>> {
        self.state.read().active().ok().cloned()
    }

    /// ID of the active graph
    pub fn active_graph_id(&self) -> Option<GraphId> {
        self.state.read().active
    }

    /// Current snapshot of a graph
    pub fn graph(&self, graph_id: GraphId) -> Option<Arc<Graph>> {
        self.state.read().graphs.get(&graph_id).cloned()
    }

    /// IDs of every open graph, in creation order
    pub fn graph_ids(&self) -> Vec<GraphId> {
        self.state.read().graphs.keys().copied().collect()
    }

    /// Make a graph active, clearing the selection
    pub fn set_active(&self, graph_id: GraphId) -> Result<()> {
        {
            let mut state = self.state.write();
            if !state.graphs.contains_key(&graph_id) {
                return Err(StoreError::GraphNotFound { graph_id });
            }
            state.active = Some(graph_id);
            state.selection.clear();
        }
        self.notify(&[GraphChange::ActiveChanged {
            graph_id: Some(graph_id),
        }]);
        Ok(())
    }

    /// Delete a graph and its history
    pub fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        let mut changes = vec![GraphChange::GraphDeleted { graph_id }];
        {
            let mut state = self.state.write();
            state
                .graphs
                .shift_remove(&graph_id)
                .ok_or(StoreError::GraphNotFound { graph_id })?;
            state.history.forget_graph(graph_id);
            if state.active == Some(graph_id) {
                state.active = None;
                state.selection.clear();
                changes.push(GraphChange::ActiveChanged { graph_id: None });
            }
        }
        tracing::debug!(%graph_id, "Graph deleted");
        self.notify(&changes);
        Ok(())
    }

    // Mutations

    /// Apply operations to one graph as a single undoable step
    fn commit(
        &self,
        graph_id: Option<GraphId>,
        description: &str,
        operations: Vec<GraphOperation>,
        origin: ChangeOrigin,
        select: Option<Vec<NodeId>>,
    ) -> Result<Arc<Graph>> {
        let (graph_id, graph) = {
            let mut state = self.state.write();
            let graph_id = match graph_id {
                Some(id) => id,
                None => state.active_id()?,
            };
            let current = state
                .graphs
                .get(&graph_id)
                .cloned()
                .ok_or(StoreError::GraphNotFound { graph_id })?;

            let mut next = Graph::clone(&current);
            for operation in &operations {
                operation.apply(&mut next, &self.registry)?;
            }

            match origin {
                ChangeOrigin::Local => {
                    state.history.record(description, &current, &next)?;
                }
                // Snapshot undo would silently revert the peer's edit
                ChangeOrigin::Remote => state.history.forget_graph(graph_id),
            }

            let next = Arc::new(next);
            state.graphs.insert(graph_id, next.clone());
            if state.active == Some(graph_id) {
                if let Some(nodes) = select {
                    state.selection.set_nodes(nodes);
                }
                state.prune_selection();
            }
            (graph_id, next)
        };

        tracing::debug!(%graph_id, ?origin, operations = operations.len(), description, "Graph mutation committed");
        self.notify(&[GraphChange::Applied {
            graph_id,
            operations,
            origin,
        }]);
        Ok(graph)
    }

    /// Instantiate a registered node type in the active graph
    pub fn add_node(&self, node_type: &str, position: [f32; 2], initial_data: IndexMap<String, Value>) -> Result<Node> {
        let node = self.registry.instantiate(node_type, position, initial_data)?;
        self.commit(
            None,
            "Add node",
            vec![GraphOperation::AddNode { node: node.clone() }],
            ChangeOrigin::Local,
            None,
        )?;
        Ok(node)
    }

    /// Partially update a node in the active graph
    pub fn update_node(&self, node_id: NodeId, update: NodeUpdate) -> Result<Node> {
        let graph = self.commit(
            None,
            "Update node",
            vec![GraphOperation::UpdateNode { node_id, update }],
            ChangeOrigin::Local,
            None,
        )?;
        graph
            .node(node_id)
            .cloned()
            .ok_or(StoreError::NodeNotFound { node_id })
    }

    /// Delete a node and every connection touching it
    pub fn delete_node(&self, node_id: NodeId) -> Result<()> {
        self.commit(
            None,
            "Delete node",
            vec![GraphOperation::RemoveNode { node_id }],
            ChangeOrigin::Local,
            None,
        )?;
        Ok(())
    }

    /// Connect an output socket to an input socket in the active graph
    pub fn add_connection(
        &self,
        from_node: NodeId,
        from_socket: impl Into<SocketId>,
        to_node: NodeId,
        to_socket: impl Into<SocketId>,
    ) -> Result<Connection> {
        let connection = Connection::new(from_node, from_socket.into(), to_node, to_socket.into());
        self.commit(
            None,
            "Connect",
            vec![GraphOperation::AddConnection {
                connection: connection.clone(),
            }],
            ChangeOrigin::Local,
            None,
        )?;
        Ok(connection)
    }

    /// Remove a connection from the active graph
    pub fn delete_connection(&self, connection_id: ConnectionId) -> Result<()> {
        self.commit(
            None,
            "Disconnect",
            vec![GraphOperation::RemoveConnection { connection_id }],
            ChangeOrigin::Local,
            None,
        )?;
        Ok(())
    }

    /// Declare or replace a variable of the active graph
    pub fn declare_variable(
        &self,
        name: impl Into<String>,
        variable_type: SocketType,
        default_value: Option<Value>,
    ) -> Result<()> {
        let decl = VariableDecl {
            variable_type,
            default_value,
        };
        self.commit(
            None,
            "Declare variable",
            vec![GraphOperation::DeclareVariable {
                name: name.into(),
                decl,
            }],
            ChangeOrigin::Local,
            None,
        )?;
        Ok(())
    }

    /// Copy a node with a fresh id next to the original and select the copy
    pub fn duplicate_node(&self, node_id: NodeId) -> Result<Node> {
        let source = self
            .active_graph()
            .ok_or(StoreError::NoActiveGraph)?
            .node(node_id)
            .cloned()
            .ok_or(StoreError::NodeNotFound { node_id })?;

        let mut copy = source;
        copy.id = NodeId::new();
        copy.position = [
            copy.position[0] + DUPLICATE_OFFSET[0],
            copy.position[1] + DUPLICATE_OFFSET[1],
        ];
        self.commit(
            None,
            "Duplicate node",
            vec![GraphOperation::AddNode { node: copy.clone() }],
            ChangeOrigin::Local,
            Some(vec![copy.id]),
        )?;
        Ok(copy)
    }

    /// Copy the selected nodes and the connections between them
    ///
    /// Returns the number of nodes copied.
    pub fn copy_selection(&self) -> Result<usize> {
        let mut state = self.state.write();
        let graph = state.active()?.clone();
        let selected = &state.selection.nodes;

        let nodes: Vec<Node> = graph
            .nodes()
            .filter(|n| selected.contains(&n.id))
            .cloned()
            .collect();
        let connections: Vec<Connection> = graph
            .connections()
            .filter(|c| selected.contains(&c.from_node) && selected.contains(&c.to_node))
            .cloned()
            .collect();

        let count = nodes.len();
        state.clipboard = Clipboard { nodes, connections };
        Ok(count)
    }

    /// Paste the clipboard with its first node at `position`, selecting the new nodes
    pub fn paste(&self, position: [f32; 2]) -> Result<Vec<NodeId>> {
        let clipboard = self.state.read().clipboard.clone();
        let Some(anchor) = clipboard.nodes.first().map(|n| n.position) else {
            return Ok(Vec::new());
        };
        let offset = [position[0] - anchor[0], position[1] - anchor[1]];

        let mut remap = IndexMap::new();
        let mut operations = Vec::new();
        for node in &clipboard.nodes {
            let mut copy = node.clone();
            copy.id = NodeId::new();
            copy.position = [node.position[0] + offset[0], node.position[1] + offset[1]];
            remap.insert(node.id, copy.id);
            operations.push(GraphOperation::AddNode { node: copy });
        }
        for connection in &clipboard.connections {
            if let (Some(from), Some(to)) = (remap.get(&connection.from_node), remap.get(&connection.to_node)) {
                operations.push(GraphOperation::AddConnection {
                    connection: Connection::new(
                        *from,
                        connection.from_socket.clone(),
                        *to,
                        connection.to_socket.clone(),
                    ),
                });
            }
        }

        let pasted: Vec<NodeId> = remap.values().copied().collect();
        self.commit(None, "Paste", operations, ChangeOrigin::Local, Some(pasted.clone()))?;
        Ok(pasted)
    }

    /// Apply an operation arriving from the collaboration layer
    ///
    /// The operation goes through the same validation as a local edit and is
    /// rejected whole when invalid.
    pub fn apply_remote(&self, graph_id: GraphId, operation: GraphOperation) -> Result<()> {
        let description = operation.description();
        self.commit(
            Some(graph_id),
            description,
            vec![operation],
            ChangeOrigin::Remote,
            None,
        )
        .inspect_err(|error| tracing::warn!(%graph_id, %error, "Remote operation rejected"))?;
        Ok(())
    }

    // Selection

    /// Select a node of the active graph
    pub fn select_node(&self, node_id: NodeId, additive: bool) -> Result<()> {
        {
            let mut state = self.state.write();
            if !state.active()?.contains_node(node_id) {
                return Err(StoreError::NodeNotFound { node_id });
            }
            state.selection.select_node(node_id, additive);
        }
        self.notify(&[GraphChange::SelectionChanged]);
        Ok(())
    }

    /// Select a connection of the active graph
    pub fn select_connection(&self, connection_id: ConnectionId, additive: bool) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.active()?.connection(connection_id).is_none() {
                return Err(StoreError::ConnectionNotFound { connection_id });
            }
            state.selection.select_connection(connection_id, additive);
        }
        self.notify(&[GraphChange::SelectionChanged]);
        Ok(())
    }

    /// Clear the selection
    pub fn clear_selection(&self) {
        self.state.write().selection.clear();
        self.notify(&[GraphChange::SelectionChanged]);
    }

    /// Current selection
    pub fn selection(&self) -> Selection {
        self.state.read().selection.clone()
    }

    // History

    /// Undo the last local edit
    pub fn undo(&self) -> Result<()> {
        let graph_id = {
            let mut state = self.state.write();
            let (graph_id, graph) = state.history.undo()?;
            Self::restore(&mut state, graph_id, graph)?
        };
        self.notify(&[GraphChange::Restored { graph_id }]);
        Ok(())
    }

    /// Redo the last undone edit
    pub fn redo(&self) -> Result<()> {
        let graph_id = {
            let mut state = self.state.write();
            let (graph_id, graph) = state.history.redo()?;
            Self::restore(&mut state, graph_id, graph)?
        };
        self.notify(&[GraphChange::Restored { graph_id }]);
        Ok(())
    }

    fn restore(state: &mut StoreState, graph_id: GraphId, graph: Graph) -> Result<GraphId> {
        let slot = state
            .graphs
            .get_mut(&graph_id)
            .ok_or(StoreError::GraphNotFound { graph_id })?;
        *slot = Arc::new(graph);
        state.prune_selection();
        tracing::debug!(%graph_id, "Graph restored from history");
        Ok(graph_id)
    }

    /// Undo/redo statistics
    pub fn history_stats(&self) -> HistoryStats {
        self.state.read().history.stats()
    }
}
