// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, connections and variables.

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeId, NodeKind};
use crate::registry::NodeRegistry;
use crate::socket::{SocketDirection, SocketId, SocketType, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A graph-level variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    /// Declared type
    pub variable_type: SocketType,
    /// Initial value, the type's zero value when absent
    pub default_value: Option<Value>,
}

impl VariableDecl {
    /// Value a run starts with
    pub fn initial_value(&self) -> Value {
        self.default_value
            .clone()
            .unwrap_or_else(|| self.variable_type.zero_value())
    }
}

/// A blueprint graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Nodes in the graph, in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes, in insertion order
    connections: IndexMap<ConnectionId, Connection>,
    /// Declared variables
    variables: IndexMap<String, VariableDecl>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(GraphId::new(), name)
    }

    /// Create a new empty graph with a known ID
    pub fn with_id(id: GraphId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            variables: IndexMap::new(),
        }
    }

    /// Add a node to the graph
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId, ValidationError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(ValidationError::DuplicateId { id: id.to_string() });
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node together with every connection touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Connection>)> {
        let node = self.nodes.shift_remove(&node_id)?;
        let mut removed = Vec::new();
        self.connections.retain(|_, c| {
            if c.involves_node(node_id) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });
        Some((node, removed))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Check whether a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Event nodes (interpretation entry points) in insertion order
    pub fn event_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.kind == NodeKind::Event)
    }

    /// Add a validated connection between sockets
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_socket: impl Into<SocketId>,
        to_node: NodeId,
        to_socket: impl Into<SocketId>,
    ) -> Result<ConnectionId, ValidationError> {
        let connection = Connection::new(from_node, from_socket.into(), to_node, to_socket.into());
        self.insert_connection(connection)
    }

    /// Insert a fully formed connection after validating it
    pub fn insert_connection(&mut self, connection: Connection) -> Result<ConnectionId, ValidationError> {
        if self.connections.contains_key(&connection.id) {
            return Err(ValidationError::DuplicateId {
                id: connection.id.to_string(),
            });
        }
        self.check_connection(&connection)?;

        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Check a connection against the graph without inserting it
    pub fn check_connection(&self, connection: &Connection) -> Result<(), ValidationError> {
        let source = self.endpoint(connection.from_node, &connection.from_socket, SocketDirection::Output)?;
        let target = self.endpoint(connection.to_node, &connection.to_socket, SocketDirection::Input)?;

        if !source.can_connect_to(&target) {
            return Err(ValidationError::TypeMismatch {
                node_id: connection.to_node,
                socket_id: connection.to_socket.clone(),
                from: source,
                to: target,
            });
        }

        let mut incoming = self
            .connections
            .values()
            .filter(|c| c.id != connection.id && c.targets(connection.to_node, &connection.to_socket));

        if let Some(existing) = incoming
            .clone()
            .find(|c| c.originates(connection.from_node, &connection.from_socket))
        {
            return Err(ValidationError::AlreadyConnected {
                connection_id: existing.id,
            });
        }

        let multi_connect = self
            .node(connection.to_node)
            .and_then(|n| n.input(&connection.to_socket))
            .is_some_and(|s| s.multi_connect);
        if !multi_connect && incoming.next().is_some() {
            return Err(ValidationError::SocketOccupied {
                node_id: connection.to_node,
                socket_id: connection.to_socket.clone(),
            });
        }

        Ok(())
    }

    fn endpoint(
        &self,
        node_id: NodeId,
        socket_id: &SocketId,
        direction: SocketDirection,
    ) -> Result<SocketType, ValidationError> {
        let node = self.nodes.get(&node_id).ok_or(ValidationError::DanglingReference {
            node_id,
            socket_id: Some(socket_id.clone()),
        })?;

        if let Some(socket) = node.socket(socket_id, direction) {
            return Ok(socket.socket_type);
        }

        if node.any_socket(socket_id).is_some() {
            Err(ValidationError::DirectionMismatch {
                node_id,
                socket_id: socket_id.clone(),
            })
        } else {
            Err(ValidationError::DanglingReference {
                node_id,
                socket_id: Some(socket_id.clone()),
            })
        }
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connections leaving a specific output socket, in insertion order
    pub fn connections_from<'a>(
        &'a self,
        node_id: NodeId,
        socket_id: &'a SocketId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .values()
            .filter(move |c| c.originates(node_id, socket_id))
    }

    /// The first connection arriving at a specific input socket
    pub fn connection_into(&self, node_id: NodeId, socket_id: &SocketId) -> Option<&Connection> {
        self.connections.values().find(|c| c.targets(node_id, socket_id))
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Declare or replace a graph variable
    pub fn declare_variable(&mut self, name: impl Into<String>, decl: VariableDecl) {
        self.variables.insert(name.into(), decl);
    }

    /// Remove a graph variable
    pub fn remove_variable(&mut self, name: &str) -> Option<VariableDecl> {
        self.variables.shift_remove(name)
    }

    /// Get a variable declaration
    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.get(name)
    }

    /// Get all variable declarations in declaration order
    pub fn variables(&self) -> impl Iterator<Item = (&String, &VariableDecl)> {
        self.variables.iter()
    }

    /// Re-check every invariant, for graphs that did not come through the
    /// mutation API (deserialized documents, imports)
    pub fn validate(&self, registry: &NodeRegistry) -> Result<(), ValidationError> {
        for (key, node) in &self.nodes {
            if *key != node.id {
                return Err(ValidationError::KeyMismatch {
                    key: key.to_string(),
                    id: node.id.to_string(),
                });
            }
            registry.check_node(node)?;
        }
        for (key, connection) in &self.connections {
            if *key != connection.id {
                return Err(ValidationError::KeyMismatch {
                    key: key.to_string(),
                    id: connection.id.to_string(),
                });
            }
        }

        let mut checked = Graph::with_id(self.id, self.name.clone());
        checked.nodes = self.nodes.clone();
        for connection in self.connections.values() {
            checked.insert_connection(connection.clone())?;
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error raised synchronously when a mutation would break a graph invariant
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Node type is not registered
    #[error("Unknown node type: {node_type}")]
    UnknownNodeType {
        /// Requested type name
        node_type: String,
    },

    /// Socket types are incompatible
    #[error("Type mismatch on {node_id}.{socket_id}: cannot connect {from} to {to}")]
    TypeMismatch {
        /// Target node
        node_id: NodeId,
        /// Target socket
        socket_id: SocketId,
        /// Source socket type
        from: SocketType,
        /// Target socket type
        to: SocketType,
    },

    /// Target input already has an incoming connection
    #[error("Socket already occupied: {node_id}.{socket_id}")]
    SocketOccupied {
        /// Target node
        node_id: NodeId,
        /// Target socket
        socket_id: SocketId,
    },

    /// Referenced node or socket does not exist
    #[error("Dangling reference: node {node_id}, socket {socket_id:?}")]
    DanglingReference {
        /// Referenced node
        node_id: NodeId,
        /// Referenced socket, if any
        socket_id: Option<SocketId>,
    },

    /// Connection does not run from an output to an input
    #[error("Wrong socket direction: {node_id}.{socket_id}")]
    DirectionMismatch {
        /// Offending node
        node_id: NodeId,
        /// Offending socket
        socket_id: SocketId,
    },

    /// The same two sockets are already connected
    #[error("Sockets already connected by {connection_id}")]
    AlreadyConnected {
        /// Existing connection
        connection_id: ConnectionId,
    },

    /// Node kind or sockets differ from the registered definition
    #[error("Node {node_id} does not match {node_type}: {detail}")]
    ShapeMismatch {
        /// Offending node
        node_id: NodeId,
        /// Registered type it claims to be
        node_type: String,
        /// First difference found
        detail: String,
    },

    /// Document map key differs from the id stored under it
    #[error("Key {key} holds an entry with id {id}")]
    KeyMismatch {
        /// Map key
        key: String,
        /// Entry id
        id: String,
    },

    /// ID already present in the graph
    #[error("Duplicate id: {id}")]
    DuplicateId {
        /// Offending ID
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::create_builtin_registry;

    fn add(graph: &mut Graph, registry: &NodeRegistry, node_type: &str) -> NodeId {
        let node = registry.instantiate(node_type, [0.0, 0.0], IndexMap::new()).unwrap();
        graph.insert_node(node).unwrap()
    }

    #[test]
    fn test_second_connection_to_data_input_rejected() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &registry, "FloatConstant");
        let b = add(&mut graph, &registry, "FloatConstant");
        let sum = add(&mut graph, &registry, "Add");

        graph.connect(a, "value_out", sum, "a_in").unwrap();
        let before = graph.clone();

        let err = graph.connect(b, "value_out", sum, "a_in").unwrap_err();
        assert!(matches!(err, ValidationError::SocketOccupied { node_id, .. } if node_id == sum));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_exec_input_accepts_merges() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let start = add(&mut graph, &registry, "Start");
        let update = add(&mut graph, &registry, "OnUpdate");
        let print = add(&mut graph, &registry, "Print");

        graph.connect(start, "exec_out", print, "exec_in").unwrap();
        graph.connect(update, "exec_out", print, "exec_in").unwrap();
        assert_eq!(graph.connection_count(), 2);

        let err = graph.connect(start, "exec_out", print, "exec_in").unwrap_err();
        assert!(matches!(err, ValidationError::AlreadyConnected { .. }));
    }

    #[test]
    fn test_exec_to_data_is_type_mismatch() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let start = add(&mut graph, &registry, "Start");
        let sum = add(&mut graph, &registry, "Add");

        let err = graph.connect(start, "exec_out", sum, "a_in").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch { from: SocketType::Exec, to: SocketType::Float, .. }
        ));
    }

    #[test]
    fn test_object_socket_accepts_other_types() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let text = add(&mut graph, &registry, "StringConstant");
        let destroy = add(&mut graph, &registry, "DestroyObject");
        graph.connect(text, "value_out", destroy, "object_in").unwrap();

        // and out of an object socket into a typed one
        let trigger = add(&mut graph, &registry, "OnTriggerEnter");
        let set_text = add(&mut graph, &registry, "SetText");
        graph.connect(trigger, "other_out", set_text, "text_in").unwrap();
    }

    #[test]
    fn test_dangling_and_direction() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &registry, "FloatConstant");
        let sum = add(&mut graph, &registry, "Add");
        let ghost = NodeId::new();

        assert!(matches!(
            graph.connect(ghost, "value_out", sum, "a_in"),
            Err(ValidationError::DanglingReference { node_id, .. }) if node_id == ghost
        ));
        assert!(matches!(
            graph.connect(a, "missing_out", sum, "a_in"),
            Err(ValidationError::DanglingReference { .. })
        ));
        assert!(matches!(
            graph.connect(sum, "a_in", a, "value_out"),
            Err(ValidationError::DirectionMismatch { .. })
        ));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_remove_node_cascades() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &registry, "FloatConstant");
        let b = add(&mut graph, &registry, "FloatConstant");
        let sum = add(&mut graph, &registry, "Add");
        graph.connect(a, "value_out", sum, "a_in").unwrap();
        graph.connect(b, "value_out", sum, "b_in").unwrap();

        let (_, removed) = graph.remove_node(sum).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.connection_count(), 0);
        assert!(graph
            .connections()
            .all(|c| graph.contains_node(c.from_node) && graph.contains_node(c.to_node)));
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let mut node = registry.instantiate("Print", [0.0, 0.0], IndexMap::new()).unwrap();
        node.node_type = "Teleport".to_string();
        graph.insert_node(node).unwrap();

        assert!(matches!(
            graph.validate(&registry),
            Err(ValidationError::UnknownNodeType { node_type }) if node_type == "Teleport"
        ));
    }

    #[test]
    fn test_validate_rejects_altered_socket_shape() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let mut node = registry.instantiate("Add", [0.0, 0.0], IndexMap::new()).unwrap();
        node.inputs[0].multi_connect = true;
        graph.insert_node(node).unwrap();

        assert!(matches!(
            graph.validate(&registry),
            Err(ValidationError::ShapeMismatch { node_type, .. }) if node_type == "Add"
        ));
    }

    #[test]
    fn test_validate_rejects_mismatched_keys() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &registry, "FloatConstant");
        let sum = add(&mut graph, &registry, "Add");
        let id = graph.connect(a, "value_out", sum, "a_in").unwrap();
        graph.validate(&registry).unwrap();

        let mut renamed = graph.clone();
        let connection = renamed.connections.shift_remove(&id).unwrap();
        renamed.connections.insert(ConnectionId::new(), connection);
        assert!(matches!(renamed.validate(&registry), Err(ValidationError::KeyMismatch { .. })));

        let mut renamed = graph;
        let node = renamed.nodes.shift_remove(&a).unwrap();
        renamed.nodes.insert(NodeId::new(), node);
        assert!(matches!(renamed.validate(&registry), Err(ValidationError::KeyMismatch { .. })));
    }

    #[test]
    fn test_serialization() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("roundtrip");
        let a = add(&mut graph, &registry, "FloatConstant");
        let sum = add(&mut graph, &registry, "Add");
        graph.connect(a, "value_out", sum, "a_in").unwrap();

        let ron_str = ron::ser::to_string_pretty(&graph, ron::ser::PrettyConfig::default()).unwrap();
        let loaded: Graph = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, graph);
        loaded.validate(&registry).unwrap();
    }
}
