// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph mutations as data.
//!
//! Every store edit, local or arriving from the collaboration layer, is
//! expressed as a [`GraphOperation`] and applied through [`GraphOperation::apply`],
//! so both paths share one set of validation rules.

use crate::store::StoreError;
use ignis_blueprint::{
    Connection, ConnectionId, Graph, Node, NodeId, NodeRegistry, SocketId, SocketType, ValidationError, Value,
    VariableDecl,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Partial update of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// New display title
    #[serde(default)]
    pub title: Option<String>,
    /// New canvas position
    #[serde(default)]
    pub position: Option<[f32; 2]>,
    /// Data entries to insert or replace
    #[serde(default)]
    pub data: IndexMap<String, Value>,
    /// Input literal defaults to set; `Null` clears a default
    #[serde(default)]
    pub input_defaults: IndexMap<SocketId, Value>,
}

impl NodeUpdate {
    /// Update only the title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Update only the position
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            position: Some([x, y]),
            ..Default::default()
        }
    }

    /// Add a data entry
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Add an input literal default
    pub fn with_input_default(mut self, socket_id: impl Into<SocketId>, value: Value) -> Self {
        self.input_defaults.insert(socket_id.into(), value);
        self
    }

    fn apply(&self, node: &mut Node) -> Result<(), ValidationError> {
        // Check everything before touching the node
        for (socket_id, value) in &self.input_defaults {
            let socket = node.input(socket_id).ok_or_else(|| ValidationError::DanglingReference {
                node_id: node.id,
                socket_id: Some(socket_id.clone()),
            })?;
            if let Some(found) = value.socket_type() {
                if !literal_fits(found, socket.socket_type) {
                    return Err(ValidationError::TypeMismatch {
                        node_id: node.id,
                        socket_id: socket_id.clone(),
                        from: found,
                        to: socket.socket_type,
                    });
                }
            }
        }

        if let Some(title) = &self.title {
            node.title = title.clone();
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        for (key, value) in &self.data {
            node.data.insert(key.clone(), value.clone());
        }
        for (socket_id, value) in &self.input_defaults {
            if let Some(socket) = node.inputs.iter_mut().find(|s| s.id == *socket_id) {
                socket.default_value = (!value.is_null()).then(|| value.clone());
            }
        }
        Ok(())
    }
}

fn literal_fits(found: SocketType, expected: SocketType) -> bool {
    found == expected
        || expected == SocketType::Object
        || (found == SocketType::Int && expected == SocketType::Float)
}

/// A single graph mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum GraphOperation {
    /// Insert a node
    AddNode {
        /// Fully formed node, id included
        node: Node,
    },
    /// Remove a node and every connection touching it
    RemoveNode {
        /// Node to remove
        node_id: NodeId,
    },
    /// Partially update a node
    UpdateNode {
        /// Node to update
        node_id: NodeId,
        /// Fields to change
        update: NodeUpdate,
    },
    /// Insert a connection
    AddConnection {
        /// Fully formed connection, id included
        connection: Connection,
    },
    /// Remove a connection
    RemoveConnection {
        /// Connection to remove
        connection_id: ConnectionId,
    },
    /// Declare or replace a graph variable
    DeclareVariable {
        /// Variable name
        name: String,
        /// Declaration
        decl: VariableDecl,
    },
    /// Remove a graph variable
    RemoveVariable {
        /// Variable name
        name: String,
    },
}

impl GraphOperation {
    /// Short description for history entries
    pub fn description(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "Add node",
            Self::RemoveNode { .. } => "Delete node",
            Self::UpdateNode { .. } => "Update node",
            Self::AddConnection { .. } => "Connect",
            Self::RemoveConnection { .. } => "Disconnect",
            Self::DeclareVariable { .. } => "Declare variable",
            Self::RemoveVariable { .. } => "Remove variable",
        }
    }

    /// Apply to a graph; on error the graph may be partially modified, so
    /// callers apply to a scratch copy
    pub fn apply(&self, graph: &mut Graph, registry: &NodeRegistry) -> Result<(), StoreError> {
        match self {
            Self::AddNode { node } => {
                registry.check_node(node)?;
                graph.insert_node(node.clone())?;
            }
            Self::RemoveNode { node_id } => {
                graph
                    .remove_node(*node_id)
                    .ok_or(StoreError::NodeNotFound { node_id: *node_id })?;
            }
            Self::UpdateNode { node_id, update } => {
                let node = graph
                    .node_mut(*node_id)
                    .ok_or(StoreError::NodeNotFound { node_id: *node_id })?;
                update.apply(node)?;
            }
            Self::AddConnection { connection } => {
                graph.insert_connection(connection.clone())?;
            }
            Self::RemoveConnection { connection_id } => {
                graph
                    .disconnect(*connection_id)
                    .ok_or(StoreError::ConnectionNotFound {
                        connection_id: *connection_id,
                    })?;
            }
            Self::DeclareVariable { name, decl } => {
                graph.declare_variable(name.clone(), decl.clone());
            }
            Self::RemoveVariable { name } => {
                graph
                    .remove_variable(name)
                    .ok_or_else(|| StoreError::VariableNotFound { name: name.clone() })?;
            }
        }
        Ok(())
    }
}
