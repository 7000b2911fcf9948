// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node instances placed in a blueprint graph.

use crate::socket::{Socket, SocketDirection, SocketId, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Execution role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Entry point fired by a host lifecycle callback
    Event,
    /// Side-effecting node sequenced by exec connections
    Exec,
    /// Pure node evaluated on demand by its consumers
    Data,
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Registry key of the node definition
    pub node_type: String,
    /// Execution role
    pub kind: NodeKind,
    /// Display title (can be customized)
    pub title: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Input sockets
    pub inputs: Vec<Socket>,
    /// Output sockets
    pub outputs: Vec<Socket>,
    /// Node-local literal configuration
    pub data: IndexMap<String, Value>,
}

impl Node {
    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Get an input socket by ID
    pub fn input(&self, socket_id: &SocketId) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.id == *socket_id)
    }

    /// Get an output socket by ID
    pub fn output(&self, socket_id: &SocketId) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.id == *socket_id)
    }

    /// Get a socket by ID and direction
    pub fn socket(&self, socket_id: &SocketId, direction: SocketDirection) -> Option<&Socket> {
        match direction {
            SocketDirection::Input => self.input(socket_id),
            SocketDirection::Output => self.output(socket_id),
        }
    }

    /// Get a socket by ID in either direction
    pub fn any_socket(&self, socket_id: &SocketId) -> Option<&Socket> {
        self.input(socket_id).or_else(|| self.output(socket_id))
    }

    /// Get all sockets
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Exec output sockets in declaration order
    pub fn exec_outputs(&self) -> impl Iterator<Item = &Socket> {
        self.outputs.iter().filter(|s| s.socket_type.is_exec())
    }

    /// Data input sockets in declaration order
    pub fn data_inputs(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().filter(|s| !s.socket_type.is_exec())
    }

    /// Read a node data entry
    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Read a node data entry as a string
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}
