// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canvas selection state.
//!
//! Nodes and connections are selected exclusively: selecting one kind
//! clears the other.

use ignis_blueprint::{ConnectionId, NodeId};
use serde::{Deserialize, Serialize};

/// Selected nodes and connections, in selection order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Currently selected nodes
    pub nodes: Vec<NodeId>,
    /// Currently selected connections
    pub connections: Vec<ConnectionId>,
}

impl Selection {
    /// Create a new empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a node; `additive` keeps the current node selection
    pub fn select_node(&mut self, id: NodeId, additive: bool) {
        self.connections.clear();
        if !additive {
            self.nodes.clear();
        }
        if !self.nodes.contains(&id) {
            self.nodes.push(id);
        }
    }

    /// Select a connection; `additive` keeps the current connection selection
    pub fn select_connection(&mut self, id: ConnectionId, additive: bool) {
        self.nodes.clear();
        if !additive {
            self.connections.clear();
        }
        if !self.connections.contains(&id) {
            self.connections.push(id);
        }
    }

    /// Replace the selection with a set of nodes
    pub fn set_nodes(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.clear();
        for id in nodes {
            self.select_node(id, true);
        }
    }

    /// Check if a node is selected
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Check if a connection is selected
    pub fn contains_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }

    /// Drop ids that no longer exist
    pub fn retain(&mut self, node_exists: impl Fn(NodeId) -> bool, connection_exists: impl Fn(ConnectionId) -> bool) {
        self.nodes.retain(|n| node_exists(*n));
        self.connections.retain(|c| connection_exists(*c));
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
    }

    /// Check if the selection is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_additive() {
        let mut selection = Selection::new();
        let (a, b) = (NodeId::new(), NodeId::new());

        selection.select_node(a, false);
        selection.select_node(b, false);
        assert_eq!(selection.nodes, vec![b]);

        selection.select_node(a, true);
        selection.select_node(a, true);
        assert_eq!(selection.nodes, vec![b, a]);
    }

    #[test]
    fn test_kinds_are_exclusive() {
        let mut selection = Selection::new();
        let node = NodeId::new();
        let connection = ConnectionId::new();

        selection.select_node(node, false);
        selection.select_connection(connection, true);
        assert!(selection.nodes.is_empty());
        assert!(selection.contains_connection(connection));

        selection.select_node(node, true);
        assert!(selection.connections.is_empty());
        assert!(selection.contains_node(node));
    }
}
