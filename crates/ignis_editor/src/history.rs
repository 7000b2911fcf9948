// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of graph snapshots.
//!
//! Every committed store mutation records the graph before and after as
//! bincode snapshots. Undo restores `before`, redo restores `after`.

use ignis_blueprint::{Graph, GraphId};
use std::collections::VecDeque;
use thiserror::Error;

/// Default maximum undo history depth
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Serialized graph state
#[derive(Debug, Clone)]
struct GraphSnapshot {
    /// bincode-encoded graph
    data: Vec<u8>,
}

impl GraphSnapshot {
    fn capture(graph: &Graph) -> Result<Self> {
        Ok(Self {
            data: bincode::serialize(graph)?,
        })
    }

    fn restore(&self) -> Result<Graph> {
        Ok(bincode::deserialize(&self.data)?)
    }
}

/// A committed mutation that can be undone and redone
#[derive(Debug, Clone)]
struct Operation {
    /// Human-readable description
    description: String,
    /// Graph the operation applies to
    graph_id: GraphId,
    /// State before operation (for undo)
    before: GraphSnapshot,
    /// State after operation (for redo)
    after: GraphSnapshot,
}

impl Operation {
    fn memory_size(&self) -> usize {
        self.before.data.len() + self.after.data.len()
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Operations in undo stack
    pub undo_count: usize,
    /// Operations in redo stack
    pub redo_count: usize,
    /// Total memory used by history (bytes)
    pub memory_used: usize,
    /// Maximum history depth
    pub max_depth: usize,
    /// Description of the operation undo would revert
    pub next_undo: Option<String>,
    /// Description of the operation redo would re-apply
    pub next_redo: Option<String>,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Operation>,
    redo_stack: VecDeque<Operation>,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create with a maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            memory_used: 0,
        }
    }

    /// Record a mutation of a graph from `before` to `after`
    pub fn record(&mut self, description: impl Into<String>, before: &Graph, after: &Graph) -> Result<()> {
        let operation = Operation {
            description: description.into(),
            graph_id: after.id,
            before: GraphSnapshot::capture(before)?,
            after: GraphSnapshot::capture(after)?,
        };

        // New work invalidates the redo branch
        self.redo_stack.clear();

        self.memory_used += operation.memory_size();
        self.undo_stack.push_back(operation);

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }

        Ok(())
    }

    /// Pop the last operation, returning the graph to restore
    pub fn undo(&mut self) -> Result<(GraphId, Graph)> {
        let operation = self.undo_stack.back().ok_or(HistoryError::NothingToUndo)?;
        let graph = operation.before.restore()?;
        let graph_id = operation.graph_id;

        if let Some(operation) = self.undo_stack.pop_back() {
            self.memory_used = self.memory_used.saturating_sub(operation.memory_size());
            self.redo_stack.push_back(operation);
        }
        Ok((graph_id, graph))
    }

    /// Re-apply the last undone operation, returning the graph to restore
    pub fn redo(&mut self) -> Result<(GraphId, Graph)> {
        let operation = self.redo_stack.back().ok_or(HistoryError::NothingToRedo)?;
        let graph = operation.after.restore()?;
        let graph_id = operation.graph_id;

        if let Some(operation) = self.redo_stack.pop_back() {
            self.memory_used += operation.memory_size();
            self.undo_stack.push_back(operation);
        }
        Ok((graph_id, graph))
    }

    /// Drop every operation that touches a graph
    pub fn forget_graph(&mut self, graph_id: GraphId) {
        self.undo_stack.retain(|op| op.graph_id != graph_id);
        self.redo_stack.retain(|op| op.graph_id != graph_id);
        self.memory_used = self.undo_stack.iter().map(Operation::memory_size).sum();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
            next_undo: self.undo_stack.back().map(|op| op.description.clone()),
            next_redo: self.redo_stack.back().map(|op| op.description.clone()),
        }
    }
}
