// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint graph engine for Ignis.
//!
//! Users assemble game logic as a directed graph of typed nodes. This crate
//! provides:
//! - the graph data model (sockets, nodes, connections, variables)
//! - the node registry and the built-in node library
//! - a live interpreter that runs a graph snapshot from an event node
//! - a deterministic generator emitting a Unity `MonoBehaviour` in C#
//!
//! ## Architecture
//!
//! Node types are plain data plus two optional capabilities: a
//! [`NodeBehavior`] for the interpreter and a [`NodeEmitter`] for code
//! generation. Both consumers read an immutable [`Graph`] and never mutate it.

pub mod socket;
pub mod node;
pub mod connection;
pub mod graph;
pub mod registry;
pub mod library;
pub mod interpreter;
pub mod codegen;
pub mod message;

pub use socket::{Socket, SocketDirection, SocketId, SocketType, Value};
pub use node::{Node, NodeId, NodeKind};
pub use connection::{Connection, ConnectionId};
pub use graph::{Graph, GraphId, ValidationError, VariableDecl};
pub use registry::{NodeBehavior, NodeCategory, NodeDefinition, NodeEmitter, NodeRegistry};
pub use library::create_builtin_registry;
pub use interpreter::{
    ExecutionError, Interpreter, InterpreterConfig, RecordingHost, Run, RunOutcome, RunState, RuntimeHost,
};
pub use codegen::{generate, CodegenError};
pub use message::RuntimeMessage;
