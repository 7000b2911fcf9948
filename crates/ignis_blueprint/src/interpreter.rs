// SPDX-License-Identifier: MIT OR Apache-2.0
//! Live graph interpretation.
//!
//! A [`Run`] walks a graph snapshot from one event node. Exec chains are
//! followed eagerly; data inputs are evaluated lazily by pulling upstream
//! data nodes, memoized per run. Each call to [`Interpreter::step`] executes
//! exactly one exec node, so callers may cancel at any node boundary.

use crate::graph::Graph;
use crate::message::RuntimeMessage;
use crate::node::{Node, NodeId, NodeKind};
use crate::registry::NodeRegistry;
use crate::socket::{SocketId, SocketType, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

static NULL: Value = Value::Null;

/// Host-side sink for the side effects of a run
pub trait RuntimeHost {
    /// Print a message (the `Print` node)
    fn print(&mut self, message: &str);

    /// Hand a message to the host runtime
    fn emit(&mut self, message: RuntimeMessage);
}

/// A host that records every side effect, for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    /// Printed messages in order
    pub printed: Vec<String>,
    /// Emitted runtime messages in order
    pub emitted: Vec<RuntimeMessage>,
}

impl RuntimeHost for RecordingHost {
    fn print(&mut self, message: &str) {
        self.printed.push(message.to_string());
    }

    fn emit(&mut self, message: RuntimeMessage) {
        self.emitted.push(message);
    }
}

/// Context handed to node behaviors: host side effects plus run variables
pub struct RuntimeContext<'a> {
    host: &'a mut dyn RuntimeHost,
    variables: &'a mut IndexMap<String, Value>,
    variables_written: bool,
}

impl<'a> RuntimeContext<'a> {
    fn new(host: &'a mut dyn RuntimeHost, variables: &'a mut IndexMap<String, Value>) -> Self {
        Self {
            host,
            variables,
            variables_written: false,
        }
    }

    /// Print through the host
    pub fn print(&mut self, message: &str) {
        tracing::info!(target: "blueprint", "{message}");
        self.host.print(message);
    }

    /// Send a message to the host runtime
    pub fn emit(&mut self, kind: impl Into<String>, payload: serde_json::Value) {
        self.host.emit(RuntimeMessage::new(kind, payload));
    }

    /// Read a run variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Write a run variable
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
        self.variables_written = true;
    }
}

/// Resolved input values of one node execution
#[derive(Debug, Clone)]
pub struct Inputs {
    node_id: NodeId,
    values: IndexMap<SocketId, Value>,
}

impl Inputs {
    /// Create an empty input set for a node
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            values: IndexMap::new(),
        }
    }

    /// Set an input value
    pub fn insert(&mut self, socket_id: SocketId, value: Value) {
        self.values.insert(socket_id, value);
    }

    /// Raw value of an input, `Null` when absent
    pub fn value(&self, socket_id: &str) -> &Value {
        self.values
            .iter()
            .find(|(id, _)| id.as_str() == socket_id)
            .map_or(&NULL, |(_, v)| v)
    }

    fn invalid(&self, socket_id: &str, expected: SocketType) -> ExecutionError {
        ExecutionError::InvalidValue {
            node_id: self.node_id,
            socket_id: SocketId::new(socket_id),
            expected,
            found: format!("{:?}", self.value(socket_id)),
        }
    }

    /// Read a float input; `Null` reads as zero and integers are widened
    pub fn float(&self, socket_id: &str) -> Result<f64, ExecutionError> {
        match self.value(socket_id) {
            Value::Null => Ok(0.0),
            v => v.as_float().ok_or_else(|| self.invalid(socket_id, SocketType::Float)),
        }
    }

    /// Read an integer input; `Null` reads as zero and floats are truncated
    pub fn int(&self, socket_id: &str) -> Result<i64, ExecutionError> {
        match self.value(socket_id) {
            Value::Null => Ok(0),
            v => v.as_int().ok_or_else(|| self.invalid(socket_id, SocketType::Int)),
        }
    }

    /// Read a boolean input; `Null` reads as false
    pub fn bool(&self, socket_id: &str) -> Result<bool, ExecutionError> {
        match self.value(socket_id) {
            Value::Null => Ok(false),
            v => v.as_bool().ok_or_else(|| self.invalid(socket_id, SocketType::Bool)),
        }
    }

    /// Read a vector input; `Null` reads as the zero vector
    pub fn vector(&self, socket_id: &str) -> Result<[f64; 3], ExecutionError> {
        match self.value(socket_id) {
            Value::Null => Ok([0.0; 3]),
            v => v.as_vector().ok_or_else(|| self.invalid(socket_id, SocketType::Vector)),
        }
    }

    /// Read any input as text, `None` when it is `Null`
    pub fn text(&self, socket_id: &str) -> Option<String> {
        match self.value(socket_id) {
            Value::Null => None,
            v => Some(v.to_string()),
        }
    }
}

/// Why a run stopped without terminating
#[derive(Debug, Clone, PartialEq)]
pub enum SuspendReason {
    /// Continue after a number of seconds
    Delay {
        /// Seconds to wait
        seconds: f64,
    },
}

/// Result of executing one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Output values of a data node
    Values(IndexMap<SocketId, Value>),
    /// Continue on an exec socket, publishing data outputs; `None` ends the thread
    Continue {
        /// Outgoing exec socket
        next: Option<SocketId>,
        /// Published data outputs
        values: IndexMap<SocketId, Value>,
    },
    /// Run several exec outputs, each chain to completion, in order
    Sequence(Vec<SocketId>),
    /// Pause the run until the caller resumes it
    Suspend {
        /// Exec socket to continue on when resumed
        resume: SocketId,
        /// Why the run paused
        reason: SuspendReason,
    },
}

impl NodeOutcome {
    /// A data node producing one value
    pub fn value(socket_id: impl Into<SocketId>, value: Value) -> Self {
        let mut values = IndexMap::new();
        values.insert(socket_id.into(), value);
        Self::Values(values)
    }

    /// Continue on an exec socket without publishing data
    pub fn next(socket_id: impl Into<SocketId>) -> Self {
        Self::Continue {
            next: Some(socket_id.into()),
            values: IndexMap::new(),
        }
    }

    /// End this execution thread
    pub fn end() -> Self {
        Self::Continue {
            next: None,
            values: IndexMap::new(),
        }
    }
}

/// Unique identifier of a run, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every execution thread reached a socket with no outgoing connection
    Completed,
    /// A node failed; the graph and other runs are unaffected
    Failed {
        /// Exec node being executed when the error occurred
        node_id: NodeId,
        /// The error
        error: ExecutionError,
    },
    /// The caller abandoned the run
    Cancelled,
}

/// Run state machine
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Created, nothing executed yet
    Idle,
    /// The given exec node executes on the next step
    Running {
        /// Next node
        node: NodeId,
    },
    /// Waiting for the caller to resume
    Suspended {
        /// Node that suspended
        node: NodeId,
        /// Exec socket to continue on
        resume: SocketId,
        /// Why the run paused
        reason: SuspendReason,
    },
    /// Finished
    Terminated(RunOutcome),
}

impl RunState {
    /// Whether the run can make progress with [`Interpreter::step`]
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Idle | Self::Running { .. })
    }
}

/// Interpreter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Maximum exec nodes one run may execute; `None` leaves loops unbounded
    pub max_steps: Option<u64>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(100_000),
        }
    }
}

/// One execution of a graph snapshot from one event node
#[derive(Debug)]
pub struct Run {
    id: RunId,
    graph: Arc<Graph>,
    entry: NodeId,
    /// Exec output the entry fires, its first one when unset
    entry_socket: Option<SocketId>,
    state: RunState,
    /// Exec nodes waiting to execute; the top runs next
    pending: Vec<NodeId>,
    /// Data node outputs evaluated in this run
    memo: HashMap<NodeId, IndexMap<SocketId, Value>>,
    /// Data outputs published by exec and event nodes
    published: HashMap<NodeId, IndexMap<SocketId, Value>>,
    variables: IndexMap<String, Value>,
    steps: u64,
}

impl Run {
    fn new(graph: Arc<Graph>, entry: NodeId) -> Self {
        let variables = graph
            .variables()
            .map(|(name, decl)| (name.clone(), decl.initial_value()))
            .collect();
        Self {
            id: RunId(Uuid::new_v4()),
            graph,
            entry,
            entry_socket: None,
            state: RunState::Idle,
            pending: Vec::new(),
            memo: HashMap::new(),
            published: HashMap::new(),
            variables,
            steps: 0,
        }
    }

    /// Run ID
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Event node the run started from
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Graph snapshot the run executes
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Number of exec nodes executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current value of a run variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Abandon the run at the current node boundary
    pub fn cancel(&mut self) {
        if !matches!(self.state, RunState::Terminated(_)) {
            tracing::debug!(run = %self.id, "Run cancelled");
            self.memo.clear();
            self.pending.clear();
            self.state = RunState::Terminated(RunOutcome::Cancelled);
        }
    }

    /// Queue the targets of `sockets` on `node_id` so the first socket's chain runs first
    fn schedule(&mut self, node_id: NodeId, sockets: &[SocketId]) {
        let targets: Vec<NodeId> = sockets
            .iter()
            .flat_map(|socket| self.graph.connections_from(node_id, socket).map(|c| c.to_node))
            .collect();
        self.pending.extend(targets.into_iter().rev());
    }

    fn advance(&mut self) {
        self.state = match self.pending.pop() {
            Some(node) => RunState::Running { node },
            None => RunState::Terminated(RunOutcome::Completed),
        };
    }

    fn fail(&mut self, node_id: NodeId, error: ExecutionError) {
        tracing::debug!(run = %self.id, node = %node_id, %error, "Run failed");
        self.memo.clear();
        self.pending.clear();
        self.state = RunState::Terminated(RunOutcome::Failed { node_id, error });
    }
}

/// Pull-based evaluator over one run's disjoint state
struct Evaluator<'a> {
    graph: &'a Graph,
    registry: &'a NodeRegistry,
    memo: &'a mut HashMap<NodeId, IndexMap<SocketId, Value>>,
    published: &'a HashMap<NodeId, IndexMap<SocketId, Value>>,
    variables: &'a mut IndexMap<String, Value>,
    host: &'a mut dyn RuntimeHost,
    visiting: Vec<NodeId>,
}

impl Evaluator<'_> {
    fn resolve_inputs(&mut self, node: &Node) -> Result<Inputs, ExecutionError> {
        let mut inputs = Inputs::new(node.id);
        for socket in node.data_inputs() {
            let value = match self.graph.connection_into(node.id, &socket.id) {
                Some(connection) => self.upstream_value(node.id, &socket.id, connection.from_node, &connection.from_socket)?,
                None => socket.default_value.clone().unwrap_or_default(),
            };
            if socket.required && value.is_null() {
                return Err(ExecutionError::UnresolvedSocket {
                    node_id: node.id,
                    socket_id: socket.id.clone(),
                });
            }
            inputs.insert(socket.id.clone(), value);
        }
        Ok(inputs)
    }

    fn upstream_value(
        &mut self,
        node_id: NodeId,
        socket_id: &SocketId,
        source_id: NodeId,
        source_socket: &SocketId,
    ) -> Result<Value, ExecutionError> {
        let graph = self.graph;
        let source = graph
            .node(source_id)
            .ok_or(ExecutionError::NodeNotFound { node_id: source_id })?;

        match source.kind {
            NodeKind::Data => self.data_output(source, source_socket),
            NodeKind::Exec | NodeKind::Event => self
                .published
                .get(&source_id)
                .and_then(|values| values.get(source_socket))
                .cloned()
                .ok_or_else(|| ExecutionError::UnresolvedSocket {
                    node_id,
                    socket_id: socket_id.clone(),
                }),
        }
    }

    fn data_output(&mut self, node: &Node, socket_id: &SocketId) -> Result<Value, ExecutionError> {
        if !self.memo.contains_key(&node.id) {
            if self.visiting.contains(&node.id) {
                return Err(ExecutionError::CyclicDependency { node_id: node.id });
            }
            self.visiting.push(node.id);

            let inputs = self.resolve_inputs(node)?;
            let behavior = self
                .registry
                .get(&node.node_type)
                .and_then(|d| d.node_behavior())
                .ok_or_else(|| ExecutionError::UnresolvedSocket {
                    node_id: node.id,
                    socket_id: socket_id.clone(),
                })?;

            let mut ctx = RuntimeContext::new(&mut *self.host, &mut *self.variables);
            let values = match behavior.execute(node, &inputs, &mut ctx)? {
                NodeOutcome::Values(values) => values,
                _ => return Err(ExecutionError::UnexpectedOutcome { node_id: node.id }),
            };

            self.visiting.pop();
            self.memo.insert(node.id, values);
        } else {
            tracing::trace!(node = %node.id, "Memoized data node");
        }

        self.memo
            .get(&node.id)
            .and_then(|values| values.get(socket_id))
            .cloned()
            .ok_or_else(|| ExecutionError::UnresolvedSocket {
                node_id: node.id,
                socket_id: socket_id.clone(),
            })
    }
}

/// Graph interpreter bound to a node registry
pub struct Interpreter<'r> {
    registry: &'r NodeRegistry,
    config: InterpreterConfig,
}

impl<'r> Interpreter<'r> {
    /// Create an interpreter with default settings
    pub fn new(registry: &'r NodeRegistry) -> Self {
        Self::with_config(registry, InterpreterConfig::default())
    }

    /// Create an interpreter with custom settings
    pub fn with_config(registry: &'r NodeRegistry, config: InterpreterConfig) -> Self {
        Self { registry, config }
    }

    /// Settings in use
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Prepare a run from an event node
    pub fn start(&self, graph: Arc<Graph>, event_node: NodeId) -> Result<Run, ExecutionError> {
        self.start_with_payload(graph, event_node, IndexMap::new())
    }

    /// Prepare a run from an event node whose data outputs are seeded by the host
    pub fn start_with_payload(
        &self,
        graph: Arc<Graph>,
        event_node: NodeId,
        payload: IndexMap<SocketId, Value>,
    ) -> Result<Run, ExecutionError> {
        let node = graph
            .node(event_node)
            .ok_or(ExecutionError::NodeNotFound { node_id: event_node })?;
        if node.kind != NodeKind::Event {
            return Err(ExecutionError::NotAnEventNode { node_id: event_node });
        }

        let mut run = Run::new(graph, event_node);
        if !payload.is_empty() {
            run.published.insert(event_node, payload);
        }
        Ok(run)
    }

    /// Prepare a run that leaves its event node through a chosen exec output
    pub fn start_from_socket(
        &self,
        graph: Arc<Graph>,
        event_node: NodeId,
        socket_id: SocketId,
        payload: IndexMap<SocketId, Value>,
    ) -> Result<Run, ExecutionError> {
        let is_exec_output = graph
            .node(event_node)
            .and_then(|node| node.output(&socket_id))
            .is_some_and(|socket| socket.socket_type.is_exec());

        let mut run = self.start_with_payload(graph, event_node, payload)?;
        if !is_exec_output {
            return Err(ExecutionError::NotAnExecOutput {
                node_id: event_node,
                socket_id,
            });
        }
        run.entry_socket = Some(socket_id);
        Ok(run)
    }

    /// Execute the next exec node of a run
    pub fn step<'a>(&self, run: &'a mut Run, host: &mut dyn RuntimeHost) -> &'a RunState {
        let node_id = match run.state {
            RunState::Idle => run.entry,
            RunState::Running { node } => node,
            _ => return &run.state,
        };

        if let Some(limit) = self.config.max_steps {
            if run.steps >= limit {
                run.fail(node_id, ExecutionError::StepLimitExceeded { limit });
                return &run.state;
            }
        }
        run.steps += 1;

        match self.execute_node(run, node_id, host) {
            Ok(outcome) => self.apply_outcome(run, node_id, outcome),
            Err(error) => run.fail(node_id, error),
        }
        &run.state
    }

    fn execute_node(
        &self,
        run: &mut Run,
        node_id: NodeId,
        host: &mut dyn RuntimeHost,
    ) -> Result<NodeOutcome, ExecutionError> {
        let graph = Arc::clone(&run.graph);
        let node = graph
            .node(node_id)
            .ok_or(ExecutionError::NodeNotFound { node_id })?;
        tracing::debug!(run = %run.id, node = %node_id, node_type = %node.node_type, "Executing node");

        let definition = self.registry.get(&node.node_type);
        let behavior = definition.and_then(|d| d.node_behavior());
        let entry_socket = if node_id == run.entry {
            run.entry_socket.clone()
        } else {
            None
        };

        let mut evaluator = Evaluator {
            graph: &graph,
            registry: self.registry,
            memo: &mut run.memo,
            published: &run.published,
            variables: &mut run.variables,
            host,
            visiting: Vec::new(),
        };
        let inputs = evaluator.resolve_inputs(node)?;

        let outcome = match (behavior, node.kind) {
            (Some(behavior), _) => {
                let mut ctx = RuntimeContext::new(&mut *evaluator.host, &mut *evaluator.variables);
                let outcome = behavior.execute(node, &inputs, &mut ctx)?;
                if ctx.variables_written {
                    run.memo.clear();
                }
                outcome
            }
            // Events without custom behavior fire the chosen or first exec output
            (None, NodeKind::Event) => match entry_socket.or_else(|| node.exec_outputs().next().map(|s| s.id.clone())) {
                Some(socket) => NodeOutcome::next(socket),
                None => NodeOutcome::end(),
            },
            (None, _) => {
                return Err(ExecutionError::MissingBehavior {
                    node_id,
                    node_type: node.node_type.clone(),
                })
            }
        };
        Ok(outcome)
    }

    fn apply_outcome(&self, run: &mut Run, node_id: NodeId, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Continue { next, values } => {
                if !values.is_empty() {
                    run.memo.clear();
                    run.published.entry(node_id).or_default().extend(values);
                }
                if let Some(socket) = next {
                    run.schedule(node_id, &[socket]);
                }
                run.advance();
            }
            NodeOutcome::Values(values) => {
                run.memo.clear();
                run.published.entry(node_id).or_default().extend(values);
                run.advance();
            }
            NodeOutcome::Sequence(sockets) => {
                run.schedule(node_id, &sockets);
                run.advance();
            }
            NodeOutcome::Suspend { resume, reason } => {
                tracing::debug!(run = %run.id, node = %node_id, ?reason, "Run suspended");
                run.state = RunState::Suspended {
                    node: node_id,
                    resume,
                    reason,
                };
            }
        }
    }

    /// Step until the run suspends or terminates
    pub fn run_to_end<'a>(&self, run: &'a mut Run, host: &mut dyn RuntimeHost) -> &'a RunState {
        while run.state.is_runnable() {
            self.step(run, host);
        }

        if let RunState::Terminated(outcome) = &run.state {
            tracing::info!(run = %run.id, steps = run.steps, ?outcome, "Run finished");
        }
        &run.state
    }

    /// Continue a suspended run on its resume socket and step until it stops again
    pub fn resume<'a>(&self, run: &'a mut Run, host: &mut dyn RuntimeHost) -> &'a RunState {
        if let RunState::Suspended { node, resume, .. } = run.state.clone() {
            run.memo.clear();
            run.schedule(node, &[resume]);
            run.advance();
        }
        self.run_to_end(run, host)
    }

    /// Evaluate one output of a data node outside of any exec chain
    pub fn evaluate(
        &self,
        graph: &Graph,
        node_id: NodeId,
        socket_id: &SocketId,
        host: &mut dyn RuntimeHost,
    ) -> Result<Value, ExecutionError> {
        let node = graph
            .node(node_id)
            .ok_or(ExecutionError::NodeNotFound { node_id })?;
        let mut memo = HashMap::new();
        let published = HashMap::new();
        let mut variables = graph
            .variables()
            .map(|(name, decl)| (name.clone(), decl.initial_value()))
            .collect();

        let mut evaluator = Evaluator {
            graph,
            registry: self.registry,
            memo: &mut memo,
            published: &published,
            variables: &mut variables,
            host,
            visiting: Vec::new(),
        };
        evaluator.data_output(node, socket_id)
    }
}

/// Error raised during a run; terminates only that run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// A data node depends on its own output
    #[error("Cyclic data dependency through node {node_id}")]
    CyclicDependency {
        /// Node found twice on the evaluation path
        node_id: NodeId,
    },

    /// An input could not be given a value
    #[error("Unresolved socket {node_id}.{socket_id}")]
    UnresolvedSocket {
        /// Node owning the socket
        node_id: NodeId,
        /// The socket
        socket_id: SocketId,
    },

    /// Node missing from the graph snapshot
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// Missing node
        node_id: NodeId,
    },

    /// Runs can only start from event nodes
    #[error("Node {node_id} is not an event node")]
    NotAnEventNode {
        /// Offending node
        node_id: NodeId,
    },

    /// A run was asked to leave its event through a socket that is not an exec output
    #[error("Node {node_id} has no exec output {socket_id}")]
    NotAnExecOutput {
        /// Event node
        node_id: NodeId,
        /// Requested socket
        socket_id: SocketId,
    },

    /// Exec node type has no interpreter behavior
    #[error("Node {node_id} ({node_type}) cannot be executed live")]
    MissingBehavior {
        /// Offending node
        node_id: NodeId,
        /// Its type
        node_type: String,
    },

    /// An input carried a value of the wrong type
    #[error("Invalid value on {node_id}.{socket_id}: expected {expected}, found {found}")]
    InvalidValue {
        /// Node owning the socket
        node_id: NodeId,
        /// The socket
        socket_id: SocketId,
        /// Expected type
        expected: SocketType,
        /// Debug rendering of the actual value
        found: String,
    },

    /// A data node returned an exec outcome or vice versa
    #[error("Node {node_id} returned an outcome that does not match its kind")]
    UnexpectedOutcome {
        /// Offending node
        node_id: NodeId,
    },

    /// The run executed more exec nodes than allowed
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded {
        /// Configured limit
        limit: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VariableDecl;
    use crate::library::create_builtin_registry;

    struct Fixture {
        registry: NodeRegistry,
        graph: Graph,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: create_builtin_registry(),
                graph: Graph::new("test"),
            }
        }

        fn add(&mut self, node_type: &str) -> NodeId {
            let node = self.registry.instantiate(node_type, [0.0, 0.0], IndexMap::new()).unwrap();
            self.graph.insert_node(node).unwrap()
        }

        fn add_with(&mut self, node_type: &str, key: &str, value: Value) -> NodeId {
            let mut data = IndexMap::new();
            data.insert(key.to_string(), value);
            let node = self.registry.instantiate(node_type, [0.0, 0.0], data).unwrap();
            self.graph.insert_node(node).unwrap()
        }

        fn set_default(&mut self, node: NodeId, socket: &str, value: Value) {
            let node = self.graph.node_mut(node).unwrap();
            let socket = node.inputs.iter_mut().find(|s| s.id.as_str() == socket).unwrap();
            socket.default_value = Some(value);
        }

        fn connect(&mut self, from: NodeId, from_socket: &str, to: NodeId, to_socket: &str) {
            self.graph.connect(from, from_socket, to, to_socket).unwrap();
        }

        fn run(&self, entry: NodeId, config: InterpreterConfig) -> (RunState, RecordingHost) {
            let interpreter = Interpreter::with_config(&self.registry, config);
            let mut run = interpreter.start(Arc::new(self.graph.clone()), entry).unwrap();
            let mut host = RecordingHost::default();
            let state = interpreter.run_to_end(&mut run, &mut host).clone();
            (state, host)
        }
    }

    #[test]
    fn test_start_print_hello() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let print = fx.add("Print");
        fx.set_default(print, "message_in", Value::String("hello".to_string()));
        fx.connect(start, "exec_out", print, "exec_in");

        let (state, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(state, RunState::Terminated(RunOutcome::Completed));
        assert_eq!(host.printed, vec!["hello".to_string()]);
        assert!(host.emitted.is_empty());
    }

    #[test]
    fn test_print_falls_back_to_node_data() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let print = fx.add_with("Print", "message", Value::String("from data".to_string()));
        fx.connect(start, "exec_out", print, "exec_in");

        let (_, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(host.printed, vec!["from data".to_string()]);
    }

    #[test]
    fn test_add_evaluates() {
        let mut fx = Fixture::new();
        let sum = fx.add("Add");
        fx.set_default(sum, "a_in", Value::Float(5.0));
        fx.set_default(sum, "b_in", Value::Float(3.0));

        let interpreter = Interpreter::new(&fx.registry);
        let value = interpreter
            .evaluate(&fx.graph, sum, &SocketId::from("result_out"), &mut RecordingHost::default())
            .unwrap();
        assert_eq!(value, Value::Float(8.0));
    }

    #[test]
    fn test_connected_data_flows_into_print() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let a = fx.add_with("FloatConstant", "value", Value::Float(5.0));
        let b = fx.add_with("FloatConstant", "value", Value::Float(3.0));
        let sum = fx.add("Add");
        let print = fx.add("Print");
        fx.connect(a, "value_out", sum, "a_in");
        fx.connect(b, "value_out", sum, "b_in");
        fx.connect(sum, "result_out", print, "message_in");
        fx.connect(start, "exec_out", print, "exec_in");

        let (_, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(host.printed, vec!["8".to_string()]);
    }

    #[test]
    fn test_fan_out_evaluated_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn counted(_: &Node, _: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(NodeOutcome::value("value_out", Value::Float(2.0)))
        }

        let mut fx = Fixture::new();
        fx.registry.register(
            crate::registry::NodeDefinition::new(
                "Counted",
                "Counted",
                NodeKind::Data,
                crate::registry::NodeCategory::Constants,
            )
            .output(crate::socket::Socket::output("value_out", "Value", SocketType::Float))
            .behavior(counted),
        );
        let start = fx.add("Start");
        let source = fx.add("Counted");
        let sum = fx.add("Add");
        let print = fx.add("Print");
        fx.connect(source, "value_out", sum, "a_in");
        fx.connect(source, "value_out", sum, "b_in");
        fx.connect(sum, "result_out", print, "message_in");
        fx.connect(start, "exec_out", print, "exec_in");

        let (_, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(host.printed, vec!["4".to_string()]);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_branch_picks_socket() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let condition = fx.add_with("BoolConstant", "value", Value::Bool(false));
        let branch = fx.add("Branch");
        let yes = fx.add_with("Print", "message", Value::String("yes".to_string()));
        let no = fx.add_with("Print", "message", Value::String("no".to_string()));
        fx.connect(start, "exec_out", branch, "exec_in");
        fx.connect(condition, "value_out", branch, "condition_in");
        fx.connect(branch, "true_out", yes, "exec_in");
        fx.connect(branch, "false_out", no, "exec_in");

        let (_, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(host.printed, vec!["no".to_string()]);
    }

    #[test]
    fn test_sequence_runs_chains_in_order() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let sequence = fx.add("Sequence");
        let first = fx.add_with("Print", "message", Value::String("first".to_string()));
        let first_tail = fx.add_with("Print", "message", Value::String("first tail".to_string()));
        let second = fx.add_with("Print", "message", Value::String("second".to_string()));
        fx.connect(start, "exec_out", sequence, "exec_in");
        fx.connect(sequence, "then1_out", second, "exec_in");
        fx.connect(sequence, "then0_out", first, "exec_in");
        fx.connect(first, "exec_out", first_tail, "exec_in");

        let (_, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(host.printed, vec!["first", "first tail", "second"]);
    }

    #[test]
    fn test_data_cycle_is_reported() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let sum = fx.add("Add");
        let print = fx.add("Print");
        fx.connect(sum, "result_out", sum, "a_in");
        fx.connect(sum, "result_out", print, "message_in");
        fx.connect(start, "exec_out", print, "exec_in");

        let (state, host) = fx.run(start, InterpreterConfig::default());
        assert_eq!(
            state,
            RunState::Terminated(RunOutcome::Failed {
                node_id: print,
                error: ExecutionError::CyclicDependency { node_id: sum },
            })
        );
        assert!(host.printed.is_empty());
    }

    #[test]
    fn test_transitive_data_cycle() {
        let mut fx = Fixture::new();
        let a = fx.add("Add");
        let b = fx.add("Multiply");
        fx.connect(a, "result_out", b, "a_in");
        fx.connect(b, "result_out", a, "a_in");

        let interpreter = Interpreter::new(&fx.registry);
        let err = interpreter
            .evaluate(&fx.graph, a, &SocketId::from("result_out"), &mut RecordingHost::default())
            .unwrap_err();
        assert_eq!(err, ExecutionError::CyclicDependency { node_id: a });
    }

    #[test]
    fn test_runaway_exec_loop_hits_step_limit() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let print = fx.add_with("Print", "message", Value::String("tick".to_string()));
        fx.connect(start, "exec_out", print, "exec_in");
        fx.connect(print, "exec_out", print, "exec_in");

        let (state, host) = fx.run(start, InterpreterConfig { max_steps: Some(50) });
        assert!(matches!(
            state,
            RunState::Terminated(RunOutcome::Failed {
                error: ExecutionError::StepLimitExceeded { limit: 50 },
                ..
            })
        ));
        // the event node counts as one step
        assert_eq!(host.printed.len(), 49);
    }

    #[test]
    fn test_unbounded_loop_can_be_cancelled() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let print = fx.add_with("Print", "message", Value::String("tick".to_string()));
        fx.connect(start, "exec_out", print, "exec_in");
        fx.connect(print, "exec_out", print, "exec_in");

        let interpreter = Interpreter::with_config(&fx.registry, InterpreterConfig { max_steps: None });
        let mut run = interpreter.start(Arc::new(fx.graph.clone()), start).unwrap();
        let mut host = RecordingHost::default();
        for _ in 0..1_000 {
            assert!(interpreter.step(&mut run, &mut host).is_runnable());
        }
        run.cancel();
        assert_eq!(run.state(), &RunState::Terminated(RunOutcome::Cancelled));
        assert_eq!(host.printed.len(), 999);

        // stepping a terminated run is a no-op
        interpreter.step(&mut run, &mut host);
        assert_eq!(host.printed.len(), 999);
    }

    #[test]
    fn test_variables_and_counting_loop() {
        let mut fx = Fixture::new();
        fx.graph.declare_variable(
            "count",
            VariableDecl {
                variable_type: SocketType::Float,
                default_value: Some(Value::Float(0.0)),
            },
        );
        let start = fx.add("Start");
        let get = fx.add_with("GetVariable", "variable", Value::String("count".to_string()));
        let one = fx.add_with("FloatConstant", "value", Value::Float(1.0));
        let inc = fx.add("Add");
        let set = fx.add_with("SetVariable", "variable", Value::String("count".to_string()));
        let limit = fx.add_with("FloatConstant", "value", Value::Float(3.0));
        let compare = fx.add("Compare");
        let branch = fx.add("Branch");
        let print = fx.add_with("Print", "message", Value::String("done".to_string()));

        fx.connect(get, "value_out", inc, "a_in");
        fx.connect(one, "value_out", inc, "b_in");
        fx.connect(inc, "result_out", set, "value_in");
        fx.connect(get, "value_out", compare, "a_in");
        fx.connect(limit, "value_out", compare, "b_in");
        fx.set_default(compare, "op_in", Value::String("Less".to_string()));

        fx.connect(start, "exec_out", set, "exec_in");
        fx.connect(set, "exec_out", branch, "exec_in");
        fx.connect(compare, "result_out", branch, "condition_in");
        fx.connect(branch, "true_out", set, "exec_in");
        fx.connect(branch, "false_out", print, "exec_in");

        let interpreter = Interpreter::new(&fx.registry);
        let mut run = interpreter.start(Arc::new(fx.graph.clone()), start).unwrap();
        let mut host = RecordingHost::default();
        let state = interpreter.run_to_end(&mut run, &mut host).clone();

        assert_eq!(state, RunState::Terminated(RunOutcome::Completed));
        assert_eq!(run.variable("count"), Some(&Value::Float(3.0)));
        assert_eq!(host.printed, vec!["done".to_string()]);
    }

    #[test]
    fn test_delay_suspends_and_resumes() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let delay = fx.add("Delay");
        let print = fx.add_with("Print", "message", Value::String("later".to_string()));
        fx.connect(start, "exec_out", delay, "exec_in");
        fx.connect(delay, "completed_out", print, "exec_in");

        let interpreter = Interpreter::new(&fx.registry);
        let mut run = interpreter.start(Arc::new(fx.graph.clone()), start).unwrap();
        let mut host = RecordingHost::default();

        let state = interpreter.run_to_end(&mut run, &mut host).clone();
        assert!(matches!(
            state,
            RunState::Suspended { node, reason: SuspendReason::Delay { seconds }, .. }
                if node == delay && seconds == 1.0
        ));
        assert!(host.printed.is_empty());

        let state = interpreter.resume(&mut run, &mut host).clone();
        assert_eq!(state, RunState::Terminated(RunOutcome::Completed));
        assert_eq!(host.printed, vec!["later".to_string()]);
    }

    #[test]
    fn test_event_payload_flows_to_consumers() {
        let mut fx = Fixture::new();
        let trigger = fx.add("OnTriggerEnter");
        let destroy = fx.add("DestroyObject");
        fx.connect(trigger, "exec_out", destroy, "exec_in");
        fx.connect(trigger, "other_out", destroy, "object_in");

        let interpreter = Interpreter::new(&fx.registry);
        let mut payload = IndexMap::new();
        payload.insert(SocketId::from("other_out"), Value::Object("Coin".to_string()));
        let mut run = interpreter
            .start_with_payload(Arc::new(fx.graph.clone()), trigger, payload)
            .unwrap();
        let mut host = RecordingHost::default();
        interpreter.run_to_end(&mut run, &mut host);

        assert_eq!(host.emitted.len(), 1);
        assert_eq!(host.emitted[0].kind, "unity/destroy");
        assert_eq!(host.emitted[0].payload["object"], "Coin");
    }

    #[test]
    fn test_codegen_only_node_is_unresolved() {
        let mut fx = Fixture::new();
        let start = fx.add("Start");
        let key = fx.add("GetKeyDown");
        let branch = fx.add("Branch");
        fx.connect(start, "exec_out", branch, "exec_in");
        fx.connect(key, "isdown_out", branch, "condition_in");

        let (state, _) = fx.run(start, InterpreterConfig::default());
        assert!(matches!(
            state,
            RunState::Terminated(RunOutcome::Failed {
                node_id,
                error: ExecutionError::UnresolvedSocket { .. },
            }) if node_id == branch
        ));
    }

    #[test]
    fn test_start_requires_event_node() {
        let mut fx = Fixture::new();
        let print = fx.add("Print");
        let interpreter = Interpreter::new(&fx.registry);
        let err = interpreter.start(Arc::new(fx.graph.clone()), print).unwrap_err();
        assert_eq!(err, ExecutionError::NotAnEventNode { node_id: print });
    }

    #[test]
    fn test_start_from_chosen_exec_output() {
        use crate::registry::{NodeCategory, NodeDefinition};
        use crate::socket::Socket;

        let mut fx = Fixture::new();
        fx.registry.register(
            NodeDefinition::new("OnCollision", "On Collision", NodeKind::Event, NodeCategory::Events)
                .output(Socket::output("enter_out", "Enter", SocketType::Exec))
                .output(Socket::output("exit_out", "Exit", SocketType::Exec)),
        );
        let collision = fx.add("OnCollision");
        let enter = fx.add_with("Print", "message", Value::String("enter".to_string()));
        let exit = fx.add_with("Print", "message", Value::String("exit".to_string()));
        fx.connect(collision, "enter_out", enter, "exec_in");
        fx.connect(collision, "exit_out", exit, "exec_in");

        let (_, host) = fx.run(collision, InterpreterConfig::default());
        assert_eq!(host.printed, vec!["enter".to_string()]);

        let interpreter = Interpreter::new(&fx.registry);
        let graph = Arc::new(fx.graph.clone());
        let mut run = interpreter
            .start_from_socket(graph.clone(), collision, SocketId::from("exit_out"), IndexMap::new())
            .unwrap();
        let mut host = RecordingHost::default();
        interpreter.run_to_end(&mut run, &mut host);
        assert_eq!(host.printed, vec!["exit".to_string()]);

        let err = interpreter
            .start_from_socket(graph, collision, SocketId::from("missing_out"), IndexMap::new())
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NotAnExecOutput { node_id, .. } if node_id == collision));
    }
}
