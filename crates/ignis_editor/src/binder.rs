// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime binder: relays messages between graphs and the host runtime.
//!
//! Inbound `blueprint/trigger` and `blueprint/event` messages start runs on
//! the current store snapshot. Side effects of those runs leave through a
//! [`Transport`] without waiting for acknowledgment. Bad inbound messages are
//! logged and dropped; they never reach the sender.

use crate::store::GraphStore;
use ignis_blueprint::interpreter::SuspendReason;
use ignis_blueprint::message::{LIFECYCLE_EVENT, TRIGGER};
use ignis_blueprint::{
    Graph, GraphId, Interpreter, InterpreterConfig, NodeId, NodeRegistry, Run, RunOutcome, RunState, RuntimeHost,
    RuntimeMessage, SocketId, Value,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Binder errors; logged, never returned to the runtime
#[derive(Debug, Error)]
pub enum BindingError {
    /// Message names a graph or node the store does not hold
    #[error("Unknown graph or node: graph {graph_id:?}, node {node_id:?}")]
    UnknownGraphOrNode {
        /// Requested graph
        graph_id: Option<GraphId>,
        /// Requested node
        node_id: Option<NodeId>,
    },

    /// Payload does not have the expected shape
    #[error("Malformed {kind} message: {reason}")]
    MalformedMessage {
        /// Message type
        kind: String,
        /// What was wrong
        reason: String,
    },

    /// Message type is not handled by the binder
    #[error("Unsupported message type: {kind}")]
    UnsupportedMessage {
        /// Message type
        kind: String,
    },
}

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The receiving side is gone
    #[error("Transport closed")]
    Closed,
}

/// Outbound channel to the host runtime
pub trait Transport: Send + Sync {
    /// Hand a message to the runtime without waiting for acknowledgment
    fn send(&self, message: RuntimeMessage) -> Result<(), TransportError>;
}

/// Transport backed by an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<RuntimeMessage>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the runtime side drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RuntimeMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: RuntimeMessage) -> Result<(), TransportError> {
        self.sender.send(message).map_err(|_| TransportError::Closed)
    }
}

/// Run host that forwards emitted messages to a transport
pub struct BinderHost {
    transport: Arc<dyn Transport>,
}

impl BinderHost {
    /// Create a host over a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl RuntimeHost for BinderHost {
    fn print(&mut self, _message: &str) {
        // Already logged by the run context
    }

    fn emit(&mut self, message: RuntimeMessage) {
        let kind = message.kind.clone();
        if let Err(error) = self.transport.send(message) {
            tracing::debug!(%kind, %error, "Outbound message dropped");
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerPayload {
    graph_id: GraphId,
    node_id: NodeId,
    #[serde(default)]
    socket_id: Option<SocketId>,
    #[serde(default)]
    payload: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload {
    #[serde(default)]
    graph_id: Option<GraphId>,
    event: String,
    #[serde(default)]
    payload: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Map a host callback name to the event node type handling it
fn event_node_type(event: &str) -> &str {
    match event {
        "Update" => "OnUpdate",
        other => other,
    }
}

/// Translate payload fields into event node output values
///
/// A field `other` seeds socket `other_out`; full socket ids work too.
fn seed_outputs(graph: &Graph, node_id: NodeId, fields: &serde_json::Map<String, serde_json::Value>) -> IndexMap<SocketId, Value> {
    let Some(node) = graph.node(node_id) else {
        return IndexMap::new();
    };

    let mut seeded = IndexMap::new();
    for (key, json) in fields {
        let socket = node
            .output(&SocketId::new(format!("{key}_out")))
            .or_else(|| node.output(&SocketId::new(key.as_str())));
        match socket {
            Some(socket) if !socket.socket_type.is_exec() => {
                seeded.insert(socket.id.clone(), Value::from_json(json, Some(socket.socket_type)));
            }
            _ => tracing::debug!(%node_id, field = %key, "Payload field has no matching output"),
        }
    }
    seeded
}

/// Relays runtime messages into interpreter runs and run side effects out
pub struct RuntimeBinder {
    store: Arc<GraphStore>,
    transport: Arc<dyn Transport>,
    config: InterpreterConfig,
}

impl RuntimeBinder {
    /// Create a binder over a store and an outbound transport
    pub fn new(store: Arc<GraphStore>, transport: Arc<dyn Transport>, config: InterpreterConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Handle an inbound message; failures are logged and dropped
    pub fn on_message(&self, message: RuntimeMessage) {
        if let Err(error) = self.handle(&message) {
            tracing::warn!(kind = %message.kind, %error, "Runtime message dropped");
        }
    }

    /// Handle an inbound message, returning the state each started run stopped in
    pub fn handle(&self, message: &RuntimeMessage) -> Result<Vec<RunState>, BindingError> {
        match message.kind.as_str() {
            TRIGGER => {
                let trigger: TriggerPayload = Self::parse(message)?;
                self.trigger(trigger)
            }
            LIFECYCLE_EVENT => {
                let event: EventPayload = Self::parse(message)?;
                self.forward_event(event)
            }
            other => Err(BindingError::UnsupportedMessage {
                kind: other.to_string(),
            }),
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(message: &RuntimeMessage) -> Result<T, BindingError> {
        serde_json::from_value(message.payload.clone()).map_err(|e| BindingError::MalformedMessage {
            kind: message.kind.clone(),
            reason: e.to_string(),
        })
    }

    fn trigger(&self, trigger: TriggerPayload) -> Result<Vec<RunState>, BindingError> {
        let unknown = || BindingError::UnknownGraphOrNode {
            graph_id: Some(trigger.graph_id),
            node_id: Some(trigger.node_id),
        };

        let graph = self.store.graph(trigger.graph_id).ok_or_else(unknown)?;
        let node = graph.node(trigger.node_id).ok_or_else(unknown)?;
        if let Some(socket_id) = &trigger.socket_id {
            if !node.output(socket_id).is_some_and(|s| s.socket_type.is_exec()) {
                return Err(BindingError::MalformedMessage {
                    kind: TRIGGER.to_string(),
                    reason: format!("node {} has no exec output {socket_id}", trigger.node_id),
                });
            }
        }

        let seeded = trigger
            .payload
            .as_ref()
            .map(|fields| seed_outputs(&graph, trigger.node_id, fields))
            .unwrap_or_default();
        Ok(vec![self.start(graph, trigger.node_id, trigger.socket_id, seeded)])
    }

    fn forward_event(&self, event: EventPayload) -> Result<Vec<RunState>, BindingError> {
        let graphs: Vec<Arc<Graph>> = match event.graph_id {
            Some(graph_id) => vec![self.store.graph(graph_id).ok_or(BindingError::UnknownGraphOrNode {
                graph_id: Some(graph_id),
                node_id: None,
            })?],
            None => self
                .store
                .graph_ids()
                .into_iter()
                .filter_map(|id| self.store.graph(id))
                .collect(),
        };

        let node_type = event_node_type(&event.event);
        let empty = serde_json::Map::new();
        let fields = event.payload.as_ref().unwrap_or(&empty);

        let mut states = Vec::new();
        for graph in graphs {
            let targets: Vec<NodeId> = graph
                .event_nodes()
                .filter(|n| n.node_type == node_type)
                .map(|n| n.id)
                .collect();
            for node_id in targets {
                let seeded = seed_outputs(&graph, node_id, fields);
                states.push(self.start(graph.clone(), node_id, None, seeded));
            }
        }

        if states.is_empty() {
            tracing::debug!(event = %event.event, "No event node handles this callback");
        }
        Ok(states)
    }

    fn start(
        &self,
        graph: Arc<Graph>,
        node_id: NodeId,
        socket_id: Option<SocketId>,
        seeded: IndexMap<SocketId, Value>,
    ) -> RunState {
        let registry = self.store.registry().clone();
        let interpreter = Interpreter::with_config(&registry, self.config);
        let mut host = BinderHost::new(self.transport.clone());

        let started = match socket_id {
            Some(socket_id) => interpreter.start_from_socket(graph, node_id, socket_id, seeded),
            None => interpreter.start_with_payload(graph, node_id, seeded),
        };
        let mut run = match started {
            Ok(run) => run,
            Err(error) => {
                tracing::warn!(%node_id, %error, "Run could not start");
                return RunState::Terminated(RunOutcome::Failed { node_id, error });
            }
        };

        let state = interpreter.run_to_end(&mut run, &mut host).clone();
        report(&run);
        if let RunState::Suspended {
            reason: SuspendReason::Delay { seconds },
            ..
        } = state
        {
            self.resume_later(registry, run, seconds);
        }
        state
    }

    fn resume_later(&self, registry: Arc<NodeRegistry>, run: Run, seconds: f64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(run = %run.id(), "No async runtime, suspended run dropped");
            return;
        };

        let config = self.config;
        let transport = self.transport.clone();
        handle.spawn(async move {
            let mut run = run;
            let mut seconds = seconds;
            loop {
                tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;

                let interpreter = Interpreter::with_config(&registry, config);
                let mut host = BinderHost::new(transport.clone());
                let state = interpreter.resume(&mut run, &mut host);
                match state {
                    RunState::Suspended {
                        reason: SuspendReason::Delay { seconds: next },
                        ..
                    } => seconds = *next,
                    _ => break,
                }
            }
            report(&run);
        });
    }

    /// Drain an inbound channel until every sender is dropped
    pub async fn serve(&self, mut inbound: mpsc::UnboundedReceiver<RuntimeMessage>) {
        while let Some(message) = inbound.recv().await {
            self.on_message(message);
        }
        tracing::debug!("Inbound runtime channel closed");
    }
}

fn report(run: &Run) {
    if let RunState::Terminated(RunOutcome::Failed { node_id, error }) = run.state() {
        tracing::warn!(run = %run.id(), %node_id, %error, "Run failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_blueprint::create_builtin_registry;
    use serde_json::json;

    fn fixture() -> (Arc<GraphStore>, GraphId, NodeId) {
        let store = Arc::new(GraphStore::new(Arc::new(create_builtin_registry())));
        let graph_id = store.create_graph("test");
        let trigger = store.add_node("OnTriggerEnter", [0.0, 0.0], IndexMap::new()).unwrap();
        let destroy = store.add_node("DestroyObject", [200.0, 0.0], IndexMap::new()).unwrap();
        store
            .add_connection(trigger.id, "exec_out", destroy.id, "exec_in")
            .unwrap();
        store
            .add_connection(trigger.id, "other_out", destroy.id, "object_in")
            .unwrap();
        (store, graph_id, trigger.id)
    }

    #[test]
    fn test_trigger_runs_and_emits() {
        let (store, graph_id, trigger) = fixture();
        let (transport, mut outbound) = ChannelTransport::new();
        let binder = RuntimeBinder::new(store, Arc::new(transport), InterpreterConfig::default());

        let message = RuntimeMessage::new(
            TRIGGER,
            json!({ "graphId": graph_id, "nodeId": trigger, "payload": { "other": "Coin" } }),
        );
        let states = binder.handle(&message).unwrap();
        assert_eq!(states, vec![RunState::Terminated(RunOutcome::Completed)]);

        let sent = outbound.try_recv().unwrap();
        assert_eq!(sent.kind, "unity/destroy");
        assert_eq!(sent.payload_str("object"), Some("Coin"));
    }

    #[test]
    fn test_event_forwarded_to_matching_nodes() {
        let (store, _, _) = fixture();
        let (transport, mut outbound) = ChannelTransport::new();
        let binder = RuntimeBinder::new(store, Arc::new(transport), InterpreterConfig::default());

        let message = RuntimeMessage::new(
            LIFECYCLE_EVENT,
            json!({ "event": "OnTriggerEnter", "payload": { "other": "Enemy" } }),
        );
        assert_eq!(binder.handle(&message).unwrap().len(), 1);
        assert_eq!(outbound.try_recv().unwrap().payload_str("object"), Some("Enemy"));

        let message = RuntimeMessage::new(LIFECYCLE_EVENT, json!({ "event": "Update" }));
        assert!(binder.handle(&message).unwrap().is_empty());
    }

    #[test]
    fn test_bad_messages_are_dropped() {
        let (store, graph_id, _) = fixture();
        let (transport, mut outbound) = ChannelTransport::new();
        let binder = RuntimeBinder::new(store, Arc::new(transport), InterpreterConfig::default());

        let unknown = RuntimeMessage::new(TRIGGER, json!({ "graphId": graph_id, "nodeId": NodeId::new() }));
        assert!(matches!(
            binder.handle(&unknown),
            Err(BindingError::UnknownGraphOrNode { .. })
        ));

        let malformed = RuntimeMessage::new(TRIGGER, json!({ "nodeId": 3 }));
        assert!(matches!(
            binder.handle(&malformed),
            Err(BindingError::MalformedMessage { .. })
        ));

        // on_message swallows both
        binder.on_message(unknown);
        binder.on_message(malformed);
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn test_trigger_starts_from_named_socket() {
        use ignis_blueprint::{NodeCategory, NodeDefinition, NodeKind, Socket, SocketType};

        let mut registry = create_builtin_registry();
        registry.register(
            NodeDefinition::new("OnCollision", "On Collision", NodeKind::Event, NodeCategory::Events)
                .output(Socket::output("enter_out", "Enter", SocketType::Exec))
                .output(Socket::output("exit_out", "Exit", SocketType::Exec))
                .output(Socket::output("other_out", "Other", SocketType::Object)),
        );
        let store = Arc::new(GraphStore::new(Arc::new(registry)));
        let graph_id = store.create_graph("collision");
        let collision = store.add_node("OnCollision", [0.0, 0.0], IndexMap::new()).unwrap();
        let show = store.add_node("ShowUI", [200.0, 0.0], IndexMap::new()).unwrap();
        let hide = store.add_node("HideUI", [200.0, 100.0], IndexMap::new()).unwrap();
        store.add_connection(collision.id, "enter_out", show.id, "exec_in").unwrap();
        store.add_connection(collision.id, "exit_out", hide.id, "exec_in").unwrap();
        store.add_connection(collision.id, "other_out", show.id, "target_in").unwrap();
        store.add_connection(collision.id, "other_out", hide.id, "target_in").unwrap();

        let (transport, mut outbound) = ChannelTransport::new();
        let binder = RuntimeBinder::new(store, Arc::new(transport), InterpreterConfig::default());

        let message = RuntimeMessage::new(
            TRIGGER,
            json!({ "graphId": graph_id, "nodeId": collision.id, "socketId": "exit_out", "payload": { "other": "Door" } }),
        );
        assert_eq!(
            binder.handle(&message).unwrap(),
            vec![RunState::Terminated(RunOutcome::Completed)]
        );
        let sent = outbound.try_recv().unwrap();
        assert_eq!(sent.kind, "unity/hideUI");
        assert_eq!(sent.payload_str("target"), Some("Door"));
        assert!(outbound.try_recv().is_err());

        // A data output cannot start a run
        let message = RuntimeMessage::new(
            TRIGGER,
            json!({ "graphId": graph_id, "nodeId": collision.id, "socketId": "other_out" }),
        );
        assert!(matches!(
            binder.handle(&message),
            Err(BindingError::MalformedMessage { .. })
        ));
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn test_closed_transport_is_ignored() {
        let (store, graph_id, trigger) = fixture();
        let (transport, outbound) = ChannelTransport::new();
        drop(outbound);
        let binder = RuntimeBinder::new(store, Arc::new(transport), InterpreterConfig::default());

        let message = RuntimeMessage::new(
            TRIGGER,
            json!({ "graphId": graph_id, "nodeId": trigger, "payload": { "other": "Coin" } }),
        );
        assert_eq!(
            binder.handle(&message).unwrap(),
            vec![RunState::Terminated(RunOutcome::Completed)]
        );
    }
}
