// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the registry that maps type names to them.
//!
//! A [`NodeDefinition`] fixes a node's socket shape and display metadata and
//! optionally carries two capabilities:
//! - a [`NodeBehavior`] used by the interpreter for live simulation
//! - a [`NodeEmitter`] used by the code generator
//!
//! The registry is built once at startup and shared by reference afterwards.

use crate::codegen::{CodegenError, Emit, EmitArgs, EmitScope};
use crate::graph::ValidationError;
use crate::interpreter::{ExecutionError, Inputs, NodeOutcome, RuntimeContext};
use crate::node::{Node, NodeId, NodeKind};
use crate::socket::{Socket, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Palette category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Lifecycle entry points
    Events,
    /// Flow control
    Flow,
    /// Debugging helpers
    Debug,
    /// Arithmetic
    Math,
    /// Comparisons and boolean logic
    Logic,
    /// Literal values
    Constants,
    /// Graph variables
    Variables,
    /// Scene object manipulation
    Unity,
    /// UI elements
    Ui,
    /// Player input
    Input,
}

impl NodeCategory {
    /// Every category in palette order
    pub fn all() -> &'static [NodeCategory] {
        &[
            Self::Events,
            Self::Flow,
            Self::Debug,
            Self::Math,
            Self::Logic,
            Self::Constants,
            Self::Variables,
            Self::Unity,
            Self::Ui,
            Self::Input,
        ]
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Events => "Events",
            Self::Flow => "Flow",
            Self::Debug => "Debug",
            Self::Math => "Math",
            Self::Logic => "Logic",
            Self::Constants => "Constants",
            Self::Variables => "Variables",
            Self::Unity => "Unity",
            Self::Ui => "UI",
            Self::Input => "Input",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Interpreter capability of a node type
pub trait NodeBehavior: Send + Sync {
    /// Execute a node with its resolved inputs
    ///
    /// Data nodes return [`NodeOutcome::Values`] and must be deterministic.
    /// Exec and event nodes return the exec socket to continue on.
    fn execute(
        &self,
        node: &Node,
        inputs: &Inputs,
        ctx: &mut RuntimeContext<'_>,
    ) -> Result<NodeOutcome, ExecutionError>;
}

impl<F> NodeBehavior for F
where
    F: Fn(&Node, &Inputs, &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> + Send + Sync,
{
    fn execute(
        &self,
        node: &Node,
        inputs: &Inputs,
        ctx: &mut RuntimeContext<'_>,
    ) -> Result<NodeOutcome, ExecutionError> {
        self(node, inputs, ctx)
    }
}

/// Code generation capability of a node type
pub trait NodeEmitter: Send + Sync {
    /// Translate a node into source given its argument expressions
    fn emit(&self, node: &Node, args: &EmitArgs, scope: &mut EmitScope) -> Result<Emit, CodegenError>;
}

impl<F> NodeEmitter for F
where
    F: Fn(&Node, &EmitArgs, &mut EmitScope) -> Result<Emit, CodegenError> + Send + Sync,
{
    fn emit(&self, node: &Node, args: &EmitArgs, scope: &mut EmitScope) -> Result<Emit, CodegenError> {
        self(node, args, scope)
    }
}

/// Node type definition
#[derive(Clone)]
pub struct NodeDefinition {
    /// Registry key
    pub node_type: String,
    /// Display title
    pub title: String,
    /// Description shown in the palette
    pub description: String,
    /// Palette category
    pub category: NodeCategory,
    /// Execution role
    pub kind: NodeKind,
    /// Header color (RGB)
    pub color: [u8; 3],
    /// Template input sockets
    pub inputs: Vec<Socket>,
    /// Template output sockets
    pub outputs: Vec<Socket>,
    /// Node data every new instance starts with
    pub default_data: IndexMap<String, Value>,
    behavior: Option<Arc<dyn NodeBehavior>>,
    emitter: Option<Arc<dyn NodeEmitter>>,
}

impl NodeDefinition {
    /// Start a definition with no sockets
    pub fn new(
        node_type: impl Into<String>,
        title: impl Into<String>,
        kind: NodeKind,
        category: NodeCategory,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            title: title.into(),
            description: String::new(),
            category,
            kind,
            color: [150, 150, 150],
            inputs: Vec::new(),
            outputs: Vec::new(),
            default_data: IndexMap::new(),
            behavior: None,
            emitter: None,
        }
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the header color
    pub fn color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Append an input socket
    pub fn input(mut self, socket: Socket) -> Self {
        self.inputs.push(socket);
        self
    }

    /// Append an output socket
    pub fn output(mut self, socket: Socket) -> Self {
        self.outputs.push(socket);
        self
    }

    /// Add a default node data entry
    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_data.insert(key.into(), value);
        self
    }

    /// Attach the interpreter behavior
    pub fn behavior(mut self, behavior: impl NodeBehavior + 'static) -> Self {
        self.behavior = Some(Arc::new(behavior));
        self
    }

    /// Attach the code emitter
    pub fn emitter(mut self, emitter: impl NodeEmitter + 'static) -> Self {
        self.emitter = Some(Arc::new(emitter));
        self
    }

    /// Interpreter behavior, if the node can run live
    pub fn node_behavior(&self) -> Option<&dyn NodeBehavior> {
        self.behavior.as_deref()
    }

    /// Code emitter, if the node can be compiled
    pub fn node_emitter(&self) -> Option<&dyn NodeEmitter> {
        self.emitter.as_deref()
    }

    /// Create a graph-bound instance of this definition
    pub fn instantiate(&self, position: [f32; 2], initial_data: IndexMap<String, Value>) -> Node {
        let mut data = self.default_data.clone();
        data.extend(initial_data);
        Node {
            id: NodeId::new(),
            node_type: self.node_type.clone(),
            kind: self.kind,
            title: self.title.clone(),
            position,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            data,
        }
    }

    /// Check that a node still has the socket shape of this definition
    ///
    /// Titles, positions, data and input literals are editable; kind and
    /// sockets (ids, directions, types, connection rules) are not.
    pub fn check_shape(&self, node: &Node) -> Result<(), ValidationError> {
        let mismatch = |detail: String| ValidationError::ShapeMismatch {
            node_id: node.id,
            node_type: node.node_type.clone(),
            detail,
        };

        if node.kind != self.kind {
            return Err(mismatch(format!("kind {:?}, expected {:?}", node.kind, self.kind)));
        }
        for (label, found, expected) in [
            ("inputs", &node.inputs, &self.inputs),
            ("outputs", &node.outputs, &self.outputs),
        ] {
            if found.len() != expected.len() {
                return Err(mismatch(format!(
                    "{} {label}, expected {}",
                    found.len(),
                    expected.len()
                )));
            }
            for (socket, template) in found.iter().zip(expected) {
                if socket.id != template.id
                    || socket.direction != template.direction
                    || socket.socket_type != template.socket_type
                    || socket.multi_connect != template.multi_connect
                    || socket.required != template.required
                {
                    return Err(mismatch(format!("socket {} differs from {}", socket.id, template.id)));
                }
            }
        }
        Ok(())
    }

    fn matches(&self, query: &str) -> bool {
        self.node_type.to_lowercase().contains(query)
            || self.title.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
            || self.category.name().to_lowercase().contains(query)
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("node_type", &self.node_type)
            .field("title", &self.title)
            .field("category", &self.category)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("executable", &self.behavior.is_some())
            .field("compilable", &self.emitter.is_some())
            .finish()
    }
}

/// Registry of available node types
#[derive(Debug)]
pub struct NodeRegistry {
    /// Registered definitions by type name
    definitions: IndexMap<String, NodeDefinition>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            definitions: IndexMap::new(),
        }
    }

    /// Register a node definition
    pub fn register(&mut self, definition: NodeDefinition) {
        if self.definitions.contains_key(&definition.node_type) {
            tracing::warn!(node_type = %definition.node_type, "Replacing registered node definition");
        }
        self.definitions.insert(definition.node_type.clone(), definition);
    }

    /// Get a definition by type name
    pub fn get(&self, node_type: &str) -> Option<&NodeDefinition> {
        self.definitions.get(node_type)
    }

    /// Get all definitions in registration order
    pub fn all(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values()
    }

    /// Get definitions in a category
    pub fn by_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values().filter(move |d| d.category == category)
    }

    /// Categories that have at least one definition, in palette order
    pub fn categories(&self) -> Vec<NodeCategory> {
        NodeCategory::all()
            .iter()
            .copied()
            .filter(|c| self.by_category(*c).next().is_some())
            .collect()
    }

    /// Case-insensitive substring search over type, title, description and category
    pub fn search(&self, query: &str) -> Vec<&NodeDefinition> {
        let query = query.trim().to_lowercase();
        self.definitions
            .values()
            .filter(|d| query.is_empty() || d.matches(&query))
            .collect()
    }

    /// Create a node instance from a type name
    pub fn instantiate(
        &self,
        node_type: &str,
        position: [f32; 2],
        initial_data: IndexMap<String, Value>,
    ) -> Result<Node, ValidationError> {
        self.get(node_type)
            .map(|d| d.instantiate(position, initial_data))
            .ok_or_else(|| ValidationError::UnknownNodeType {
                node_type: node_type.to_string(),
            })
    }

    /// Check a node against its registered definition
    pub fn check_node(&self, node: &Node) -> Result<(), ValidationError> {
        self.get(&node.node_type)
            .ok_or_else(|| ValidationError::UnknownNodeType {
                node_type: node.node_type.clone(),
            })?
            .check_shape(node)
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::create_builtin_registry;

    #[test]
    fn test_search_is_case_insensitive() {
        let registry = create_builtin_registry();
        let hits: Vec<_> = registry.search("bRaNcH").iter().map(|d| d.node_type.clone()).collect();
        assert_eq!(hits, vec!["Branch".to_string()]);

        // titles match as well as type names
        assert!(registry.search("on start").iter().any(|d| d.node_type == "Start"));
        assert_eq!(registry.search("").len(), registry.len());
        assert!(registry.search("no such node").is_empty());
    }

    #[test]
    fn test_by_category() {
        let registry = create_builtin_registry();
        let events: Vec<_> = registry.by_category(NodeCategory::Events).map(|d| d.node_type.as_str()).collect();
        assert!(events.contains(&"Start"));
        assert!(events.contains(&"OnUpdate"));
        assert!(registry.by_category(NodeCategory::Events).all(|d| d.kind == NodeKind::Event));
    }

    #[test]
    fn test_unknown_type() {
        let registry = create_builtin_registry();
        let err = registry.instantiate("Teleport", [0.0, 0.0], IndexMap::new()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownNodeType {
                node_type: "Teleport".to_string()
            }
        );
    }

    #[test]
    fn test_instantiate_merges_data() {
        let registry = create_builtin_registry();
        let mut data = IndexMap::new();
        data.insert("value".to_string(), Value::Float(2.5));
        let node = registry.instantiate("FloatConstant", [10.0, 20.0], data).unwrap();
        assert_eq!(node.data_value("value"), Some(&Value::Float(2.5)));
        assert_eq!(node.position, [10.0, 20.0]);
        assert_eq!(node.kind, NodeKind::Data);
    }

    #[test]
    fn test_check_node_rejects_altered_sockets() {
        let registry = create_builtin_registry();
        let node = registry.instantiate("Add", [0.0, 0.0], IndexMap::new()).unwrap();
        registry.check_node(&node).unwrap();

        // Editable fields are not part of the shape
        let mut edited = node.clone();
        edited.title = "Sum".to_string();
        edited.inputs[0].default_value = Some(Value::Float(3.0));
        registry.check_node(&edited).unwrap();

        let mut multi = node.clone();
        for socket in &mut multi.inputs {
            socket.multi_connect = true;
        }
        assert!(matches!(
            registry.check_node(&multi),
            Err(ValidationError::ShapeMismatch { node_id, .. }) if node_id == node.id
        ));

        let mut retyped = node.clone();
        retyped.outputs[0].socket_type = crate::socket::SocketType::Exec;
        assert!(matches!(registry.check_node(&retyped), Err(ValidationError::ShapeMismatch { .. })));

        let mut extra = node.clone();
        extra.inputs.push(crate::socket::Socket::input("c_in", "C", crate::socket::SocketType::Float));
        assert!(matches!(registry.check_node(&extra), Err(ValidationError::ShapeMismatch { .. })));

        let mut rekinded = node;
        rekinded.kind = NodeKind::Event;
        assert!(matches!(registry.check_node(&rekinded), Err(ValidationError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("ui".parse::<NodeCategory>().unwrap(), NodeCategory::Ui);
        assert_eq!("Math".parse::<NodeCategory>().unwrap(), NodeCategory::Math);
        assert!("Audio".parse::<NodeCategory>().is_err());
    }
}
