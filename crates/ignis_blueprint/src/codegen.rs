// SPDX-License-Identifier: MIT OR Apache-2.0
//! C# code generation.
//!
//! Translates a graph into one Unity `MonoBehaviour` class. Output depends
//! only on the graph and the registry, so identical graphs always produce
//! byte-identical source.

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind};
use crate::registry::{NodeEmitter, NodeRegistry};
use crate::socket::{SocketId, SocketType, Value};
use indexmap::IndexMap;
use std::collections::HashMap;

const INDENT: &str = "    ";

/// What a node contributes to the generated source
#[derive(Debug, Clone, PartialEq)]
pub enum Emit {
    /// An event node opening (or joining) a lifecycle method
    Lifecycle {
        /// Method signature, e.g. `void Update()`
        signature: String,
        /// Position of the method in the class
        order: u8,
        /// Expressions for the event's data outputs
        outputs: IndexMap<SocketId, String>,
        /// Exec output the method body starts from
        next: Option<SocketId>,
    },
    /// Inlinable expressions for each output of a data node
    Expression(IndexMap<SocketId, String>),
    /// Straight-line statements of an exec node
    Statement {
        /// Statement lines without indentation
        lines: Vec<String>,
        /// Expressions (usually locals) for the node's data outputs
        outputs: IndexMap<SocketId, String>,
        /// Exec output to continue on
        next: Option<SocketId>,
    },
    /// An `if`/`else` over two exec outputs
    Branch {
        /// Condition expression
        condition: String,
        /// Exec output for the `if` block
        then: SocketId,
        /// Exec output for the `else` block
        otherwise: SocketId,
    },
    /// Several exec outputs emitted one after another
    Sequence(Vec<SocketId>),
}

impl Emit {
    /// A single statement that continues on `next`
    pub fn statement(line: impl Into<String>, next: impl Into<SocketId>) -> Self {
        Self::Statement {
            lines: vec![line.into()],
            outputs: IndexMap::new(),
            next: Some(next.into()),
        }
    }

    /// A data node with one output expression
    pub fn expression(socket_id: impl Into<SocketId>, expression: impl Into<String>) -> Self {
        let mut outputs = IndexMap::new();
        outputs.insert(socket_id.into(), expression.into());
        Self::Expression(outputs)
    }
}

#[derive(Debug, Clone)]
struct Arg {
    expression: String,
    explicit: bool,
    /// Type of the connected output or of the literal
    source_type: SocketType,
}

/// Source expressions for the data inputs of one node
#[derive(Debug, Clone, Default)]
pub struct EmitArgs {
    args: IndexMap<SocketId, Arg>,
}

impl EmitArgs {
    /// Expression for an input; unknown sockets read as `null`
    pub fn get(&self, socket_id: &str) -> &str {
        self.args
            .iter()
            .find(|(id, _)| id.as_str() == socket_id)
            .map_or("null", |(_, arg)| arg.expression.as_str())
    }

    /// Expression for an input that is connected or has a literal default
    pub fn explicit(&self, socket_id: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(id, arg)| id.as_str() == socket_id && arg.explicit)
            .map(|(_, arg)| arg.expression.as_str())
    }

    /// Type actually feeding an input, which differs from the socket type
    /// when an `object` input is fed a typed value
    pub fn source_type(&self, socket_id: &str) -> Option<SocketType> {
        self.args
            .iter()
            .find(|(id, _)| id.as_str() == socket_id)
            .map(|(_, arg)| arg.source_type)
    }
}

/// Mutable naming state shared by every emitter in one generation
#[derive(Debug, Default)]
pub struct EmitScope {
    counters: IndexMap<String, usize>,
}

impl EmitScope {
    /// Allocate a local variable name, `prefix_0`, `prefix_1`, ...
    pub fn fresh_local(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{prefix}_{counter}");
        *counter += 1;
        name
    }
}

/// C# type name for a socket type
pub fn csharp_type(socket_type: SocketType) -> &'static str {
    match socket_type {
        SocketType::Exec => "void",
        SocketType::Bool => "bool",
        SocketType::Int => "int",
        SocketType::Float => "float",
        SocketType::String => "string",
        SocketType::Vector => "Vector3",
        SocketType::Object => "GameObject",
    }
}

/// C# string literal with escapes
pub fn csharp_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// C# float literal, `5f`, `0.5f`
pub fn csharp_float(value: f64) -> String {
    if value.is_nan() {
        "float.NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "float.PositiveInfinity" } else { "float.NegativeInfinity" }.to_string()
    } else {
        format!("{}f", value as f32)
    }
}

/// C# literal for a value, using the socket type when the value is `Null`
pub fn csharp_literal(value: &Value, socket_type: SocketType) -> String {
    match value {
        Value::Null => match socket_type {
            SocketType::Bool => "false".to_string(),
            SocketType::Int => "0".to_string(),
            SocketType::Float => "0f".to_string(),
            SocketType::String => "\"\"".to_string(),
            SocketType::Vector => "Vector3.zero".to_string(),
            SocketType::Object | SocketType::Exec => "null".to_string(),
        },
        Value::Bool(v) => v.to_string(),
        Value::Int(v) if socket_type == SocketType::Float => csharp_float(*v as f64),
        Value::Int(v) => v.to_string(),
        Value::Float(v) if socket_type == SocketType::Int => (v.trunc() as i64).to_string(),
        Value::Float(v) => csharp_float(*v),
        Value::String(s) => csharp_string(s),
        Value::Vector([x, y, z]) => format!(
            "new Vector3({}, {}, {})",
            csharp_float(*x),
            csharp_float(*y),
            csharp_float(*z)
        ),
        Value::Object(name) => format!("GameObject.Find({})", csharp_string(name)),
    }
}

/// Whether `name` is a valid C# identifier
pub fn is_csharp_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Entry {
    node_id: NodeId,
    outputs: IndexMap<SocketId, String>,
    next: Option<SocketId>,
}

struct Method {
    signature: String,
    order: u8,
    entries: Vec<Entry>,
}

struct Generator<'a> {
    graph: &'a Graph,
    registry: &'a NodeRegistry,
    scope: EmitScope,
    /// Expressions for data outputs of exec and event nodes in scope, innermost last
    locals: Vec<((NodeId, SocketId), String)>,
    expressions: HashMap<NodeId, IndexMap<SocketId, String>>,
    visiting: Vec<NodeId>,
    exec_path: Vec<NodeId>,
}

impl<'a> Generator<'a> {
    fn emitter(&self, node: &Node) -> Result<&'a dyn NodeEmitter, CodegenError> {
        let registry: &'a NodeRegistry = self.registry;
        let definition = registry
            .get(&node.node_type)
            .ok_or_else(|| CodegenError::UnknownNodeType {
                node_type: node.node_type.clone(),
            })?;
        definition
            .node_emitter()
            .ok_or_else(|| CodegenError::UnsupportedNodeForCodegen {
                node_id: node.id,
                node_type: node.node_type.clone(),
            })
    }

    fn unsupported(node: &Node) -> CodegenError {
        CodegenError::UnsupportedNodeForCodegen {
            node_id: node.id,
            node_type: node.node_type.clone(),
        }
    }

    fn args(&mut self, node: &Node) -> Result<EmitArgs, CodegenError> {
        let graph = self.graph;
        let mut args = EmitArgs::default();
        for socket in node.data_inputs() {
            let arg = match graph.connection_into(node.id, &socket.id) {
                Some(connection) => {
                    let source = graph.node(connection.from_node).ok_or_else(|| {
                        CodegenError::UnsupportedNodeForCodegen {
                            node_id: connection.from_node,
                            node_type: String::new(),
                        }
                    })?;
                    let source_type = source
                        .output(&connection.from_socket)
                        .map_or(socket.socket_type, |s| s.socket_type);
                    let expression = match source.kind {
                        NodeKind::Data => self.expression(source, &connection.from_socket)?,
                        NodeKind::Exec | NodeKind::Event => self
                            .locals
                            .iter()
                            .rev()
                            .find(|((id, out), _)| *id == source.id && *out == connection.from_socket)
                            .map(|(_, expression)| expression.clone())
                            .ok_or_else(|| CodegenError::OutputOutOfScope {
                                node_id: source.id,
                                socket_id: connection.from_socket.clone(),
                            })?,
                    };
                    Arg {
                        expression,
                        explicit: true,
                        source_type,
                    }
                }
                None => match &socket.default_value {
                    Some(value) if !value.is_null() => Arg {
                        expression: csharp_literal(value, socket.socket_type),
                        explicit: true,
                        source_type: value.socket_type().unwrap_or(socket.socket_type),
                    },
                    _ => Arg {
                        expression: csharp_literal(&Value::Null, socket.socket_type),
                        explicit: false,
                        source_type: socket.socket_type,
                    },
                },
            };
            args.args.insert(socket.id.clone(), arg);
        }
        Ok(args)
    }

    fn expression(&mut self, node: &Node, socket_id: &SocketId) -> Result<String, CodegenError> {
        if !self.expressions.contains_key(&node.id) {
            if self.visiting.contains(&node.id) {
                return Err(CodegenError::CyclicDependency { node_id: node.id });
            }
            self.visiting.push(node.id);

            let emitter = self.emitter(node)?;
            let args = self.args(node)?;
            let outputs = match emitter.emit(node, &args, &mut self.scope)? {
                Emit::Expression(outputs) => outputs,
                _ => return Err(Self::unsupported(node)),
            };

            self.visiting.pop();
            self.expressions.insert(node.id, outputs);
        }

        self.expressions
            .get(&node.id)
            .and_then(|outputs| outputs.get(socket_id))
            .cloned()
            .ok_or_else(|| Self::unsupported(node))
    }

    fn record_outputs(&mut self, node_id: NodeId, outputs: IndexMap<SocketId, String>) {
        for (socket, expression) in outputs {
            self.locals.push(((node_id, socket), expression));
        }
    }

    /// Drop locals declared since `mark`, as a C# block closes
    fn close_block(&mut self, mark: usize) {
        if self.locals.len() > mark {
            self.locals.truncate(mark);
            // Memoized expressions may name the dropped locals
            self.expressions.clear();
        }
    }

    /// Follow an exec output inside its own block
    fn block(
        &mut self,
        node_id: NodeId,
        socket_id: &SocketId,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<(), CodegenError> {
        let mark = self.locals.len();
        self.follow(node_id, socket_id, depth, out)?;
        self.close_block(mark);
        Ok(())
    }

    fn follow(
        &mut self,
        node_id: NodeId,
        socket_id: &SocketId,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<(), CodegenError> {
        let graph = self.graph;
        for connection in graph.connections_from(node_id, socket_id) {
            self.exec_node(connection.to_node, depth, out)?;
        }
        Ok(())
    }

    fn exec_node(&mut self, node_id: NodeId, depth: usize, out: &mut Vec<String>) -> Result<(), CodegenError> {
        if self.exec_path.contains(&node_id) {
            return Err(CodegenError::ExecCycle { node_id });
        }
        let graph = self.graph;
        let node = graph.node(node_id).ok_or_else(|| CodegenError::UnsupportedNodeForCodegen {
            node_id,
            node_type: String::new(),
        })?;
        tracing::debug!(node = %node_id, node_type = %node.node_type, depth, "Emitting node");

        self.exec_path.push(node_id);
        let emitter = self.emitter(node)?;
        let args = self.args(node)?;
        let indent = INDENT.repeat(depth);

        match emitter.emit(node, &args, &mut self.scope)? {
            Emit::Statement { lines, outputs, next } => {
                out.extend(lines.into_iter().map(|line| format!("{indent}{line}")));
                self.record_outputs(node_id, outputs);
                if let Some(next) = next {
                    self.follow(node_id, &next, depth, out)?;
                }
            }
            Emit::Branch {
                condition,
                then,
                otherwise,
            } => {
                out.push(format!("{indent}if ({condition})"));
                out.push(format!("{indent}{{"));
                self.block(node_id, &then, depth + 1, out)?;
                out.push(format!("{indent}}}"));
                if graph.connections_from(node_id, &otherwise).next().is_some() {
                    out.push(format!("{indent}else"));
                    out.push(format!("{indent}{{"));
                    self.block(node_id, &otherwise, depth + 1, out)?;
                    out.push(format!("{indent}}}"));
                }
            }
            Emit::Sequence(sockets) => {
                // One C# block: earlier outputs stay declared for later ones
                for socket in &sockets {
                    self.follow(node_id, socket, depth, out)?;
                }
            }
            Emit::Lifecycle { .. } | Emit::Expression(_) => return Err(Self::unsupported(node)),
        }

        self.exec_path.pop();
        Ok(())
    }

    fn methods(&mut self) -> Result<Vec<Method>, CodegenError> {
        let graph = self.graph;
        let mut methods: Vec<Method> = Vec::new();

        for node in graph.event_nodes() {
            let emitter = self.emitter(node)?;
            let args = self.args(node)?;
            let Emit::Lifecycle {
                signature,
                order,
                outputs,
                next,
            } = emitter.emit(node, &args, &mut self.scope)?
            else {
                return Err(Self::unsupported(node));
            };

            let entry = Entry {
                node_id: node.id,
                outputs,
                next,
            };
            match methods.iter_mut().find(|m| m.signature == signature) {
                Some(method) => method.entries.push(entry),
                None => methods.push(Method {
                    signature,
                    order,
                    entries: vec![entry],
                }),
            }
        }

        // Stable: same-order methods keep graph order
        methods.sort_by_key(|m| m.order);
        Ok(methods)
    }
}

/// Generate a C# `MonoBehaviour` class from a graph
pub fn generate(graph: &Graph, registry: &NodeRegistry, class_name: &str) -> Result<String, CodegenError> {
    if !is_csharp_identifier(class_name) {
        return Err(CodegenError::InvalidClassName {
            name: class_name.to_string(),
        });
    }

    let mut lines = vec![
        "using UnityEngine;".to_string(),
        "using System.Collections;".to_string(),
        String::new(),
        format!("public class {class_name} : MonoBehaviour"),
        "{".to_string(),
    ];

    let mut sections: Vec<Vec<String>> = Vec::new();

    let mut fields = Vec::new();
    for (name, decl) in graph.variables() {
        if !is_csharp_identifier(name) {
            return Err(CodegenError::InvalidVariableName { name: name.clone() });
        }
        fields.push(format!(
            "{INDENT}private {} {name} = {};",
            csharp_type(decl.variable_type),
            csharp_literal(&decl.initial_value(), decl.variable_type)
        ));
    }
    if !fields.is_empty() {
        sections.push(fields);
    }

    let mut generator = Generator {
        graph,
        registry,
        scope: EmitScope::default(),
        locals: Vec::new(),
        expressions: HashMap::new(),
        visiting: Vec::new(),
        exec_path: Vec::new(),
    };

    for method in generator.methods()? {
        let mut body = vec![
            format!("{INDENT}{}", method.signature),
            format!("{INDENT}{{"),
        ];
        for entry in method.entries {
            // Event outputs are visible only along their own entry
            let mark = generator.locals.len();
            generator.record_outputs(entry.node_id, entry.outputs);
            if let Some(next) = &entry.next {
                generator.follow(entry.node_id, next, 2, &mut body)?;
            }
            generator.close_block(mark);
        }
        body.push(format!("{INDENT}}}"));
        sections.push(body);
    }

    for (i, section) in sections.into_iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(section);
    }
    lines.push("}".to_string());

    let mut source = lines.join("\n");
    source.push('\n');
    tracing::info!(class = class_name, bytes = source.len(), "Generated C# source");
    Ok(source)
}

/// Code generation error; no partial output is produced
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodegenError {
    /// Node type has no code generation support
    #[error("Node {node_id} ({node_type}) is not supported by code generation")]
    UnsupportedNodeForCodegen {
        /// Offending node
        node_id: NodeId,
        /// Its type
        node_type: String,
    },

    /// Node type missing from the registry
    #[error("Unknown node type: {node_type}")]
    UnknownNodeType {
        /// Unregistered type
        node_type: String,
    },

    /// A data node depends on its own output
    #[error("Cyclic data dependency through node {node_id}")]
    CyclicDependency {
        /// Node found twice on the expression path
        node_id: NodeId,
    },

    /// Exec flow loops back to a node already on the current path
    #[error("Exec cycle through node {node_id} cannot be generated")]
    ExecCycle {
        /// Node reached twice
        node_id: NodeId,
    },

    /// An input reads an exec or event output that is not declared where it is used
    #[error("Output {node_id}.{socket_id} is not in scope where it is read")]
    OutputOutOfScope {
        /// Node owning the output
        node_id: NodeId,
        /// The output socket
        socket_id: SocketId,
    },

    /// An input is fed a type the node cannot translate
    #[error("Input {node_id}.{socket_id} cannot take a {found} value in generated code")]
    UnsupportedInputType {
        /// Consuming node
        node_id: NodeId,
        /// The input socket
        socket_id: SocketId,
        /// Type feeding it
        found: SocketType,
    },

    /// Class name is not a C# identifier
    #[error("Invalid class name: {name:?}")]
    InvalidClassName {
        /// Rejected name
        name: String,
    },

    /// Graph variable name is not a C# identifier
    #[error("Invalid variable name: {name:?}")]
    InvalidVariableName {
        /// Rejected name
        name: String,
    },
}
