// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant and graph variable nodes.
//!
//! Constants read their literal from `data.value`; variable nodes name
//! their variable in `data.variable`.

use crate::codegen::{csharp_literal, is_csharp_identifier, CodegenError, Emit, EmitArgs, EmitScope};
use crate::interpreter::{ExecutionError, Inputs, NodeOutcome, RuntimeContext};
use crate::node::{Node, NodeKind};
use crate::registry::{NodeCategory, NodeDefinition, NodeRegistry};
use crate::socket::{Socket, SocketId, SocketType, Value};
use indexmap::IndexMap;

const CONSTANT_COLOR: [u8; 3] = [155, 89, 182];
const VARIABLE_COLOR: [u8; 3] = [26, 188, 156];

// ============================================================================
// Constants
// ============================================================================

/// The node's literal coerced to its output type
fn constant_value(node: &Node) -> Value {
    let socket_type = node
        .outputs
        .first()
        .map_or(SocketType::Object, |socket| socket.socket_type);
    let value = node.data_value("value").cloned().unwrap_or_default();
    match (socket_type, &value) {
        (SocketType::Float, v) => v.as_float().map_or(Value::Float(0.0), Value::Float),
        (SocketType::Int, v) => v.as_int().map_or(Value::Int(0), Value::Int),
        (_, Value::Null) => socket_type.zero_value(),
        _ => value,
    }
}

fn constant(node: &Node, _: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::value("value_out", constant_value(node)))
}

fn emit_constant(node: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let socket_type = node
        .outputs
        .first()
        .map_or(SocketType::Object, |socket| socket.socket_type);
    Ok(Emit::expression("value_out", csharp_literal(&constant_value(node), socket_type)))
}

fn constant_node(node_type: &str, title: &str, description: &str, socket_type: SocketType) -> NodeDefinition {
    NodeDefinition::new(node_type, title, NodeKind::Data, NodeCategory::Constants)
        .describe(description)
        .color(CONSTANT_COLOR)
        .output(Socket::output("value_out", "Value", socket_type))
        .data("value", socket_type.zero_value())
        .behavior(constant)
        .emitter(emit_constant)
}

// ============================================================================
// Variables
// ============================================================================

fn variable_name(node: &Node) -> &str {
    node.data_str("variable").unwrap_or_default()
}

fn get_variable(node: &Node, _: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let value = ctx.variable(variable_name(node)).cloned().unwrap_or_default();
    Ok(NodeOutcome::value("value_out", value))
}

fn set_variable(node: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let value = inputs.value("value_in").clone();
    ctx.set_variable(variable_name(node), value.clone());
    let mut values = IndexMap::new();
    values.insert(SocketId::from("value_out"), value);
    Ok(NodeOutcome::Continue {
        next: Some("exec_out".into()),
        values,
    })
}

fn checked_variable(node: &Node) -> Result<&str, CodegenError> {
    let name = variable_name(node);
    if is_csharp_identifier(name) {
        Ok(name)
    } else {
        Err(CodegenError::InvalidVariableName {
            name: name.to_string(),
        })
    }
}

fn emit_get_variable(node: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression("value_out", checked_variable(node)?))
}

fn emit_set_variable(node: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let name = checked_variable(node)?;
    let mut outputs = IndexMap::new();
    outputs.insert(SocketId::from("value_out"), name.to_string());
    Ok(Emit::Statement {
        lines: vec![format!("{name} = {};", args.get("value_in"))],
        outputs,
        next: Some("exec_out".into()),
    })
}

/// Register constant and variable nodes
pub fn register(registry: &mut NodeRegistry) {
    registry.register(constant_node("FloatConstant", "Float", "Float constant value", SocketType::Float));
    registry.register(constant_node("IntConstant", "Int", "Integer constant value", SocketType::Int));
    registry.register(constant_node("StringConstant", "String", "String constant value", SocketType::String));
    registry.register(constant_node("BoolConstant", "Bool", "Boolean constant value", SocketType::Bool));
    registry.register(constant_node(
        "Vector3Constant",
        "Vector3",
        "Vector3 constant value",
        SocketType::Vector,
    ));

    // Variable sockets are object-typed so any data type can flow through them
    registry.register(
        NodeDefinition::new("GetVariable", "Get Variable", NodeKind::Data, NodeCategory::Variables)
            .describe("Get a variable value")
            .color(VARIABLE_COLOR)
            .output(Socket::output("value_out", "Value", SocketType::Object))
            .data("variable", Value::String(String::new()))
            .behavior(get_variable)
            .emitter(emit_get_variable),
    );

    registry.register(
        NodeDefinition::new("SetVariable", "Set Variable", NodeKind::Exec, NodeCategory::Variables)
            .describe("Set a variable value")
            .color(VARIABLE_COLOR)
            .input(Socket::input("exec_in", "Exec", SocketType::Exec))
            .input(Socket::input("value_in", "Value", SocketType::Object))
            .output(Socket::output("exec_out", "Exec", SocketType::Exec))
            .output(Socket::output("value_out", "Value", SocketType::Object))
            .data("variable", Value::String(String::new()))
            .behavior(set_variable)
            .emitter(emit_set_variable),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_coerces_to_output_type() {
        let registry = crate::library::create_builtin_registry();
        let mut data = IndexMap::new();
        data.insert("value".to_string(), Value::Int(4));
        let node = registry.instantiate("FloatConstant", [0.0, 0.0], data).unwrap();
        assert_eq!(constant_value(&node), Value::Float(4.0));

        let node = registry
            .instantiate("Vector3Constant", [0.0, 0.0], IndexMap::new())
            .unwrap();
        assert_eq!(constant_value(&node), Value::Vector([0.0; 3]));
    }

    #[test]
    fn test_variable_name_must_be_identifier() {
        let registry = crate::library::create_builtin_registry();
        let mut data = IndexMap::new();
        data.insert("variable".to_string(), Value::String("my score".to_string()));
        let node = registry.instantiate("GetVariable", [0.0, 0.0], data).unwrap();
        assert!(matches!(
            emit_get_variable(&node, &EmitArgs::default(), &mut EmitScope::default()),
            Err(CodegenError::InvalidVariableName { .. })
        ));
    }
}
