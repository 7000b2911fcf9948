// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic and vector math nodes.
//!
//! All math nodes are pure data nodes working on floats; integer inputs are
//! widened on read.

use crate::codegen::{CodegenError, Emit, EmitArgs, EmitScope};
use crate::interpreter::{ExecutionError, Inputs, NodeOutcome, RuntimeContext};
use crate::node::{Node, NodeKind};
use crate::registry::{NodeCategory, NodeDefinition, NodeRegistry};
use crate::socket::{Socket, SocketType, Value};

const MATH_COLOR: [u8; 3] = [46, 204, 113];
const VECTOR_COLOR: [u8; 3] = [123, 104, 238];

type Behavior = fn(&Node, &Inputs, &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError>;
type Emitter = fn(&Node, &EmitArgs, &mut EmitScope) -> Result<Emit, CodegenError>;

fn result(value: f64) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::value("result_out", Value::Float(value)))
}

// ============================================================================
// Binary arithmetic
// ============================================================================

fn add(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    result(inputs.float("a_in")? + inputs.float("b_in")?)
}

fn subtract(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    result(inputs.float("a_in")? - inputs.float("b_in")?)
}

fn multiply(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    result(inputs.float("a_in")? * inputs.float("b_in")?)
}

fn divide(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let b = inputs.float("b_in")?;
    result(if b == 0.0 { 0.0 } else { inputs.float("a_in")? / b })
}

fn modulo(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let b = inputs.float("b_in")?;
    result(if b == 0.0 { 0.0 } else { inputs.float("a_in")? % b })
}

fn emit_add(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let (a, b) = (args.get("a_in"), args.get("b_in"));
    Ok(Emit::expression("result_out", format!("({a} + {b})")))
}

fn emit_subtract(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let (a, b) = (args.get("a_in"), args.get("b_in"));
    Ok(Emit::expression("result_out", format!("({a} - {b})")))
}

fn emit_multiply(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let (a, b) = (args.get("a_in"), args.get("b_in"));
    Ok(Emit::expression("result_out", format!("({a} * {b})")))
}

fn emit_divide(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let (a, b) = (args.get("a_in"), args.get("b_in"));
    Ok(Emit::expression("result_out", format!("({b} == 0f ? 0f : {a} / {b})")))
}

fn emit_modulo(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let (a, b) = (args.get("a_in"), args.get("b_in"));
    Ok(Emit::expression("result_out", format!("({b} == 0f ? 0f : {a} % {b})")))
}

// ============================================================================
// Interpolation
// ============================================================================

fn clamp(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let value = inputs.float("value_in")?;
    // max/min instead of f64::clamp, which panics when min > max
    result(value.min(inputs.float("max_in")?).max(inputs.float("min_in")?))
}

fn lerp(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let a = inputs.float("a_in")?;
    let b = inputs.float("b_in")?;
    result(a + (b - a) * inputs.float("t_in")?)
}

fn emit_clamp(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression(
        "result_out",
        format!(
            "Mathf.Clamp({}, {}, {})",
            args.get("value_in"),
            args.get("min_in"),
            args.get("max_in")
        ),
    ))
}

fn emit_lerp(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression(
        "result_out",
        format!(
            "Mathf.LerpUnclamped({}, {}, {})",
            args.get("a_in"),
            args.get("b_in"),
            args.get("t_in")
        ),
    ))
}

// ============================================================================
// Vector math
// ============================================================================

fn vector_add(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let [ax, ay, az] = inputs.vector("a_in")?;
    let [bx, by, bz] = inputs.vector("b_in")?;
    Ok(NodeOutcome::value("result_out", Value::Vector([ax + bx, ay + by, az + bz])))
}

fn vector_scale(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let scale = inputs.float("scale_in")?;
    let v = inputs.vector("vector_in")?;
    Ok(NodeOutcome::value("result_out", Value::Vector(v.map(|c| c * scale))))
}

fn emit_vector_scale(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let (v, s) = (args.get("vector_in"), args.get("scale_in"));
    Ok(Emit::expression("result_out", format!("({v} * {s})")))
}

fn float_input(id: &str, name: &str, default: f64) -> Socket {
    Socket::input(id, name, SocketType::Float)
        .with_default(Value::Float(default))
        .required()
}

fn binary_node(
    node_type: &str,
    title: &str,
    description: &str,
    default: f64,
    behavior: Behavior,
    emitter: Emitter,
) -> NodeDefinition {
    NodeDefinition::new(node_type, title, NodeKind::Data, NodeCategory::Math)
        .describe(description)
        .color(MATH_COLOR)
        .input(float_input("a_in", "A", default))
        .input(float_input("b_in", "B", default))
        .output(Socket::output("result_out", "Result", SocketType::Float))
        .behavior(behavior)
        .emitter(emitter)
}

/// Register math nodes
pub fn register(registry: &mut NodeRegistry) {
    registry.register(binary_node("Add", "Add", "Add two numbers", 0.0, add, emit_add));
    registry.register(binary_node(
        "Subtract",
        "Subtract",
        "Subtract two numbers",
        0.0,
        subtract,
        emit_subtract,
    ));
    registry.register(binary_node(
        "Multiply",
        "Multiply",
        "Multiply two numbers",
        1.0,
        multiply,
        emit_multiply,
    ));
    registry.register(binary_node(
        "Divide",
        "Divide",
        "Divide two numbers (zero divisor gives zero)",
        1.0,
        divide,
        emit_divide,
    ));
    registry.register(binary_node(
        "Modulo",
        "Modulo",
        "Calculate remainder after division",
        1.0,
        modulo,
        emit_modulo,
    ));

    registry.register(
        NodeDefinition::new("Clamp", "Clamp", NodeKind::Data, NodeCategory::Math)
            .describe("Clamp value between min and max")
            .color(MATH_COLOR)
            .input(Socket::input("value_in", "Value", SocketType::Float).required())
            .input(float_input("min_in", "Min", 0.0))
            .input(float_input("max_in", "Max", 1.0))
            .output(Socket::output("result_out", "Result", SocketType::Float))
            .behavior(clamp)
            .emitter(emit_clamp),
    );

    registry.register(
        NodeDefinition::new("Lerp", "Lerp", NodeKind::Data, NodeCategory::Math)
            .describe("Linear interpolation between two values")
            .color(MATH_COLOR)
            .input(float_input("a_in", "A", 0.0))
            .input(float_input("b_in", "B", 1.0))
            .input(float_input("t_in", "T", 0.5))
            .output(Socket::output("result_out", "Result", SocketType::Float))
            .behavior(lerp)
            .emitter(emit_lerp),
    );

    registry.register(
        NodeDefinition::new("VectorAdd", "Vector Add", NodeKind::Data, NodeCategory::Math)
            .describe("Add two Vector3 values")
            .color(VECTOR_COLOR)
            .input(Socket::input("a_in", "A", SocketType::Vector).required())
            .input(Socket::input("b_in", "B", SocketType::Vector).required())
            .output(Socket::output("result_out", "Result", SocketType::Vector))
            .behavior(vector_add)
            .emitter(emit_add),
    );

    registry.register(
        NodeDefinition::new("VectorScale", "Vector Scale", NodeKind::Data, NodeCategory::Math)
            .describe("Multiply vector by scalar")
            .color(VECTOR_COLOR)
            .input(Socket::input("vector_in", "Vector", SocketType::Vector).required())
            .input(float_input("scale_in", "Scale", 1.0))
            .output(Socket::output("result_out", "Result", SocketType::Vector))
            .behavior(vector_scale)
            .emitter(emit_vector_scale),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::interpreter::{Interpreter, RecordingHost};
    use crate::library::create_builtin_registry;
    use crate::socket::SocketId;
    use indexmap::IndexMap;

    fn eval(node_type: &str, inputs: &[(&str, Value)]) -> Value {
        let registry = create_builtin_registry();
        let mut node = registry.instantiate(node_type, [0.0, 0.0], IndexMap::new()).unwrap();
        for (id, value) in inputs {
            let socket = node.inputs.iter_mut().find(|s| s.id.as_str() == *id).unwrap();
            socket.default_value = Some(value.clone());
        }
        let mut graph = Graph::new("math");
        let id = graph.insert_node(node).unwrap();
        Interpreter::new(&registry)
            .evaluate(&graph, id, &SocketId::from("result_out"), &mut RecordingHost::default())
            .unwrap()
    }

    #[test]
    fn test_divide_by_zero_is_zero() {
        assert_eq!(eval("Divide", &[("a_in", Value::Float(4.0)), ("b_in", Value::Float(0.0))]), Value::Float(0.0));
        assert_eq!(eval("Divide", &[("a_in", Value::Float(4.0)), ("b_in", Value::Float(2.0))]), Value::Float(2.0));
        assert_eq!(eval("Modulo", &[("a_in", Value::Float(7.0)), ("b_in", Value::Float(0.0))]), Value::Float(0.0));
    }

    #[test]
    fn test_int_inputs_widen() {
        assert_eq!(eval("Subtract", &[("a_in", Value::Int(7)), ("b_in", Value::Float(0.5))]), Value::Float(6.5));
    }

    #[test]
    fn test_clamp_and_lerp() {
        assert_eq!(eval("Clamp", &[("value_in", Value::Float(3.0))]), Value::Float(1.0));
        assert_eq!(eval("Clamp", &[("value_in", Value::Float(-2.0))]), Value::Float(0.0));
        assert_eq!(eval("Lerp", &[("b_in", Value::Float(10.0))]), Value::Float(5.0));
    }

    #[test]
    fn test_vectors() {
        let a = Value::Vector([1.0, 2.0, 3.0]);
        assert_eq!(
            eval("VectorAdd", &[("a_in", a.clone()), ("b_in", a.clone())]),
            Value::Vector([2.0, 4.0, 6.0])
        );
        assert_eq!(
            eval("VectorScale", &[("vector_in", a), ("scale_in", Value::Float(-1.0))]),
            Value::Vector([-1.0, -2.0, -3.0])
        );
    }
}
