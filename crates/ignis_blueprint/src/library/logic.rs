// SPDX-License-Identifier: MIT OR Apache-2.0
//! Comparison and boolean logic nodes.

use crate::codegen::{CodegenError, Emit, EmitArgs, EmitScope};
use crate::interpreter::{ExecutionError, Inputs, NodeOutcome, RuntimeContext};
use crate::node::{Node, NodeKind};
use crate::registry::{NodeCategory, NodeDefinition, NodeRegistry};
use crate::socket::{Socket, SocketId, SocketType, Value};
use std::str::FromStr;

const LOGIC_COLOR: [u8; 3] = [241, 196, 15];

/// Comparison performed by a Compare node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareOp {
    /// `a == b`
    #[default]
    Equal,
    /// `a != b`
    NotEqual,
    /// `a > b`
    Greater,
    /// `a >= b`
    GreaterEqual,
    /// `a < b`
    Less,
    /// `a <= b`
    LessEqual,
}

impl CompareOp {
    /// Apply the comparison
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            Self::Equal => a == b,
            Self::NotEqual => a != b,
            Self::Greater => a > b,
            Self::GreaterEqual => a >= b,
            Self::Less => a < b,
            Self::LessEqual => a <= b,
        }
    }

    /// C# operator
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
        }
    }

    /// Operation configured on a node: the `op_in` literal, then `data.operation`
    ///
    /// Unknown names fall back to `Equal`.
    fn of_node(node: &Node, op: Option<&str>) -> Self {
        op.or_else(|| node.data_str("operation"))
            .and_then(|name| name.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Equal" => Ok(Self::Equal),
            "NotEqual" => Ok(Self::NotEqual),
            "Greater" => Ok(Self::Greater),
            "GreaterEqual" => Ok(Self::GreaterEqual),
            "Less" => Ok(Self::Less),
            "LessEqual" => Ok(Self::LessEqual),
            _ => Err(format!("unknown comparison '{s}'")),
        }
    }
}

fn boolean(value: bool) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::value("result_out", Value::Bool(value)))
}

fn compare(node: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let op = CompareOp::of_node(node, inputs.value("op_in").as_str());
    boolean(op.apply(inputs.float("a_in")?, inputs.float("b_in")?))
}

fn emit_compare(node: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    // The operator must be known at generation time, so only the literal counts
    let literal = node
        .input(&SocketId::from("op_in"))
        .and_then(|socket| socket.default_value.as_ref())
        .and_then(Value::as_str);
    let op = CompareOp::of_node(node, literal);
    Ok(Emit::expression(
        "result_out",
        format!("({} {} {})", args.get("a_in"), op.symbol(), args.get("b_in")),
    ))
}

fn and(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    boolean(inputs.bool("a_in")? && inputs.bool("b_in")?)
}

fn emit_and(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression(
        "result_out",
        format!("({} && {})", args.get("a_in"), args.get("b_in")),
    ))
}

fn not(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    boolean(!inputs.bool("value_in")?)
}

fn emit_not(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression("result_out", format!("(!{})", args.get("value_in"))))
}

/// Register logic nodes
pub fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDefinition::new("Compare", "Compare", NodeKind::Data, NodeCategory::Logic)
            .describe("Compare two values (greater than, less than, equal)")
            .color(LOGIC_COLOR)
            .input(Socket::input("a_in", "A", SocketType::Float).required())
            .input(Socket::input("b_in", "B", SocketType::Float).required())
            .input(
                Socket::input("op_in", "Operation", SocketType::String)
                    .with_default(Value::String("Equal".to_string())),
            )
            .output(Socket::output("result_out", "Result", SocketType::Bool))
            .behavior(compare)
            .emitter(emit_compare),
    );

    registry.register(
        NodeDefinition::new("And", "And", NodeKind::Data, NodeCategory::Logic)
            .describe("True when both inputs are true")
            .color(LOGIC_COLOR)
            .input(Socket::input("a_in", "A", SocketType::Bool))
            .input(Socket::input("b_in", "B", SocketType::Bool))
            .output(Socket::output("result_out", "Result", SocketType::Bool))
            .behavior(and)
            .emitter(emit_and),
    );

    registry.register(
        NodeDefinition::new("Not", "Not", NodeKind::Data, NodeCategory::Logic)
            .describe("Invert a boolean")
            .color(LOGIC_COLOR)
            .input(Socket::input("value_in", "Value", SocketType::Bool))
            .output(Socket::output("result_out", "Result", SocketType::Bool))
            .behavior(not)
            .emitter(emit_not),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_ops() {
        assert!(CompareOp::Less.apply(1.0, 2.0));
        assert!(!CompareOp::Greater.apply(1.0, 2.0));
        assert!(CompareOp::GreaterEqual.apply(2.0, 2.0));
        assert!(CompareOp::NotEqual.apply(2.0, 3.0));
        assert_eq!("LessEqual".parse::<CompareOp>().unwrap().symbol(), "<=");
        assert!("Spaceship".parse::<CompareOp>().is_err());
    }

    #[test]
    fn test_unknown_operation_falls_back_to_equal() {
        let registry = crate::library::create_builtin_registry();
        let node = registry
            .instantiate("Compare", [0.0, 0.0], indexmap::IndexMap::new())
            .unwrap();
        assert_eq!(CompareOp::of_node(&node, Some("Spaceship")), CompareOp::Equal);
    }
}
