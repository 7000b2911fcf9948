// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow control and debug nodes.

use crate::codegen::{csharp_string, CodegenError, Emit, EmitArgs, EmitScope};
use crate::interpreter::{ExecutionError, Inputs, NodeOutcome, RuntimeContext, SuspendReason};
use crate::node::{Node, NodeKind};
use crate::registry::{NodeCategory, NodeDefinition, NodeRegistry};
use crate::socket::{Socket, SocketId, SocketType, Value};

const FLOW_COLOR: [u8; 3] = [127, 140, 141];
const DEBUG_COLOR: [u8; 3] = [52, 152, 219];

/// Number of `then{n}_out` sockets on a Sequence node
pub const SEQUENCE_OUTPUTS: usize = 3;

fn sequence_socket(index: usize) -> SocketId {
    SocketId::new(format!("then{index}_out"))
}

// ============================================================================
// Branch
// ============================================================================

fn branch(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let socket = if inputs.bool("condition_in")? {
        "true_out"
    } else {
        "false_out"
    };
    Ok(NodeOutcome::next(socket))
}

fn emit_branch(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::Branch {
        condition: args.get("condition_in").to_string(),
        then: SocketId::from("true_out"),
        otherwise: SocketId::from("false_out"),
    })
}

// ============================================================================
// Sequence
// ============================================================================

fn sequence(_: &Node, _: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::Sequence((0..SEQUENCE_OUTPUTS).map(sequence_socket).collect()))
}

fn emit_sequence(_: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::Sequence((0..SEQUENCE_OUTPUTS).map(sequence_socket).collect()))
}

// ============================================================================
// Delay
// ============================================================================

fn delay(_: &Node, inputs: &Inputs, _: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::Suspend {
        resume: SocketId::from("completed_out"),
        reason: SuspendReason::Delay {
            seconds: inputs.float("duration_in")?.max(0.0),
        },
    })
}

// ============================================================================
// Print
// ============================================================================

fn print(node: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let message = inputs
        .text("message_in")
        .or_else(|| node.data_str("message").map(str::to_string))
        .unwrap_or_default();
    ctx.print(&message);
    Ok(NodeOutcome::next("exec_out"))
}

fn emit_print(node: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let message = match args.explicit("message_in") {
        Some(expression) => expression.to_string(),
        None => csharp_string(node.data_str("message").unwrap_or_default()),
    };
    Ok(Emit::statement(format!("Debug.Log({message});"), "exec_out"))
}

/// Register flow control and debug nodes
pub fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDefinition::new("Branch", "Branch", NodeKind::Exec, NodeCategory::Flow)
            .describe("Conditional execution based on boolean value")
            .color(FLOW_COLOR)
            .input(Socket::input("exec_in", "Exec", SocketType::Exec))
            .input(Socket::input("condition_in", "Condition", SocketType::Bool).required())
            .output(Socket::output("true_out", "True", SocketType::Exec))
            .output(Socket::output("false_out", "False", SocketType::Exec))
            .behavior(branch)
            .emitter(emit_branch),
    );

    let mut definition = NodeDefinition::new("Sequence", "Sequence", NodeKind::Exec, NodeCategory::Flow)
        .describe("Execute multiple outputs in sequence")
        .color(FLOW_COLOR)
        .input(Socket::input("exec_in", "Exec", SocketType::Exec));
    for index in 0..SEQUENCE_OUTPUTS {
        definition = definition.output(Socket::output(
            sequence_socket(index).as_str(),
            format!("Then {index}"),
            SocketType::Exec,
        ));
    }
    registry.register(definition.behavior(sequence).emitter(emit_sequence));

    // Suspends the run; lifecycle methods have no way to wait, so no emitter
    registry.register(
        NodeDefinition::new("Delay", "Delay", NodeKind::Exec, NodeCategory::Flow)
            .describe("Wait for specified seconds")
            .color(FLOW_COLOR)
            .input(Socket::input("exec_in", "Exec", SocketType::Exec))
            .input(
                Socket::input("duration_in", "Duration", SocketType::Float)
                    .with_default(Value::Float(1.0))
                    .required(),
            )
            .output(Socket::output("completed_out", "Completed", SocketType::Exec))
            .behavior(delay),
    );

    registry.register(
        NodeDefinition::new("Print", "Print", NodeKind::Exec, NodeCategory::Debug)
            .describe("Print message to console")
            .color(DEBUG_COLOR)
            .input(Socket::input("exec_in", "Exec", SocketType::Exec))
            // Debug.Log accepts any object, so the message socket does too
            .input(Socket::input("message_in", "Message", SocketType::Object))
            .output(Socket::output("exec_out", "Exec", SocketType::Exec))
            .data("message", Value::String(String::new()))
            .behavior(print)
            .emitter(emit_print),
    );
}
