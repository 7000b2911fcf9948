// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event nodes: entry points fired by host lifecycle callbacks.
//!
//! Events have no interpreter behavior; a run simply continues on their
//! first exec output, with data outputs seeded by the host payload.

use crate::codegen::{CodegenError, Emit, EmitArgs, EmitScope};
use crate::node::{Node, NodeKind};
use crate::registry::{NodeCategory, NodeDefinition, NodeRegistry};
use crate::socket::{Socket, SocketId, SocketType};
use indexmap::IndexMap;

const EVENT_COLOR: [u8; 3] = [231, 76, 60];

fn lifecycle(signature: &str, order: u8) -> Emit {
    Emit::Lifecycle {
        signature: signature.to_string(),
        order,
        outputs: IndexMap::new(),
        next: Some(SocketId::from("exec_out")),
    }
}

fn emit_start(_: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(lifecycle("void Start()", 0))
}

fn emit_update(_: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(lifecycle("void Update()", 1))
}

fn emit_trigger_enter(_: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let mut outputs = IndexMap::new();
    outputs.insert(SocketId::from("other_out"), "other.gameObject".to_string());
    Ok(Emit::Lifecycle {
        signature: "void OnTriggerEnter(Collider other)".to_string(),
        order: 2,
        outputs,
        next: Some(SocketId::from("exec_out")),
    })
}

fn emit_destroy(_: &Node, _: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(lifecycle("void OnDestroy()", 3))
}

fn event(node_type: &str, title: &str, description: &str) -> NodeDefinition {
    NodeDefinition::new(node_type, title, NodeKind::Event, NodeCategory::Events)
        .describe(description)
        .color(EVENT_COLOR)
        .output(Socket::output("exec_out", "Exec", SocketType::Exec))
}

/// Register the lifecycle event nodes
pub fn register(registry: &mut NodeRegistry) {
    registry.register(event("Start", "On Start", "Called when script starts").emitter(emit_start));

    registry.register(event("OnUpdate", "On Update", "Called every frame").emitter(emit_update));

    registry.register(
        event("OnTriggerEnter", "On Trigger Enter", "Called when trigger is entered")
            .output(Socket::output("other_out", "Other", SocketType::Object))
            .emitter(emit_trigger_enter),
    );

    registry.register(
        event("OnDestroy", "On Destroy", "Called when the object is destroyed").emitter(emit_destroy),
    );
}
