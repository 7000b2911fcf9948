// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node library.
//!
//! Each submodule registers one family of node types. Socket ids follow the
//! `{name}_in` / `{name}_out` convention and are stable across releases,
//! since saved graphs and remote operations refer to them.

pub mod events;
pub mod flow;
pub mod logic;
pub mod math;
pub mod unity;
pub mod values;

use crate::registry::NodeRegistry;

/// Register every built-in node type
pub fn register_builtin_nodes(registry: &mut NodeRegistry) {
    events::register(registry);
    flow::register(registry);
    math::register(registry);
    logic::register(registry);
    values::register(registry);
    unity::register(registry);
}

/// Create a registry holding the built-in node types
pub fn create_builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_builtin_nodes(&mut registry);
    tracing::debug!(node_types = registry.len(), "Built-in node library registered");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::registry::NodeCategory;

    #[test]
    fn test_builtin_types_registered() {
        let registry = create_builtin_registry();
        for node_type in [
            "Start", "OnUpdate", "OnTriggerEnter", "OnDestroy", "Branch", "Sequence", "Delay", "Print", "Add",
            "Subtract", "Multiply", "Divide", "Modulo", "Clamp", "Lerp", "VectorAdd", "VectorScale", "Compare",
            "And", "Not", "FloatConstant", "IntConstant", "StringConstant", "BoolConstant", "Vector3Constant",
            "GetVariable", "SetVariable", "SetPosition", "GetPosition", "GetComponent", "PlaySound", "SpawnPrefab",
            "DestroyObject", "SendMessage", "SetText", "ShowUI", "HideUI", "GetKeyDown",
        ] {
            assert!(registry.get(node_type).is_some(), "{node_type} missing");
        }
        assert_eq!(registry.len(), 38);
    }

    #[test]
    fn test_capabilities() {
        let registry = create_builtin_registry();
        for definition in registry.all() {
            let live_only = definition.node_type == "Delay";
            let codegen_only = matches!(
                definition.node_type.as_str(),
                "GetPosition" | "GetComponent" | "GetKeyDown"
            );
            let event = definition.kind == NodeKind::Event;

            assert_eq!(definition.node_emitter().is_some(), !live_only, "{}", definition.node_type);
            assert_eq!(
                definition.node_behavior().is_some(),
                !codegen_only && !event,
                "{}",
                definition.node_type
            );
        }
    }

    #[test]
    fn test_socket_shapes() {
        let registry = create_builtin_registry();
        for definition in registry.all() {
            for socket in &definition.inputs {
                assert!(socket.id.as_str().ends_with("_in"), "{}", socket.id);
                assert_eq!(socket.multi_connect, socket.socket_type.is_exec());
            }
            for socket in &definition.outputs {
                assert!(socket.id.as_str().ends_with("_out"), "{}", socket.id);
            }
            if definition.kind == NodeKind::Data {
                assert!(definition.inputs.iter().chain(&definition.outputs).all(|s| !s.socket_type.is_exec()));
            }
        }
    }

    #[test]
    fn test_every_category_is_populated() {
        let registry = create_builtin_registry();
        assert_eq!(registry.categories(), NodeCategory::all().to_vec());
    }
}
