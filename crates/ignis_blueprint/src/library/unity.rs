// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host runtime nodes.
//!
//! Live, these nodes forward their work to the host as runtime messages
//! (`unity/setPosition`, `unity/playSound`, ...). Nodes that read host state
//! (`GetPosition`, `GetComponent`, `GetKeyDown`) only exist in generated code.

use crate::codegen::{csharp_string, CodegenError, Emit, EmitArgs, EmitScope};
use crate::interpreter::{ExecutionError, Inputs, NodeOutcome, RuntimeContext};
use crate::node::{Node, NodeKind};
use crate::registry::{NodeCategory, NodeDefinition, NodeRegistry};
use crate::socket::{Socket, SocketId, SocketType, Value};
use indexmap::IndexMap;
use serde_json::json;

const UNITY_COLOR: [u8; 3] = [230, 126, 34];
const UI_COLOR: [u8; 3] = [52, 73, 94];
const INPUT_COLOR: [u8; 3] = [192, 57, 43];

fn exec_node(node_type: &str, title: &str, category: NodeCategory, color: [u8; 3]) -> NodeDefinition {
    NodeDefinition::new(node_type, title, NodeKind::Exec, category)
        .color(color)
        .input(Socket::input("exec_in", "Exec", SocketType::Exec))
        .output(Socket::output("exec_out", "Exec", SocketType::Exec))
}

fn object_input(id: &str, name: &str) -> Socket {
    Socket::input(id, name, SocketType::Object).required()
}

// ============================================================================
// Transform
// ============================================================================

fn set_position(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let position = Value::Vector(inputs.vector("position_in")?);
    ctx.emit(
        "unity/setPosition",
        json!({
            "object": inputs.value("object_in").to_json(),
            "position": position.to_json(),
        }),
    );
    Ok(NodeOutcome::next("exec_out"))
}

fn emit_set_position(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::statement(
        format!(
            "{}.transform.position = {};",
            args.get("object_in"),
            args.get("position_in")
        ),
        "exec_out",
    ))
}

fn emit_get_position(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression(
        "position_out",
        format!("{}.transform.position", args.get("object_in")),
    ))
}

fn emit_get_component(node: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let component_type = match args.explicit("type_in") {
        Some(expression) => expression.to_string(),
        None => csharp_string(node.data_str("componentType").unwrap_or_default()),
    };
    Ok(Emit::expression(
        "component_out",
        format!("{}.GetComponent({component_type})", args.get("object_in")),
    ))
}

// ============================================================================
// Audio
// ============================================================================

fn play_sound(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    ctx.emit("unity/playSound", json!({ "sound": inputs.value("sound_in").to_json() }));
    Ok(NodeOutcome::next("exec_out"))
}

/// A string names a clip under `Resources/`; an object plays its own `AudioSource`
fn emit_play_sound(node: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let sound = args.get("sound_in");
    let line = match args.source_type("sound_in") {
        Some(SocketType::String) => format!(
            "AudioSource.PlayClipAtPoint(Resources.Load<AudioClip>({sound}), transform.position);"
        ),
        Some(SocketType::Object) | None => format!("{sound}.GetComponent<AudioSource>().Play();"),
        Some(found) => {
            return Err(CodegenError::UnsupportedInputType {
                node_id: node.id,
                socket_id: SocketId::from("sound_in"),
                found,
            })
        }
    };
    Ok(Emit::statement(line, "exec_out"))
}

// ============================================================================
// Object lifetime
// ============================================================================

fn spawn_prefab(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let prefab = inputs.value("prefab_in");
    let position = Value::Vector(inputs.vector("position_in")?);
    ctx.emit(
        "unity/spawn",
        json!({
            "prefab": prefab.to_json(),
            "position": position.to_json(),
        }),
    );

    // Unity names instances after their prefab
    let mut values = IndexMap::new();
    values.insert(
        SocketId::from("spawned_out"),
        Value::Object(format!("{prefab}(Clone)")),
    );
    Ok(NodeOutcome::Continue {
        next: Some(SocketId::from("exec_out")),
        values,
    })
}

fn emit_spawn_prefab(_: &Node, args: &EmitArgs, scope: &mut EmitScope) -> Result<Emit, CodegenError> {
    let local = scope.fresh_local("spawned");
    let mut outputs = IndexMap::new();
    outputs.insert(SocketId::from("spawned_out"), local.clone());
    Ok(Emit::Statement {
        lines: vec![format!(
            "GameObject {local} = Instantiate({}, {}, Quaternion.identity);",
            args.get("prefab_in"),
            args.get("position_in")
        )],
        outputs,
        next: Some(SocketId::from("exec_out")),
    })
}

fn destroy_object(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    ctx.emit("unity/destroy", json!({ "object": inputs.value("object_in").to_json() }));
    Ok(NodeOutcome::next("exec_out"))
}

fn emit_destroy_object(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::statement(format!("Destroy({});", args.get("object_in")), "exec_out"))
}

fn send_message(node: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    let method = inputs
        .text("method_in")
        .or_else(|| node.data_str("method").map(str::to_string))
        .unwrap_or_default();
    ctx.emit(
        "unity/sendMessage",
        json!({
            "target": inputs.value("target_in").to_json(),
            "method": method,
            "value": inputs.value("value_in").to_json(),
        }),
    );
    Ok(NodeOutcome::next("exec_out"))
}

fn emit_send_message(node: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    let target = args.get("target_in");
    let method = match args.explicit("method_in") {
        Some(expression) => expression.to_string(),
        None => csharp_string(node.data_str("method").unwrap_or_default()),
    };
    let line = match args.explicit("value_in") {
        Some(value) => format!("{target}.SendMessage({method}, {value});"),
        None => format!("{target}.SendMessage({method});"),
    };
    Ok(Emit::statement(line, "exec_out"))
}

// ============================================================================
// UI
// ============================================================================

fn set_text(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    ctx.emit(
        "unity/setText",
        json!({
            "target": inputs.value("target_in").to_json(),
            "text": inputs.text("text_in").unwrap_or_default(),
        }),
    );
    Ok(NodeOutcome::next("exec_out"))
}

fn emit_set_text(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::statement(
        format!(
            "{}.GetComponent<UnityEngine.UI.Text>().text = {};",
            args.get("target_in"),
            args.get("text_in")
        ),
        "exec_out",
    ))
}

fn show_ui(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    ctx.emit("unity/showUI", json!({ "target": inputs.value("target_in").to_json() }));
    Ok(NodeOutcome::next("exec_out"))
}

fn hide_ui(_: &Node, inputs: &Inputs, ctx: &mut RuntimeContext<'_>) -> Result<NodeOutcome, ExecutionError> {
    ctx.emit("unity/hideUI", json!({ "target": inputs.value("target_in").to_json() }));
    Ok(NodeOutcome::next("exec_out"))
}

fn emit_show_ui(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::statement(format!("{}.SetActive(true);", args.get("target_in")), "exec_out"))
}

fn emit_hide_ui(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::statement(format!("{}.SetActive(false);", args.get("target_in")), "exec_out"))
}

// ============================================================================
// Input
// ============================================================================

fn emit_get_key_down(_: &Node, args: &EmitArgs, _: &mut EmitScope) -> Result<Emit, CodegenError> {
    Ok(Emit::expression("isdown_out", format!("Input.GetKeyDown({})", args.get("key_in"))))
}

/// Register host runtime nodes
pub fn register(registry: &mut NodeRegistry) {
    registry.register(
        exec_node("SetPosition", "Set Position", NodeCategory::Unity, UNITY_COLOR)
            .describe("Set GameObject position")
            .input(object_input("object_in", "Object"))
            .input(Socket::input("position_in", "Position", SocketType::Vector).required())
            .behavior(set_position)
            .emitter(emit_set_position),
    );

    registry.register(
        NodeDefinition::new("GetPosition", "Get Position", NodeKind::Data, NodeCategory::Unity)
            .describe("Get GameObject position")
            .color(UNITY_COLOR)
            .input(object_input("object_in", "Object"))
            .output(Socket::output("position_out", "Position", SocketType::Vector))
            .emitter(emit_get_position),
    );

    registry.register(
        NodeDefinition::new("GetComponent", "Get Component", NodeKind::Data, NodeCategory::Unity)
            .describe("Get component from GameObject")
            .color(UNITY_COLOR)
            .input(object_input("object_in", "Object"))
            .input(Socket::input("type_in", "Component Type", SocketType::String))
            .output(Socket::output("component_out", "Component", SocketType::Object))
            .data("componentType", Value::String(String::new()))
            .emitter(emit_get_component),
    );

    registry.register(
        exec_node("PlaySound", "Play Sound", NodeCategory::Unity, UNITY_COLOR)
            .describe("Play audio clip")
            .input(object_input("sound_in", "Sound"))
            .behavior(play_sound)
            .emitter(emit_play_sound),
    );

    registry.register(
        exec_node("SpawnPrefab", "Spawn Prefab", NodeCategory::Unity, UNITY_COLOR)
            .describe("Instantiate a prefab at position")
            .input(object_input("prefab_in", "Prefab"))
            .input(Socket::input("position_in", "Position", SocketType::Vector))
            .output(Socket::output("spawned_out", "Spawned", SocketType::Object))
            .behavior(spawn_prefab)
            .emitter(emit_spawn_prefab),
    );

    registry.register(
        exec_node("DestroyObject", "Destroy Object", NodeCategory::Unity, UNITY_COLOR)
            .describe("Destroy a GameObject")
            .input(object_input("object_in", "Object"))
            .behavior(destroy_object)
            .emitter(emit_destroy_object),
    );

    registry.register(
        exec_node("SendMessage", "Send Message", NodeCategory::Unity, UNITY_COLOR)
            .describe("Send message to GameObject")
            .input(object_input("target_in", "Target"))
            .input(Socket::input("method_in", "Method", SocketType::String))
            .input(Socket::input("value_in", "Value", SocketType::Object))
            .data("method", Value::String(String::new()))
            .behavior(send_message)
            .emitter(emit_send_message),
    );

    registry.register(
        exec_node("SetText", "Set Text", NodeCategory::Ui, UI_COLOR)
            .describe("Set text on UI element")
            .input(object_input("target_in", "Target"))
            .input(Socket::input("text_in", "Text", SocketType::String).required())
            .behavior(set_text)
            .emitter(emit_set_text),
    );

    registry.register(
        exec_node("ShowUI", "Show UI", NodeCategory::Ui, UI_COLOR)
            .describe("Show UI element")
            .input(object_input("target_in", "Target"))
            .behavior(show_ui)
            .emitter(emit_show_ui),
    );

    registry.register(
        exec_node("HideUI", "Hide UI", NodeCategory::Ui, UI_COLOR)
            .describe("Hide UI element")
            .input(object_input("target_in", "Target"))
            .behavior(hide_ui)
            .emitter(emit_hide_ui),
    );

    registry.register(
        NodeDefinition::new("GetKeyDown", "Get Key Down", NodeKind::Data, NodeCategory::Input)
            .describe("Check if key is pressed this frame")
            .color(INPUT_COLOR)
            .input(Socket::input("key_in", "Key", SocketType::String).with_default(Value::String("space".to_string())))
            .output(Socket::output("isdown_out", "Is Down", SocketType::Bool))
            .emitter(emit_get_key_down),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use crate::graph::Graph;
    use crate::interpreter::{Interpreter, RecordingHost, RunOutcome, RunState};
    use crate::library::create_builtin_registry;
    use crate::node::NodeId;
    use std::sync::Arc;

    fn place(graph: &mut Graph, registry: &NodeRegistry, node_type: &str, data: &[(&str, Value)]) -> NodeId {
        let data = data.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let node = registry.instantiate(node_type, [0.0, 0.0], data).unwrap();
        graph.insert_node(node).unwrap()
    }

    /// OnTriggerEnter -> `node_type`
    fn single_action(registry: &NodeRegistry, node_type: &str, data: &[(&str, Value)]) -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("action");
        let trigger = place(&mut graph, registry, "OnTriggerEnter", &[]);
        let action = place(&mut graph, registry, node_type, data);
        graph.connect(trigger, "exec_out", action, "exec_in").unwrap();
        (graph, trigger, action)
    }

    #[test]
    fn test_send_message_method_from_data() {
        let registry = create_builtin_registry();
        let (mut graph, trigger, send) =
            single_action(&registry, "SendMessage", &[("method", Value::String("OnHit".to_string()))]);
        graph.connect(trigger, "other_out", send, "target_in").unwrap();

        let source = generate(&graph, &registry, "Messenger").unwrap();
        assert!(source.contains("other.gameObject.SendMessage(\"OnHit\");"), "{source}");

        let interpreter = Interpreter::new(&registry);
        let mut payload = IndexMap::new();
        payload.insert(SocketId::from("other_out"), Value::Object("Enemy".to_string()));
        let mut run = interpreter.start_with_payload(Arc::new(graph), trigger, payload).unwrap();
        let mut host = RecordingHost::default();
        interpreter.run_to_end(&mut run, &mut host);
        assert_eq!(host.emitted[0].payload["method"], "OnHit");
    }

    #[test]
    fn test_play_sound_by_clip_name() {
        let registry = create_builtin_registry();
        let (mut graph, _, play) = single_action(&registry, "PlaySound", &[]);
        let clip = place(&mut graph, &registry, "StringConstant", &[("value", Value::String("jump".to_string()))]);
        graph.connect(clip, "value_out", play, "sound_in").unwrap();

        let source = generate(&graph, &registry, "Jumper").unwrap();
        assert!(
            source.contains("AudioSource.PlayClipAtPoint(Resources.Load<AudioClip>(\"jump\"), transform.position);"),
            "{source}"
        );
        assert!(!source.contains("\"jump\".GetComponent"));
    }

    #[test]
    fn test_play_sound_rejects_numbers() {
        let registry = create_builtin_registry();
        let (mut graph, _, play) = single_action(&registry, "PlaySound", &[]);
        let number = place(&mut graph, &registry, "FloatConstant", &[]);
        graph.connect(number, "value_out", play, "sound_in").unwrap();

        assert_eq!(
            generate(&graph, &registry, "Noisy").unwrap_err(),
            CodegenError::UnsupportedInputType {
                node_id: play,
                socket_id: SocketId::from("sound_in"),
                found: SocketType::Float,
            }
        );
    }

    #[test]
    fn test_get_component_type_from_data() {
        let registry = create_builtin_registry();
        let (mut graph, trigger, destroy) = single_action(&registry, "DestroyObject", &[]);
        let component = place(
            &mut graph,
            &registry,
            "GetComponent",
            &[("componentType", Value::String("Rigidbody".to_string()))],
        );
        graph.connect(trigger, "other_out", component, "object_in").unwrap();
        graph.connect(component, "component_out", destroy, "object_in").unwrap();

        let source = generate(&graph, &registry, "Stripper").unwrap();
        assert!(
            source.contains("Destroy(other.gameObject.GetComponent(\"Rigidbody\"));"),
            "{source}"
        );
    }

    #[test]
    fn test_spawn_publishes_instance() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("spawn");
        let add = |graph: &mut Graph, ty: &str| {
            let node = registry.instantiate(ty, [0.0, 0.0], IndexMap::new()).unwrap();
            graph.insert_node(node).unwrap()
        };
        let start = add(&mut graph, "Start");
        let spawn = add(&mut graph, "SpawnPrefab");
        let show = add(&mut graph, "ShowUI");
        graph
            .node_mut(spawn)
            .unwrap()
            .inputs
            .iter_mut()
            .find(|s| s.id.as_str() == "prefab_in")
            .unwrap()
            .default_value = Some(Value::Object("Coin".to_string()));
        graph.connect(start, "exec_out", spawn, "exec_in").unwrap();
        graph.connect(spawn, "exec_out", show, "exec_in").unwrap();
        graph.connect(spawn, "spawned_out", show, "target_in").unwrap();

        let interpreter = Interpreter::new(&registry);
        let mut run = interpreter.start(Arc::new(graph), start).unwrap();
        let mut host = RecordingHost::default();
        assert_eq!(
            interpreter.run_to_end(&mut run, &mut host),
            &RunState::Terminated(RunOutcome::Completed)
        );

        let kinds: Vec<_> = host.emitted.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(kinds, ["unity/spawn", "unity/showUI"]);
        assert_eq!(host.emitted[0].payload["position"], json!({ "x": 0.0, "y": 0.0, "z": 0.0 }));
        assert_eq!(host.emitted[1].payload["target"], "Coin(Clone)");
    }

    #[test]
    fn test_missing_required_object_fails() {
        let registry = create_builtin_registry();
        let mut graph = Graph::new("destroy");
        let start = graph
            .insert_node(registry.instantiate("Start", [0.0, 0.0], IndexMap::new()).unwrap())
            .unwrap();
        let destroy = graph
            .insert_node(registry.instantiate("DestroyObject", [0.0, 0.0], IndexMap::new()).unwrap())
            .unwrap();
        graph.connect(start, "exec_out", destroy, "exec_in").unwrap();

        let interpreter = Interpreter::new(&registry);
        let mut run = interpreter.start(Arc::new(graph), start).unwrap();
        let state = interpreter.run_to_end(&mut run, &mut RecordingHost::default()).clone();
        assert!(matches!(
            state,
            RunState::Terminated(RunOutcome::Failed {
                node_id,
                error: ExecutionError::UnresolvedSocket { .. },
            }) if node_id == destroy
        ));
    }
}
