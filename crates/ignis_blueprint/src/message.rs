// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-shaped messages exchanged with the host runtime.

use serde::{Deserialize, Serialize};

/// Inbound message type that starts a run at a specific event node
pub const TRIGGER: &str = "blueprint/trigger";

/// Inbound message type that forwards a host lifecycle callback
pub const LIFECYCLE_EVENT: &str = "blueprint/event";

/// A `{ type, payload }` message crossing the runtime transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMessage {
    /// Message type, e.g. `blueprint/trigger` or `unity/playSound`
    #[serde(rename = "type")]
    pub kind: String,
    /// Message body
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RuntimeMessage {
    /// Create a message
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Read a string field of the payload
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let message = RuntimeMessage::new("unity/playSound", serde_json::json!({ "sound": "jump" }));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "unity/playSound");
        assert_eq!(json["payload"]["sound"], "jump");

        let parsed: RuntimeMessage = serde_json::from_str(r#"{"type":"blueprint/trigger"}"#).unwrap();
        assert_eq!(parsed.kind, TRIGGER);
        assert!(parsed.payload.is_null());
    }
}
