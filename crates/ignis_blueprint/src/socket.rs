// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a socket, unique within its owning node (e.g. `exec_in`, `true_out`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketId(pub String);

impl SocketId {
    /// Create a socket ID from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SocketId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

/// Type carried by a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketType {
    /// Execution flow, carries no data
    Exec,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// 3D vector
    Vector,
    /// Host object reference; also the permissive escape hatch for data connections
    Object,
}

impl SocketType {
    /// Whether this socket carries control flow
    pub fn is_exec(&self) -> bool {
        matches!(self, Self::Exec)
    }

    /// Check if a value of this type can flow into a socket of `other`
    pub fn can_connect_to(&self, other: &SocketType) -> bool {
        // Control flow and data never mix, not even through `object`
        if self.is_exec() || other.is_exec() {
            return self == other;
        }

        self == other || matches!(self, Self::Object) || matches!(other, Self::Object)
    }

    /// Zero value used when an input has neither a connection nor a literal
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::String(String::new()),
            Self::Vector => Value::Vector([0.0; 3]),
            Self::Exec | Self::Object => Value::Null,
        }
    }

    /// Lowercase name used in messages and documents
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Vector => "vector",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A socket on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    /// Socket ID, unique within the node
    pub id: SocketId,
    /// Display name
    pub name: String,
    /// Socket direction
    pub direction: SocketDirection,
    /// Carried type
    pub socket_type: SocketType,
    /// Literal used when the input is not connected
    pub default_value: Option<Value>,
    /// Whether an input must resolve to a value before the node can run
    pub required: bool,
    /// Whether more than one connection may attach to this socket
    pub multi_connect: bool,
}

impl Socket {
    /// Create a new input socket
    ///
    /// Exec inputs are merge points and accept any number of incoming
    /// connections; data inputs accept exactly one.
    pub fn input(id: impl Into<String>, name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            id: SocketId::new(id),
            name: name.into(),
            direction: SocketDirection::Input,
            socket_type,
            default_value: None,
            required: false,
            multi_connect: socket_type.is_exec(),
        }
    }

    /// Create a new output socket
    pub fn output(id: impl Into<String>, name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            id: SocketId::new(id),
            name: name.into(),
            direction: SocketDirection::Output,
            socket_type,
            default_value: None,
            required: false,
            multi_connect: true, // Outputs can fan out by default
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check if a connection from this socket to `target` is type-compatible
    pub fn can_connect(&self, target: &Socket) -> bool {
        self.direction == SocketDirection::Output
            && target.direction == SocketDirection::Input
            && self.socket_type.can_connect_to(&target.socket_type)
    }
}

/// Value that can flow through a data socket or live in node data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// 3D vector
    Vector([f64; 3]),
    /// Reference to a host object by name
    Object(String),
}

impl Value {
    /// Get the socket type for this value, `None` for `Null`
    pub fn socket_type(&self) -> Option<SocketType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(SocketType::Bool),
            Self::Int(_) => Some(SocketType::Int),
            Self::Float(_) => Some(SocketType::Float),
            Self::String(_) => Some(SocketType::String),
            Self::Vector(_) => Some(SocketType::Vector),
            Self::Object(_) => Some(SocketType::Object),
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Read as a float, coercing integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Read as an integer, truncating floats
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(v.trunc() as i64),
            _ => None,
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Read as a string slice (strings and object names)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Object(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a vector
    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to a JSON value for runtime messages
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::String(s) | Self::Object(s) => serde_json::Value::String(s.clone()),
            Self::Vector([x, y, z]) => serde_json::json!({ "x": x, "y": y, "z": z }),
        }
    }

    /// Interpret a JSON value coming from the host runtime
    ///
    /// Objects with numeric `x`/`y`/`z` fields become vectors; strings stay
    /// strings unless `hint` asks for an object reference.
    pub fn from_json(json: &serde_json::Value, hint: Option<SocketType>) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(v) => Self::Bool(*v),
            serde_json::Value::Number(n) => match (n.as_i64(), hint) {
                (Some(i), Some(SocketType::Int) | None) => Self::Int(i),
                _ => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => match hint {
                Some(SocketType::Object) => Self::Object(s.clone()),
                _ => Self::String(s.clone()),
            },
            serde_json::Value::Object(map) => {
                let axis = |key: &str| map.get(key).and_then(serde_json::Value::as_f64);
                match (axis("x"), axis("y"), axis("z")) {
                    (Some(x), Some(y), Some(z)) => Self::Vector([x, y, z]),
                    _ => Self::Null,
                }
            }
            serde_json::Value::Array(_) => Self::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) | Self::Object(s) => f.write_str(s),
            Self::Vector([x, y, z]) => write!(f, "({x}, {y}, {z})"),
        }
    }
}
