//! Runtime values, register addresses and their advisory type tags

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Field name inside an apparatus input or output record
pub type Var = String;

/// Named parameters flowing into and out of an apparatus
pub type Record = BTreeMap<Var, Param>;

/// Build a [`Record`] from `(var, value)` pairs
pub fn record<K, P, I>(pairs: I) -> Record
where
    K: Into<Var>,
    P: Into<Param>,
    I: IntoIterator<Item = (K, P)>,
{
    pairs
        .into_iter()
        .map(|(k, p)| (k.into(), p.into()))
        .collect()
}

/// Opaque register name
///
/// Addresses are mutable slots: a later write to the same address replaces
/// the earlier value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Address named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The register name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Address {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A file attached to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name
    pub name: String,
    /// MIME type
    pub media_type: String,
    /// Raw contents
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Attachment from raw bytes
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Plain-text attachment
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, "text/plain", content.into().into_bytes())
    }
}

/// A runtime value held in a register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// UTF-8 text
    Text(String),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Boolean flag
    Bool(bool),
    /// An attached file
    File(Attachment),
    /// Arbitrary structured data
    Json(serde_json::Value),
}

impl Value {
    /// Returns the type name used when a value is tagged without a declaration
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::File(_) => "file",
            Value::Json(_) => "json",
        }
    }

    /// The text, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The flag, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The attachment, if this is a file
    pub fn as_file(&self) -> Option<&Attachment> {
        match self {
            Value::File(a) => Some(a),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Attachment> for Value {
    fn from(a: Attachment) -> Self {
        Value::File(a)
    }
}

/// Declared type of a var or register
///
/// Purely advisory: the interpreter never checks values against it. The
/// `optional` flag is honoured when gathering inputs and scattering outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualType {
    /// Type name, e.g. `text`
    pub name: String,

    /// Absent values are tolerated
    #[serde(default)]
    pub optional: bool,

    /// What the var holds, shown to planners
    #[serde(default)]
    pub description: String,
}

impl VirtualType {
    /// Required type named `name`
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            description: description.into(),
        }
    }

    /// Required `text`
    pub fn text(description: impl Into<String>) -> Self {
        Self::new("text", description)
    }

    /// Required `integer`
    pub fn integer(description: impl Into<String>) -> Self {
        Self::new("integer", description)
    }

    /// Required `bool`
    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new("bool", description)
    }

    /// Required `file`
    pub fn file(description: impl Into<String>) -> Self {
        Self::new("file", description)
    }

    /// Mark this type as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl fmt::Display for VirtualType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "{}?", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A value tagged with its declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// The value
    pub value: Value,
    /// Its declared type
    pub vtype: VirtualType,
}

impl Param {
    /// Value tagged with `vtype`
    pub fn new(value: impl Into<Value>, vtype: VirtualType) -> Self {
        Self {
            value: value.into(),
            vtype,
        }
    }

    /// The text, if the value is text
    pub fn text(&self) -> Option<&str> {
        self.value.as_text()
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        let vtype = VirtualType::new(value.type_name(), "");
        Self { value, vtype }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Value::from(s).into()
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Value::from(s).into()
    }
}

impl From<i64> for Param {
    fn from(i: i64) -> Self {
        Value::from(i).into()
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Value::from(b).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_infers_type_name() {
        let param = Param::from(42i64);
        assert_eq!(param.vtype.name, "integer");
        assert_eq!(param.value.as_integer(), Some(42));
    }

    #[test]
    fn test_record_builder() {
        let rec = record([("text", "hello"), ("lang", "en")]);
        assert_eq!(rec.len(), 2);
        assert_eq!(rec["text"].text(), Some("hello"));
    }

    #[test]
    fn test_value_serde_shape() {
        let json = serde_json::to_value(Value::from("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "value": "hi"}));
    }

    #[test]
    fn test_optional_type_display() {
        assert_eq!(VirtualType::file("attachment").optional().to_string(), "file?");
        assert_eq!(VirtualType::text("prompt").to_string(), "text");
    }
}
