use crate::error::FormatError;
use crate::statics;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt::Write as _;

/// Ordered string-keyed map used for item fields and JSON objects.
pub type Map = IndexMap<String, Value>;

/// A JSON number that keeps the integer vs float distinction of its source text,
/// so `1` stays `1` and `1.0` stays `1.0` across a load/save cycle.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Number {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::I64(v) => Some(*v),
            Number::U64(v) => i64::try_from(*v).ok(),
            Number::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::I64(v) => *v as f64,
            Number::U64(v) => *v as f64,
            Number::F64(v) => *v,
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            Number::I64(v) => out.push_str(&v.to_string()),
            Number::U64(v) => out.push_str(&v.to_string()),
            Number::F64(v) => {
                if v.is_nan() {
                    out.push_str("NaN");
                } else if v.is_infinite() {
                    if v.is_sign_negative() {
                        out.push_str("-Infinity");
                    } else {
                        out.push_str("Infinity");
                    }
                } else {
                    let mut buf = ryu::Buffer::new();
                    out.push_str(buf.format_finite(*v));
                }
            }
        }
    }
}

// Integers compare by value regardless of which variant the parser picked.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::F64(a), Number::F64(b)) => a == b,
            (Number::F64(_), _) | (_, Number::F64(_)) => false,
            (Number::U64(a), Number::U64(b)) => a == b,
            (a, b) => a.as_i64().is_some() && a.as_i64() == b.as_i64(),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Number::I64(v) => serializer.serialize_i64(*v),
            Number::U64(v) => serializer.serialize_u64(*v),
            Number::F64(v) => serializer.serialize_f64(*v),
        }
    }
}

/// A field or document value.
///
/// Fields normally hold scalars (null, bool, number, string). Arrays and
/// objects are accepted too so that a document never loses data on a
/// load/save cycle, even though the editor only displays them as text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

/// Shared null returned by field lookups that miss.
pub(crate) static NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Parse JSON text. JSON5 extensions (comments, trailing commas,
    /// `Infinity`/`NaN`) are accepted as well.
    pub fn parse(text: &str) -> Result<Value, FormatError> {
        json5::from_str::<Value>(text).map_err(|e| FormatError::Parse(e.to_string()))
    }

    /// Text shown for this value in views and filter menus.
    /// Null renders as `None`; strings render without quotes.
    pub fn display_text(&self) -> String {
        match self {
            Value::Null => statics::LITERAL_NONE.to_string(),
            Value::String(s) => s.clone(),
            other => other.to_compact_string(),
        }
    }

    /// Single-line JSON with `", "` and `": "` separators.
    pub fn to_compact_string(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out, false);
        out
    }

    /// Indented JSON: 4-space indent, keys always quoted, non-ASCII escaped
    /// as `\uXXXX` (surrogate pairs outside the BMP), no trailing newline.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out, true);
        out
    }

    /// Writes iteratively: open containers sit on an explicit stack, so
    /// nesting depth is bounded by memory rather than by the call stack.
    fn write_json(&self, out: &mut String, pretty: bool) {
        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut pending = Some(self);
        loop {
            if let Some(value) = pending.take() {
                match value {
                    Value::Null => out.push_str("null"),
                    Value::Bool(v) => out.push_str(if *v {
                        statics::LITERAL_TRUE
                    } else {
                        statics::LITERAL_FALSE
                    }),
                    Value::Number(n) => n.write(out),
                    Value::String(s) => write_escaped_string_ascii(out, s),
                    Value::Array(values) if values.is_empty() => out.push_str("[]"),
                    Value::Object(map) if map.is_empty() => out.push_str("{}"),
                    Value::Array(values) => {
                        out.push('[');
                        stack.push(Frame::new(Entries::Array(values.iter())));
                    }
                    Value::Object(map) => {
                        out.push('{');
                        stack.push(Frame::new(Entries::Object(map.iter())));
                    }
                }
            }

            let depth = stack.len();
            let Some(frame) = stack.last_mut() else {
                break;
            };
            match frame.entries.next_entry() {
                Some((key, value)) => {
                    if !frame.first {
                        out.push(',');
                        if !pretty {
                            out.push(' ');
                        }
                    }
                    frame.first = false;
                    if pretty {
                        push_line_indent(out, depth * statics::INDENT_WIDTH);
                    }
                    if let Some(key) = key {
                        write_escaped_string_ascii(out, key);
                        out.push_str(": ");
                    }
                    pending = Some(value);
                }
                None => {
                    let close = frame.entries.close();
                    stack.pop();
                    if pretty {
                        push_line_indent(out, (depth - 1) * statics::INDENT_WIDTH);
                    }
                    out.push(close);
                }
            }
        }
    }
}

// Containers are flattened onto a heap stack before dropping, so deeply
// nested documents do not recurse once per level.
impl Drop for Value {
    fn drop(&mut self) {
        let mut stack: Vec<Value> = match self {
            Value::Array(values) => std::mem::take(values),
            Value::Object(map) => std::mem::take(map).into_values().collect(),
            _ => return,
        };
        while let Some(mut value) = stack.pop() {
            match &mut value {
                Value::Array(values) => stack.append(values),
                Value::Object(map) => stack.extend(std::mem::take(map).into_values()),
                _ => {}
            }
        }
    }
}

/// An array or object whose entries are still being written.
struct Frame<'a> {
    entries: Entries<'a>,
    first: bool,
}

impl<'a> Frame<'a> {
    fn new(entries: Entries<'a>) -> Self {
        Self {
            entries,
            first: true,
        }
    }
}

enum Entries<'a> {
    Array(std::slice::Iter<'a, Value>),
    Object(indexmap::map::Iter<'a, String, Value>),
}

impl<'a> Entries<'a> {
    fn next_entry(&mut self) -> Option<(Option<&'a str>, &'a Value)> {
        match self {
            Entries::Array(values) => values.next().map(|v| (None, v)),
            Entries::Object(map) => map.next().map(|(k, v)| (Some(k.as_str()), v)),
        }
    }

    fn close(&self) -> char {
        match self {
            Entries::Array(_) => ']',
            Entries::Object(_) => '}',
        }
    }
}

fn push_line_indent(out: &mut String, indent: usize) {
    out.push_str(statics::NL);
    out.push_str(&" ".repeat(indent));
}

fn write_escaped_string_ascii(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                write!(out, "\\u{:04x}", c as u32).ok();
            }
            c if (c as u32) > 0x7F => {
                let cp = c as u32;
                if cp <= 0xFFFF {
                    write!(out, "\\u{:04x}", cp).ok();
                } else {
                    let u = cp - 0x1_0000;
                    let high = 0xD800 + ((u >> 10) & 0x3FF);
                    let low = 0xDC00 + (u & 0x3FF);
                    write!(out, "\\u{:04x}\\u{:04x}", high, low).ok();
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::I64(v.into()))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::I64(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::F64(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(values) => values.serialize(serializer),
            Value::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a JSON value")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Value::Number(Number::I64(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Value::Number(Number::U64(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Value::Number(Number::F64(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Value::String(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(Value::String(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<Value>()? {
                    values.push(value);
                }
                Ok(Value::Array(values))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut values = Map::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    values.insert(key, value);
                }
                Ok(Value::Object(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}
