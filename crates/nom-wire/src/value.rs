use std::net::SocketAddr;

/// The ordered/unordered character of a [`Value::Seq`], carried on the
/// wire as the `kind_byte` in spec.md's SEQ body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeqKind {
    /// Ordered, index-addressable (a list/vec).
    Indexed = 0,
    /// Ordered, immutable (a tuple).
    Immutable = 1,
    /// Unordered, unique elements (a set).
    Unique = 2,
}

impl SeqKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(SeqKind::Indexed),
            1 => Some(SeqKind::Immutable),
            2 => Some(SeqKind::Unique),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An arbitrary-precision integer, held as its canonical decimal digit
/// string per spec.md §3's LONG body.
///
/// Stored as text rather than backed by a bignum crate: the wire format
/// *is* the digit string, so no conversion loss is possible, and the
/// values actually carried by this protocol (object ids, xids promoted
/// to LONG) all fit comfortably in an `i64`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LongInt(String);

impl LongInt {
    /// Build from a canonical decimal digit string (optional leading
    /// `-`, no leading zeros except the literal `"0"`).
    pub fn from_decimal(s: impl Into<String>) -> Self {
        LongInt(s.into())
    }

    pub fn as_decimal(&self) -> &str {
        &self.0
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<i64> for LongInt {
    fn from(v: i64) -> Self {
        LongInt(v.to_string())
    }
}

impl From<i32> for LongInt {
    fn from(v: i32) -> Self {
        LongInt(v.to_string())
    }
}

/// A tagged sum over every wire-representable value in spec.md §3.
///
/// No `Ord` here: MAP key ordering is canonical *byte* order of each
/// key's own encoding, not a native ordering over this enum (a `Value`
/// can hold an `f64`, which has none). [`crate::codec::Codec::write_map_body`]
/// encodes each key through the codec and sorts on those bytes directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(LongInt),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Bool(bool),
    Seq(SeqKind, Vec<Value>),
    Map(Vec<(Value, Value)>),
    Byte(u8),
    None,
    Slice { start: i32, stop: i32, step: i32 },
    Ellipsis,
    Error { name: String, args: Vec<Value> },
    /// `(object_id, owner_address)` — the wire encoding of a live
    /// object (spec.md §4.1, tag 255). Produced and consumed by the
    /// object-translation layer in `nom-core`; the codec only knows
    /// how to read and write the bytes.
    Handle { oid: LongInt, owner: SocketAddr },
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(b.into())
    }

    pub fn seq(kind: SeqKind, items: Vec<Value>) -> Self {
        Value::Seq(kind, items)
    }

    pub fn error(name: impl Into<String>, args: Vec<Value>) -> Self {
        Value::Error { name: name.into(), args }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(_, items) => Some(items),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Self {
        Value::Text(v.to_owned())
    }
}
