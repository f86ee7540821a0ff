//! Packet framing (spec.md §4.2, component C2): a command byte plus an
//! attribute mapping, `u8(cmd) ‖ codec.encode_map(attrs)`.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::codec::{read_u8, Codec};
use crate::error::{Result, WireError};
use crate::value::Value;

/// The five wire commands from spec.md §4.4's CMD table, plus the
/// decode-default `Keepalive` sentinel (never sent, only ever the
/// result of a missing/unrecognized command byte on read).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmd {
    Sync,
    Desync,
    Pull,
    Resolve,
    List,
    Push,
    Keepalive,
    /// A command byte present on the wire but not one of the above.
    Unknown(u8),
}

impl Cmd {
    pub fn as_byte(self) -> u8 {
        match self {
            Cmd::Sync => 0,
            Cmd::Desync => 1,
            Cmd::Pull => 2,
            Cmd::Resolve => 3,
            Cmd::List => 4,
            Cmd::Push => 5,
            Cmd::Keepalive => 6,
            Cmd::Unknown(b) => b,
        }
    }

    pub fn from_byte(b: u8) -> Cmd {
        match b {
            0 => Cmd::Sync,
            1 => Cmd::Desync,
            2 => Cmd::Pull,
            3 => Cmd::Resolve,
            4 => Cmd::List,
            5 => Cmd::Push,
            6 => Cmd::Keepalive,
            other => Cmd::Unknown(other),
        }
    }
}

/// `(cmd, attrs)` per spec.md §4.2. Attribute names are kept sorted
/// (`BTreeMap`) purely for deterministic iteration in logs/tests; the
/// canonical wire ordering is independently enforced by
/// [`Codec::write_map_body`] on the attribute keys' own encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub cmd: Cmd,
    pub attrs: BTreeMap<String, Value>,
}

impl Packet {
    pub fn new(cmd: Cmd) -> Self {
        Packet { cmd, attrs: BTreeMap::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn xid(&self) -> Option<i32> {
        self.get("xid").and_then(Value::as_int)
    }

    pub fn encode(&self, codec: &Codec) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(codec, &mut out)?;
        Ok(out)
    }

    pub fn write(&self, codec: &Codec, out: &mut dyn Write) -> Result<()> {
        out.write_all(&[self.cmd.as_byte()])
            .map_err(WireError::from)?;
        let entries: Vec<(Value, Value)> = self
            .attrs
            .iter()
            .map(|(k, v)| (Value::text(k.clone()), v.clone()))
            .collect();
        codec.write_map_body(&entries, out)
    }

    pub fn decode(codec: &Codec, bytes: &[u8]) -> Result<Packet> {
        let mut cursor = std::io::Cursor::new(bytes);
        Packet::read(codec, &mut cursor)
    }

    /// Decodes a packet. A truncated command byte defaults to
    /// `Keepalive`; a truncated or absent attribute map defaults to
    /// empty, per spec.md §4.2.
    pub fn read(codec: &Codec, input: &mut dyn Read) -> Result<Packet> {
        let cmd = match read_u8(input) {
            Ok(b) => Cmd::from_byte(b),
            Err(WireError::Truncated) => return Ok(Packet::new(Cmd::Keepalive)),
            Err(e) => return Err(e),
        };
        let entries = match codec.read_map_body(input) {
            Ok(entries) => entries,
            Err(WireError::Truncated) => Vec::new(),
            Err(e) => return Err(e),
        };
        let mut attrs = BTreeMap::new();
        for (k, v) in entries {
            let name = k
                .as_text()
                .ok_or_else(|| WireError::Malformed("attribute name is not TEXT".into()))?
                .to_owned();
            attrs.insert(name, v);
        }
        Ok(Packet { cmd, attrs })
    }
}
