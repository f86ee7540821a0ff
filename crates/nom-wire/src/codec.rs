//! The tagged, self-describing binary codec (spec.md §4.1, component C1).
//!
//! A [`Codec`] is a registry of [`Variant`]s keyed two ways: by [`Tag`]
//! for decoding, and by a `matches` predicate for encoding. Encoding
//! walks the registry in priority order (ties broken by registration
//! order) and uses the first variant whose `matches` accepts the value;
//! this is the "most specific variant wins" rule from spec.md §4.1,
//! re-expressed per the REDESIGN FLAGS as an explicit priority instead
//! of an inheritance-depth comparison (Rust's `Value` has no MRO to
//! measure). Built-in variants are registered once, in ascending tag
//! order, at the priorities in [`Codec::new`]; user code may add more
//! with [`Codec::register`], auto-assigned a tag at or above
//! [`Tag::USER`] unless an explicit tag is requested.
//!
//! Reading the wire-format table in spec.md §4.1: a component written
//! as `NAME(args)` using a primitive's own name (`INT(len)`, `BYTES(s)`,
//! `LONG(oid)`, `SEQ((k,v))`, ...) means that primitive's *bare body*,
//! with no tag byte of its own — it is inlined into the surrounding
//! body. Only `Serialize(item)` denotes a full recursive encode (tag
//! byte + body). [`write_seq_body`]/[`read_seq_body`] and
//! [`write_bytes_body`]/[`read_bytes_body`] are exactly those bare
//! encodings, shared between the top-level SEQ/BYTES variants and the
//! other wire shapes (HANDLE, ERROR, MAP) that embed them inline.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian as Be, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, WireError};
use crate::tag::Tag;
use crate::value::{LongInt, SeqKind, Value};

/// Inbound-text decoding behavior (spec.md §4.1's `text_error_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextErrorMode {
    /// Unknown codecs or invalid byte sequences decode to an empty string.
    Replace,
    /// Unknown codecs or invalid byte sequences raise [`WireError::TextDecode`].
    Strict,
}

/// One entry in the codec's variant registry.
pub trait Variant: Send + Sync {
    /// The tag this variant owns on the wire.
    fn tag(&self) -> Tag;

    /// Whether this variant is the one to use when encoding `value`.
    fn matches(&self, value: &Value) -> bool;

    /// Write `value`'s body (the tag byte itself is written by the codec).
    fn write(&self, codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()>;

    /// Read a body (the tag byte has already been consumed by the codec).
    fn read(&self, codec: &Codec, input: &mut dyn Read) -> Result<Value>;
}

struct Entry {
    variant: Box<dyn Variant>,
    priority: i32,
}

/// The codec registry: variant lookup by tag (decode) and by priority
/// order (encode), plus the text-handling knobs spec.md §4.1/§6 name.
pub struct Codec {
    variants: Vec<Entry>,
    by_tag: HashMap<u8, usize>,
    next_user_tag: u8,
    pub text_error_mode: TextErrorMode,
    /// Outbound TEXT codec name (spec.md §6's `codec.preferred_encoding`,
    /// default `UTF-8`). Inbound TEXT bodies are recognized whether they
    /// advertise this name or the literal `UTF-8` — this port stores
    /// `Value::Text` as a Rust `String`, so any configured encoding is
    /// only meaningful as the wire label, not as a distinct decode path.
    pub preferred_encoding: String,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new()
    }
}

impl Codec {
    /// A codec with every spec.md §4.1 built-in variant registered.
    pub fn new() -> Self {
        let mut codec = Codec {
            variants: Vec::new(),
            by_tag: HashMap::new(),
            next_user_tag: Tag::USER,
            text_error_mode: TextErrorMode::Replace,
            preferred_encoding: UTF8_CODEC_NAME.to_owned(),
        };
        codec.register_fixed(Tag::INT, Box::new(IntVariant));
        codec.register_fixed(Tag::LONG, Box::new(LongVariant));
        codec.register_fixed(Tag::FLOAT, Box::new(FloatVariant));
        codec.register_fixed(Tag::BYTES, Box::new(BytesVariant));
        codec.register_fixed(Tag::TEXT, Box::new(TextVariant));
        codec.register_fixed(Tag::BOOL, Box::new(BoolVariant));
        codec.register_fixed(Tag::SEQ, Box::new(SeqVariant));
        codec.register_fixed(Tag::MAP, Box::new(MapVariant));
        codec.register_fixed(Tag::BYTE, Box::new(ByteVariant));
        codec.register_fixed(Tag::NONE, Box::new(NoneVariant));
        codec.register_fixed(Tag::SLICE, Box::new(SliceVariant));
        codec.register_fixed(Tag::ELLIPSIS, Box::new(EllipsisVariant));
        codec.register_fixed(Tag::ERROR, Box::new(ErrorVariant));
        codec.register_fixed(Tag::HANDLE, Box::new(HandleVariant));
        codec
    }

    fn register_fixed(&mut self, tag: Tag, variant: Box<dyn Variant>) {
        let idx = self.variants.len();
        self.by_tag.insert(tag.value(), idx);
        self.variants.push(Entry { variant, priority: 0 });
    }

    /// Register a user variant. Auto-assigns the next tag at or above
    /// [`Tag::USER`] unless `explicit_tag` is given (spec.md §4.1: "a
    /// variant may declare an explicit tag to anchor cross-version
    /// compatibility"). Higher `priority` wins ties when more than one
    /// variant's `matches` accepts a value; among equal priorities the
    /// earliest-registered variant wins.
    pub fn register(
        &mut self,
        variant: Box<dyn Variant>,
        priority: i32,
        explicit_tag: Option<Tag>,
    ) -> Tag {
        let tag = explicit_tag.unwrap_or_else(|| {
            let t = Tag(self.next_user_tag);
            self.next_user_tag = self.next_user_tag.saturating_add(1);
            t
        });
        let idx = self.variants.len();
        self.by_tag.insert(tag.value(), idx);
        self.variants.push(Entry { variant, priority });
        tag
    }

    fn best_variant(&self, value: &Value) -> Option<&dyn Variant> {
        self.variants
            .iter()
            .filter(|e| e.variant.matches(value))
            .max_by_key(|e| e.priority)
            .map(|e| e.variant.as_ref())
    }

    /// Encode `value` to a freshly-allocated buffer (tag byte ++ body).
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(value, &mut out)?;
        Ok(out)
    }

    /// Encode `value`, appending tag byte ++ body to `out`.
    pub fn write(&self, value: &Value, out: &mut dyn Write) -> Result<()> {
        let variant = self
            .best_variant(value)
            .ok_or(WireError::Unserializeable("value"))?;
        out.write_u8(variant.tag().value())?;
        variant.write(self, value, out)
    }

    /// Decode a single value from `bytes`, tag byte included.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut cursor = Cursor::new(bytes);
        self.read(&mut cursor)
    }

    /// Decode a single value from an arbitrary reader.
    pub fn read(&self, input: &mut dyn Read) -> Result<Value> {
        let tag = read_u8(input)?;
        let idx = *self.by_tag.get(&tag).ok_or(WireError::UnknownTag(tag))?;
        self.variants[idx].variant.read(self, input)
    }

    /// The bare `MAP` body spec.md §4.1 describes: length ++ `(k, v)`
    /// pairs, sorted by the ascending byte order of each key's own
    /// fully tagged encoding (spec.md §3's canonicality requirement).
    /// No `MAP` tag byte is written — this is what `Packet::encode`
    /// uses directly for its attribute map.
    pub fn write_map_body(&self, entries: &[(Value, Value)], out: &mut dyn Write) -> Result<()> {
        let mut keyed: Vec<(Vec<u8>, &Value, &Value)> = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            keyed.push((self.encode(k)?, k, v));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        write_i32(out, entries.len() as i32)?;
        for (_, k, v) in keyed {
            write_seq_body(self, SeqKind::Immutable, &[k.clone(), v.clone()], out)?;
        }
        Ok(())
    }

    pub fn read_map_body(&self, input: &mut dyn Read) -> Result<Vec<(Value, Value)>> {
        let len = read_i32(input)?;
        let mut out = Vec::with_capacity(len.max(0) as usize);
        for _ in 0..len {
            let (_, mut pair) = read_seq_body(self, input)?;
            if pair.len() != 2 {
                return Err(WireError::Malformed("map entry is not a (key, value) pair".into()));
            }
            let v = pair.pop().unwrap();
            let k = pair.pop().unwrap();
            out.push((k, v));
        }
        Ok(out)
    }
}

// Each entry is written as the source does: `MapSerializer.Serialize`
// hands the whole `(k, v)` pair to `SequenceSerializer.Serialize` as one
// bare 2-element seq, not two independent values. The sort key is still
// `k`'s own encoded bytes alone, computed up front in `keyed`.

pub(crate) fn read_u8(input: &mut dyn Read) -> Result<u8> {
    input.read_u8().map_err(map_eof)
}

pub(crate) fn read_i32(input: &mut dyn Read) -> Result<i32> {
    input.read_i32::<Be>().map_err(map_eof)
}

pub(crate) fn write_i32(out: &mut dyn Write, v: i32) -> Result<()> {
    out.write_i32::<Be>(v).map_err(WireError::from)
}

fn map_eof(err: std::io::Error) -> WireError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::Truncated
    } else {
        WireError::from(err)
    }
}

/// Bare `BYTES` body: `INT(length) ‖ raw`, no tag byte.
pub(crate) fn write_bytes_body(out: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    write_i32(out, bytes.len() as i32)?;
    out.write_all(bytes)?;
    Ok(())
}

pub(crate) fn read_bytes_body(input: &mut dyn Read) -> Result<Vec<u8>> {
    let len = read_i32(input)?;
    if len < 0 {
        return Err(WireError::Malformed("negative length prefix".into()));
    }
    let mut buf = vec![0u8; len as usize];
    input.read_exact(&mut buf).map_err(map_eof)?;
    Ok(buf)
}

/// Bare `SEQ` body: `INT(len) ‖ BYTE(kind) ‖ Serialize(item)*`, no tag
/// byte of its own. Used both for the top-level SEQ variant and for the
/// inline sequences embedded in HANDLE, ERROR, and MAP bodies.
pub(crate) fn write_seq_body(
    codec: &Codec,
    kind: SeqKind,
    items: &[Value],
    out: &mut dyn Write,
) -> Result<()> {
    write_i32(out, items.len() as i32)?;
    out.write_u8(kind.as_byte())?;
    for item in items {
        codec.write(item, out)?;
    }
    Ok(())
}

pub(crate) fn read_seq_body(codec: &Codec, input: &mut dyn Read) -> Result<(SeqKind, Vec<Value>)> {
    let len = read_i32(input)?;
    if len < 0 {
        return Err(WireError::Malformed("negative seq length".into()));
    }
    let kind_byte = read_u8(input)?;
    let kind = SeqKind::from_byte(kind_byte)
        .ok_or_else(|| WireError::Malformed(format!("unknown seq kind {kind_byte}")))?;
    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(codec.read(input)?);
    }
    Ok((kind, items))
}

// -- built-in variants -------------------------------------------------

struct IntVariant;
impl Variant for IntVariant {
    fn tag(&self) -> Tag {
        Tag::INT
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Int(_))
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Int(v) = value else { unreachable!() };
        write_i32(out, *v)
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Int(read_i32(input)?))
    }
}

struct LongVariant;
impl Variant for LongVariant {
    fn tag(&self) -> Tag {
        Tag::LONG
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Long(_))
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Long(v) = value else { unreachable!() };
        write_bytes_body(out, v.as_decimal().as_bytes())
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        let digits = read_bytes_body(input)?;
        let text = String::from_utf8(digits)
            .map_err(|_| WireError::Malformed("LONG body is not ASCII digits".into()))?;
        Ok(Value::Long(LongInt::from_decimal(text)))
    }
}

struct FloatVariant;
impl Variant for FloatVariant {
    fn tag(&self) -> Tag {
        Tag::FLOAT
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Float(v) = value else { unreachable!() };
        out.write_f64::<Be>(*v).map_err(WireError::from)
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Float(input.read_f64::<Be>().map_err(map_eof)?))
    }
}

struct BytesVariant;
impl Variant for BytesVariant {
    fn tag(&self) -> Tag {
        Tag::BYTES
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Bytes(v) = value else { unreachable!() };
        write_bytes_body(out, v)
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Bytes(read_bytes_body(input)?))
    }
}

const UTF8_CODEC_NAME: &str = "UTF-8";

struct TextVariant;
impl Variant for TextVariant {
    fn tag(&self) -> Tag {
        Tag::TEXT
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Text(_))
    }
    fn write(&self, codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Text(v) = value else { unreachable!() };
        write_bytes_body(out, codec.preferred_encoding.as_bytes())?;
        write_bytes_body(out, v.as_bytes())
    }
    fn read(&self, codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        let codec_name = read_bytes_body(input)?;
        let data = read_bytes_body(input)?;
        let is_utf8 = codec_name.eq_ignore_ascii_case(UTF8_CODEC_NAME.as_bytes())
            || codec_name.eq_ignore_ascii_case(codec.preferred_encoding.as_bytes());
        if !is_utf8 {
            return match codec.text_error_mode {
                TextErrorMode::Replace => Ok(Value::Text(String::new())),
                TextErrorMode::Strict => Err(WireError::TextDecode),
            };
        }
        match String::from_utf8(data) {
            Ok(s) => Ok(Value::Text(s)),
            Err(e) => match codec.text_error_mode {
                TextErrorMode::Replace => {
                    Ok(Value::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()))
                }
                TextErrorMode::Strict => Err(WireError::TextDecode),
            },
        }
    }
}

struct BoolVariant;
impl Variant for BoolVariant {
    fn tag(&self) -> Tag {
        Tag::BOOL
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Bool(v) = value else { unreachable!() };
        write_i32(out, if *v { 1 } else { 0 })
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Bool(read_i32(input)? != 0))
    }
}

struct SeqVariant;
impl Variant for SeqVariant {
    fn tag(&self) -> Tag {
        Tag::SEQ
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Seq(..))
    }
    fn write(&self, codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Seq(kind, items) = value else { unreachable!() };
        write_seq_body(codec, *kind, items, out)
    }
    fn read(&self, codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        let (kind, items) = read_seq_body(codec, input)?;
        Ok(Value::Seq(kind, items))
    }
}

struct MapVariant;
impl Variant for MapVariant {
    fn tag(&self) -> Tag {
        Tag::MAP
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }
    fn write(&self, codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Map(entries) = value else { unreachable!() };
        codec.write_map_body(entries, out)
    }
    fn read(&self, codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Map(codec.read_map_body(input)?))
    }
}

struct ByteVariant;
impl Variant for ByteVariant {
    fn tag(&self) -> Tag {
        Tag::BYTE
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Byte(_))
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Byte(v) = value else { unreachable!() };
        out.write_u8(*v).map_err(WireError::from)
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Byte(read_u8(input)?))
    }
}

struct NoneVariant;
impl Variant for NoneVariant {
    fn tag(&self) -> Tag {
        Tag::NONE
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::None)
    }
    fn write(&self, _codec: &Codec, _value: &Value, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
    fn read(&self, _codec: &Codec, _input: &mut dyn Read) -> Result<Value> {
        Ok(Value::None)
    }
}

struct SliceVariant;
impl Variant for SliceVariant {
    fn tag(&self) -> Tag {
        Tag::SLICE
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Slice { .. })
    }
    fn write(&self, _codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Slice { start, stop, step } = value else { unreachable!() };
        write_i32(out, *start)?;
        write_i32(out, *stop)?;
        write_i32(out, *step)
    }
    fn read(&self, _codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Slice {
            start: read_i32(input)?,
            stop: read_i32(input)?,
            step: read_i32(input)?,
        })
    }
}

struct EllipsisVariant;
impl Variant for EllipsisVariant {
    fn tag(&self) -> Tag {
        Tag::ELLIPSIS
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Ellipsis)
    }
    fn write(&self, _codec: &Codec, _value: &Value, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
    fn read(&self, _codec: &Codec, _input: &mut dyn Read) -> Result<Value> {
        Ok(Value::Ellipsis)
    }
}

struct ErrorVariant;
impl Variant for ErrorVariant {
    fn tag(&self) -> Tag {
        Tag::ERROR
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Error { .. })
    }
    fn write(&self, codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Error { name, args } = value else { unreachable!() };
        write_bytes_body(out, name.as_bytes())?;
        write_seq_body(codec, SeqKind::Immutable, args, out)
    }
    fn read(&self, codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        let name = String::from_utf8(read_bytes_body(input)?)
            .map_err(|_| WireError::Malformed("ERROR name is not valid UTF-8".into()))?;
        let (_, args) = read_seq_body(codec, input)?;
        Ok(Value::Error { name, args })
    }
}

struct HandleVariant;
impl Variant for HandleVariant {
    fn tag(&self) -> Tag {
        Tag::HANDLE
    }
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Handle { .. })
    }
    fn write(&self, codec: &Codec, value: &Value, out: &mut dyn Write) -> Result<()> {
        let Value::Handle { oid, owner } = value else { unreachable!() };
        write_bytes_body(out, oid.as_decimal().as_bytes())?;
        crate::address::write_address_body(codec, owner, out)
    }
    fn read(&self, codec: &Codec, input: &mut dyn Read) -> Result<Value> {
        let oid_text = String::from_utf8(read_bytes_body(input)?)
            .map_err(|_| WireError::Malformed("HANDLE oid is not ASCII digits".into()))?;
        let owner = crate::address::read_address_body(codec, input)?;
        Ok(Value::Handle { oid: LongInt::from_decimal(oid_text), owner })
    }
}
