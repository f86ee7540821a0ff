//! Self-describing tagged binary codec and packet framing (spec.md §4.1-4.2,
//! components C1 and C2). No networking lives here — `nom-core` and
//! `nom-service` build the object model and the UDP transport on top.

mod address;
pub mod codec;
pub mod error;
mod packet;
pub mod tag;
pub mod value;

pub use codec::{Codec, TextErrorMode, Variant};
pub use error::{Result, WireError};
pub use packet::{Cmd, Packet};
pub use tag::Tag;
pub use value::{LongInt, SeqKind, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn roundtrip(codec: &Codec, value: &Value) -> Value {
        let bytes = codec.encode(value).expect("encode");
        codec.decode(&bytes).expect("decode")
    }

    #[test]
    fn int_roundtrips() {
        let codec = Codec::new();
        assert_eq!(roundtrip(&codec, &Value::Int(-17)), Value::Int(-17));
    }

    #[test]
    fn long_roundtrips_large_values() {
        let codec = Codec::new();
        let v = Value::Long(LongInt::from(9_223_372_036_854_775_807i64));
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn float_roundtrips() {
        let codec = Codec::new();
        let v = Value::Float(3.14159);
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn text_roundtrips_utf8() {
        let codec = Codec::new();
        let v = Value::text("héllo wörld");
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn preferred_encoding_changes_the_outbound_codec_name_and_still_roundtrips() {
        let mut codec = Codec::new();
        codec.preferred_encoding = "ASCII".to_owned();
        let v = Value::text("plain ascii");
        let bytes = codec.encode(&v).expect("encode");
        let mut cursor = std::io::Cursor::new(&bytes[1..]);
        let codec_name = codec::read_bytes_body(&mut cursor).expect("codec name");
        assert_eq!(codec_name, b"ASCII");
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn text_replace_mode_decodes_foreign_codec_as_empty() {
        let codec = Codec::new();
        let mut bytes = vec![Tag::TEXT.value()];
        // codec name "LATIN-1", data irrelevant — only UTF-8 is accepted.
        codec::write_bytes_body(&mut bytes, b"LATIN-1").unwrap();
        codec::write_bytes_body(&mut bytes, b"\xe9").unwrap();
        let decoded = codec.decode(&bytes).expect("decode");
        assert_eq!(decoded, Value::text(""));
    }

    #[test]
    fn nested_seq_roundtrips() {
        let codec = Codec::new();
        let v = Value::seq(
            SeqKind::Indexed,
            vec![Value::Int(1), Value::text("two"), Value::Bool(true)],
        );
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn map_roundtrips_and_sorts_keys_canonically() {
        let codec = Codec::new();
        let entries = vec![
            (Value::text("zeta"), Value::Int(1)),
            (Value::text("alpha"), Value::Int(2)),
            (Value::text("mid"), Value::Int(3)),
        ];
        let v = Value::Map(entries);
        let bytes = codec.encode(&v).expect("encode");
        let decoded = codec.decode(&bytes).expect("decode");
        let Value::Map(pairs) = decoded else { panic!("expected map") };
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_text().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "decoded map entries must come back in canonical byte order");
    }

    #[test]
    fn error_roundtrips_with_args() {
        let codec = Codec::new();
        let v = Value::error("protocol/name-error", vec![Value::text("no such object")]);
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn handle_roundtrips() {
        let codec = Codec::new();
        let owner: SocketAddr = "127.0.0.1:12074".parse().unwrap();
        let v = Value::Handle { oid: LongInt::from(42i64), owner };
        assert_eq!(roundtrip(&codec, &v), v);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let codec = Codec::new();
        let bytes = [253u8];
        match codec.decode(&bytes) {
            Err(WireError::UnknownTag(253)) => {}
            other => panic!("expected UnknownTag(253), got {other:?}"),
        }
    }

    #[test]
    fn packet_roundtrips_with_attrs() {
        let codec = Codec::new();
        let pkt = Packet::new(Cmd::Pull)
            .with("xid", 7)
            .with("op", Value::bytes(b"GetAttr".to_vec()))
            .with("oid", Value::Long(LongInt::from(1i64)));
        let bytes = pkt.encode(&codec).expect("encode");
        let decoded = Packet::decode(&codec, &bytes).expect("decode");
        assert_eq!(decoded, pkt);
        assert_eq!(decoded.xid(), Some(7));
    }

    #[test]
    fn packet_decode_defaults_cmd_to_keepalive_on_truncation() {
        let codec = Codec::new();
        let decoded = Packet::decode(&codec, &[]).expect("decode");
        assert_eq!(decoded.cmd, Cmd::Keepalive);
        assert!(decoded.attrs.is_empty());
    }
}
