//! Wire encoding for `SocketAddr`, used by the HANDLE variant's owner
//! field (spec.md §4.1: `LONG(oid) ‖ SEQ((host, port))`).
//!
//! The address is carried as a bare 2-element immutable SEQ body whose
//! items are full tag+body values (`TEXT` host, `INT` port) — the same
//! "bare container, tagged elements" shape MAP pairs and ERROR args use.

use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr};

use crate::codec::{read_seq_body, write_seq_body, Codec};
use crate::error::{Result, WireError};
use crate::value::{SeqKind, Value};

pub(crate) fn write_address_body(
    codec: &Codec,
    addr: &SocketAddr,
    out: &mut dyn Write,
) -> Result<()> {
    let items = [
        Value::text(addr.ip().to_string()),
        Value::Int(addr.port() as i32),
    ];
    write_seq_body(codec, SeqKind::Immutable, &items, out)
}

pub(crate) fn read_address_body(codec: &Codec, input: &mut dyn Read) -> Result<SocketAddr> {
    let (_, mut items) = read_seq_body(codec, input)?;
    if items.len() != 2 {
        return Err(WireError::Malformed("address is not a (host, port) pair".into()));
    }
    let port = items.pop().unwrap();
    let host = items.pop().unwrap();
    let port = port
        .as_int()
        .ok_or_else(|| WireError::Malformed("address port is not an INT".into()))?;
    let host = host
        .as_text()
        .ok_or_else(|| WireError::Malformed("address host is not TEXT".into()))?;
    let ip: IpAddr = host
        .parse()
        .map_err(|_| WireError::Malformed(format!("address host {host:?} is not an IP literal")))?;
    Ok(SocketAddr::new(ip, port as u16))
}
