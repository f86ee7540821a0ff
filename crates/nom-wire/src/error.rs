use thiserror::Error;
use displaydoc::Display;

/// Errors raised while encoding or decoding the tagged wire format.
#[derive(Error, Display, Debug)]
pub enum WireError {
    /// no codec variant is registered for this value's type: {0}
    Unserializeable(&'static str),
    /// inbound tag {0} has no registered codec variant
    UnknownTag(u8),
    /// text could not be decoded with the advertised codec
    TextDecode,
    /// packet is malformed: {0}
    Malformed(String),
    /// read past the end of the buffer while decoding
    Truncated,
    /// an I/O error occurred while encoding or decoding: {0}
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
