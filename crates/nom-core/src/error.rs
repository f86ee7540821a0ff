use displaydoc::Display;
use nom_wire::{Value, WireError};
use thiserror::Error;

/// Errors raised by the object table, translator, and remote-reference
/// layer (spec.md §7's `protocol/*` and `runtime/*` taxonomies).
#[derive(Error, Display, Debug)]
pub enum CoreError {
    /// no object registered under oid {0}
    BadOid(String),
    /// no object published under name {0:?}
    NoSuchName(String),
    /// access denied
    AccessDenied,
    /// deferred result is not ready yet
    NotReady,
    /// remote peer raised {name}: {args:?}
    Remote { name: String, args: Vec<Value> },
    /// inbound command byte {0} has no handler
    UnknownCommand(u8),
    /// inbound pull operation {0:?} has no handler
    UnknownPull(String),
    /// wire codec error: {0}
    Wire(#[from] WireError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
