use displaydoc::Display;
use nom_core::CoreError;
use thiserror::Error;

/// Errors raised by the running service (spec.md §7; the taxonomy
/// entries that only make sense once there's a socket and threads).
#[derive(Error, Display, Debug)]
pub enum ServiceError {
    /// I/O error on the service socket: {0}
    Io(#[from] std::io::Error),
    /// deferred transaction timed out waiting for a reply
    Timeout,
    /// inbound command byte {0} has no handler
    UnknownCommand(u8),
    /// inbound pull operation {0:?} has no handler
    UnknownPull(String),
    /// {0}
    Core(#[from] CoreError),
    /// service is shutting down
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
