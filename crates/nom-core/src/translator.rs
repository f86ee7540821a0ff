//! The object translator (spec.md §4.3/§4.6, component C4). Grounded on
//! `service.py`'s `ObjectTranslator`: the bridge between a live
//! [`Capability`] object and its `Value::Handle` wire form.
//!
//! `nom_wire`'s codec only knows the `(oid, owner_address)` bytes of a
//! handle; mapping those bytes to an actual object — a local lookup when
//! `owner == self`, a fresh [`RemoteReference`] otherwise — is a
//! decision specific to a running service, so it lives here rather than
//! in the wire crate.

use std::net::SocketAddr;
use std::sync::Arc;

use nom_wire::{LongInt, Value};

use crate::capability::Capability;
use crate::error::Result;
use crate::object_table::ObjectTable;
use crate::remote_reference::{PullTransport, RemoteReference};

pub struct ObjectTranslator {
    self_addr: SocketAddr,
    table: Arc<ObjectTable>,
    transport: Arc<dyn PullTransport>,
}

impl ObjectTranslator {
    pub fn new(self_addr: SocketAddr, table: Arc<ObjectTable>, transport: Arc<dyn PullTransport>) -> Self {
        ObjectTranslator { self_addr, table, transport }
    }

    /// Pin `obj` (if not already) and build its wire handle, owned by
    /// this service (`ObjectTranslator.Serialize` in the source).
    pub fn encode_handle(&self, obj: Arc<dyn Capability>) -> Value {
        let oid = self.table.pin(obj);
        Value::Handle { oid: LongInt::from(oid), owner: self.self_addr }
    }

    /// Pin an already-registered oid's object into a wire handle without
    /// minting a new one — used when replying with a result that is
    /// already a known local object (e.g. `RESOLVE`'s hit).
    pub fn encode_existing(&self, oid: i64) -> Value {
        Value::Handle { oid: LongInt::from(oid), owner: self.self_addr }
    }

    /// Resolve a decoded `Value::Handle` back into a live object:
    /// a local lookup if `owner == self`, else a proxy (`ObjectTranslator.Deserialize`).
    pub fn decode_handle(&self, oid: &LongInt, owner: SocketAddr) -> Result<Arc<dyn Capability>> {
        if owner == self.self_addr {
            self.table.lookup_long(oid)
        } else {
            Ok(Arc::new(RemoteReference::new(self.transport.clone(), owner, oid.clone())))
        }
    }

    /// Convenience over [`Self::decode_handle`] for a `Value` that may
    /// or may not actually be a handle.
    pub fn decode_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Handle { oid, owner } => {
                // A decoded handle fed back through the wire is, from the
                // caller's point of view, just an opaque live reference;
                // callers that need `Capability` access call
                // `decode_handle` directly instead of going through a `Value`.
                let _ = self.decode_handle(&oid, owner)?;
                Ok(Value::Handle { oid, owner })
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    struct Dummy;
    impl Capability for Dummy {
        fn get_attr(&self, _: &str) -> Result<Value> {
            Ok(Value::None)
        }
        fn set_attr(&self, _: &str, _: Value) -> Result<()> {
            Ok(())
        }
        fn del_attr(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn get_item(&self, _: Value) -> Result<Value> {
            Ok(Value::None)
        }
        fn set_item(&self, _: Value, _: Value) -> Result<()> {
            Ok(())
        }
        fn del_item(&self, _: Value) -> Result<()> {
            Ok(())
        }
        fn len(&self) -> Result<i32> {
            Ok(0)
        }
        fn repr(&self) -> Result<String> {
            Ok("Dummy".into())
        }
        fn str(&self) -> Result<String> {
            Ok("Dummy".into())
        }
        fn call(&self, _: Vec<Value>, _: Vec<(String, Value)>) -> Result<Value> {
            Ok(Value::None)
        }
    }

    struct NoTransport;
    impl PullTransport for NoTransport {
        fn pull(&self, _: SocketAddr, _: &LongInt, op: &str, _: Vec<(String, Value)>) -> Result<Value> {
            Err(CoreError::UnknownPull(op.to_owned()))
        }
    }

    #[test]
    fn handle_to_self_resolves_to_the_same_local_object() {
        let addr: SocketAddr = "127.0.0.1:12074".parse().unwrap();
        let table = Arc::new(ObjectTable::new());
        let translator = ObjectTranslator::new(addr, table, Arc::new(NoTransport));
        let handle = translator.encode_handle(Arc::new(Dummy));
        let Value::Handle { oid, owner } = handle else { panic!("expected handle") };
        assert_eq!(owner, addr);
        let resolved = translator.decode_handle(&oid, owner).unwrap();
        assert_eq!(resolved.repr().unwrap(), "Dummy");
    }

    #[test]
    fn handle_to_a_peer_resolves_to_a_remote_reference() {
        let addr: SocketAddr = "127.0.0.1:12074".parse().unwrap();
        let peer: SocketAddr = "127.0.0.1:12075".parse().unwrap();
        let table = Arc::new(ObjectTable::new());
        let translator = ObjectTranslator::new(addr, table, Arc::new(NoTransport));
        let oid = LongInt::from(7i64);
        let resolved = translator.decode_handle(&oid, peer).unwrap();
        // A RemoteReference's Repr issues a PULL; NoTransport always errors,
        // which is itself proof this path did not hit the local table.
        assert!(resolved.repr().is_err());
    }
}
