//! The network-backed [`Capability`] implementation (spec.md §4.6,
//! component C7). Grounded on `service.py`'s `RemoteReference`: every
//! capability-set method turns into a PULL with a fixed `op` name and
//! issues the call through a transport instead of touching memory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use nom_wire::{LongInt, Value};

use crate::capability::Capability;
use crate::error::{CoreError, Result};

/// `attr` is wire-typed `bytes` (spec.md §6's well-known attributes).
fn attr_value(attr: &str) -> Value {
    Value::bytes(attr.as_bytes().to_vec())
}

/// The edge `nom-core` hands off to for actually sending a PULL and
/// waiting on its reply. `nom-service::Service` is the real
/// implementation; this trait exists so `nom-core` has no socket or
/// thread code of its own (SPEC_FULL.md §0).
pub trait PullTransport: Send + Sync {
    fn pull(&self, peer: SocketAddr, oid: &LongInt, op: &str, attrs: Vec<(String, Value)>) -> Result<Value>;
}

/// A proxy for an object living on another service (`srv.addr != self.addr`
/// in the source). Every [`Capability`] method is one blocking PULL.
///
/// `blocking` and `pushdata` are carried from the source 1:1
/// (`self.blocking=True`, `self.pushdata={}`): `pushdata` is consulted
/// for `get_attr` before issuing a PULL, exactly as `RemoteReference.GetAttr`
/// checks it first, but nothing currently populates it — spec.md §4.6
/// reserves that for future PUSH traffic and explicitly does not ask
/// this port to implement PUSH. Only the blocking mode is implemented
/// here: a non-blocking mode would need every [`Capability`] method to
/// return either a value or a pending handle, which would leak the
/// network-vs-local distinction into the trait every local object also
/// implements, so this port keeps `blocking` fixed at `true` (an Open
/// Question resolved in DESIGN.md rather than left dangling).
pub struct RemoteReference {
    transport: Arc<dyn PullTransport>,
    peer: SocketAddr,
    oid: LongInt,
    blocking: bool,
    pushdata: Mutex<HashMap<String, Value>>,
}

impl RemoteReference {
    pub fn new(transport: Arc<dyn PullTransport>, peer: SocketAddr, oid: LongInt) -> Self {
        RemoteReference { transport, peer, oid, blocking: true, pushdata: Mutex::new(HashMap::new()) }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn oid(&self) -> &LongInt {
        &self.oid
    }

    fn pull(&self, op: &str, attrs: Vec<(String, Value)>) -> Result<Value> {
        if !self.blocking {
            return Err(CoreError::NotReady);
        }
        self.transport.pull(self.peer, &self.oid, op, attrs)
    }
}

impl Capability for RemoteReference {
    fn get_attr(&self, attr: &str) -> Result<Value> {
        if let Some(v) = self.pushdata.lock().unwrap().get(attr) {
            return Ok(v.clone());
        }
        self.pull("GetAttr", vec![("attr".into(), attr_value(attr))])
    }

    fn set_attr(&self, attr: &str, val: Value) -> Result<()> {
        self.pull("SetAttr", vec![("attr".into(), attr_value(attr)), ("val".into(), val)])?;
        Ok(())
    }

    fn del_attr(&self, attr: &str) -> Result<()> {
        self.pull("DelAttr", vec![("attr".into(), attr_value(attr))])?;
        Ok(())
    }

    fn get_item(&self, item: Value) -> Result<Value> {
        self.pull("GetItem", vec![("item".into(), item)])
    }

    fn set_item(&self, item: Value, val: Value) -> Result<()> {
        self.pull("SetItem", vec![("item".into(), item), ("val".into(), val)])?;
        Ok(())
    }

    fn del_item(&self, item: Value) -> Result<()> {
        self.pull("DelItem", vec![("item".into(), item)])?;
        Ok(())
    }

    fn len(&self) -> Result<i32> {
        let v = self.pull("Len", Vec::new())?;
        v.as_int().ok_or_else(|| CoreError::Remote { name: "type-error".into(), args: vec![v] })
    }

    fn repr(&self) -> Result<String> {
        let v = self.pull("Repr", Vec::new())?;
        Ok(v.as_text().unwrap_or_default().to_owned())
    }

    fn str(&self) -> Result<String> {
        let v = self.pull("Str", Vec::new())?;
        Ok(v.as_text().unwrap_or_default().to_owned())
    }

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        self.pull(
            "Call",
            vec![
                ("args".into(), Value::seq(nom_wire::SeqKind::Immutable, args)),
                (
                    "kwargs".into(),
                    Value::Map(kwargs.into_iter().map(|(k, v)| (Value::text(k), v)).collect()),
                ),
            ],
        )
    }
}
