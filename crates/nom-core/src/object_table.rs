//! The object table (spec.md §4.3, component C3): `omap` (oid → object)
//! and `pubmap` (published name → oid). Grounded on `service.py`'s
//! `Service.omap`/`pubmap`/`Register`/`Unregister`/`Resolve`/`List`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use nom_wire::LongInt;

use crate::capability::Capability;
use crate::error::{CoreError, Result};

/// Tracks every local object this service has pinned, plus the subset
/// published under a name. Objects enter via [`ObjectTable::register`]
/// (explicit) or [`ObjectTable::pin`] (implicit, on outbound
/// serialization — spec.md §3's lifecycle rule: "every serialized local
/// object is pinned"). Nothing ever leaves except at teardown; spec.md's
/// Non-goals explicitly exclude handle garbage collection.
pub struct ObjectTable {
    next_oid: AtomicI64,
    omap: RwLock<HashMap<i64, Arc<dyn Capability>>>,
    pubmap: RwLock<HashMap<String, i64>>,
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTable {
    pub fn new() -> Self {
        ObjectTable {
            next_oid: AtomicI64::new(1),
            omap: RwLock::new(HashMap::new()),
            pubmap: RwLock::new(HashMap::new()),
        }
    }

    /// Pin `obj`, minting a fresh oid. Used for objects with no prior
    /// identity (the source keys `omap` by `id(obj)`, Python's object
    /// identity; a minted counter stands in for that here, per
    /// SPEC_FULL.md §2).
    pub fn pin(&self, obj: Arc<dyn Capability>) -> i64 {
        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        self.omap.write().unwrap().insert(oid, obj);
        oid
    }

    /// Publish `obj` under `name`, pinning it if not already present.
    pub fn register(&self, obj: Arc<dyn Capability>, name: impl Into<String>) -> i64 {
        let oid = self.pin(obj);
        self.pubmap.write().unwrap().insert(name.into(), oid);
        oid
    }

    /// Publish an already-pinned object under `name`.
    pub fn register_oid(&self, oid: i64, name: impl Into<String>) {
        self.pubmap.write().unwrap().insert(name.into(), oid);
    }

    pub fn unregister(&self, name: &str) {
        self.pubmap.write().unwrap().remove(name);
    }

    pub fn lookup(&self, oid: i64) -> Result<Arc<dyn Capability>> {
        self.omap
            .read()
            .unwrap()
            .get(&oid)
            .cloned()
            .ok_or_else(|| CoreError::BadOid(oid.to_string()))
    }

    pub fn lookup_long(&self, oid: &LongInt) -> Result<Arc<dyn Capability>> {
        let oid = oid
            .to_i64()
            .ok_or_else(|| CoreError::BadOid(oid.as_decimal().to_owned()))?;
        self.lookup(oid)
    }

    pub fn resolve(&self, name: &str) -> Result<(i64, Arc<dyn Capability>)> {
        let oid = *self
            .pubmap
            .read()
            .unwrap()
            .get(name)
            .ok_or_else(|| CoreError::NoSuchName(name.to_owned()))?;
        Ok((oid, self.lookup(oid)?))
    }

    /// The published names, in spec.md §4.4's LIST reply shape.
    pub fn list(&self) -> Vec<String> {
        self.pubmap.read().unwrap().keys().cloned().collect()
    }
}
