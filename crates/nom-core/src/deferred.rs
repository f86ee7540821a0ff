//! Xid-correlated outbound transactions (spec.md §4.5, component C5).
//!
//! Grounded on the source's `Deferred`/`DeferredResult` (`service.py`)
//! and on the teacher's `Overlapped<T>{sequence, payload}` /
//! `CpmApiClient::transact` (`crates/common/src/cpm_api.rs`,
//! `crates/cpm/src/cpm_api_client.rs`) — both correlate a reply to its
//! request by a sequence number and block the caller until it arrives.
//!
//! Unlike the source's broadcast-to-every-waiter-and-filter design, this
//! routes each inbound reply directly to `outstanding[xid]`
//! (SPEC_FULL.md §4): the observable contract — a caller only ever sees
//! replies matching its own xid — is identical, spec.md §9 explicitly
//! permits the optimization, and a `HashMap` lookup replaces an O(W)
//! scan of every outstanding transaction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use nom_wire::Packet;

pub type Xid = i32;

struct Waiter {
    slot: Mutex<Option<Packet>>,
    ready: Condvar,
}

/// A single outstanding transaction. Returned by [`DeferredRegistry::begin`];
/// `wait` blocks the calling thread (an application thread, per spec.md
/// §5) until a reply with the matching xid is delivered or `timeout`
/// elapses.
pub struct Deferred {
    xid: Xid,
    waiter: Arc<Waiter>,
    registry: Arc<DeferredRegistryInner>,
}

impl Deferred {
    pub fn xid(&self) -> Xid {
        self.xid
    }

    /// Blocks until the matching reply packet arrives. Returns `None` on
    /// timeout (a caller-visible condition distinct from any wire error:
    /// the registry itself has no opinion on what a timeout means, that
    /// is `nom-service`'s call per spec.md §4.5's layering).
    pub fn wait(self, timeout: Option<Duration>) -> Option<Packet> {
        let mut slot = self.waiter.slot.lock().unwrap();
        loop {
            if let Some(pkt) = slot.take() {
                self.registry.outstanding.lock().unwrap().remove(&self.xid);
                return Some(pkt);
            }
            match timeout {
                None => {
                    slot = self.waiter.ready.wait(slot).unwrap();
                }
                Some(d) => {
                    let (guard, result) = self.waiter.ready.wait_timeout(slot, d).unwrap();
                    slot = guard;
                    if result.timed_out() && slot.is_none() {
                        self.registry.outstanding.lock().unwrap().remove(&self.xid);
                        return None;
                    }
                }
            }
        }
    }
}

struct DeferredRegistryInner {
    outstanding: Mutex<HashMap<Xid, Arc<Waiter>>>,
}

/// Mints xids and tracks every outstanding transaction for one service.
pub struct DeferredRegistry {
    inner: Arc<DeferredRegistryInner>,
    next_xid: AtomicI32,
}

impl Default for DeferredRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredRegistry {
    pub fn new() -> Self {
        DeferredRegistry {
            inner: Arc::new(DeferredRegistryInner { outstanding: Mutex::new(HashMap::new()) }),
            next_xid: AtomicI32::new(0),
        }
    }

    /// Mint the next xid. Wraps at the 2^32 rollover window spec.md §4.5
    /// names; identical xids must never be concurrently outstanding,
    /// which holds in practice because `outstanding` bounds in-flight
    /// transaction count far below that window.
    pub fn new_xid(&self) -> Xid {
        self.next_xid.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a fresh transaction for `xid` *before* the request is
    /// actually sent (spec.md §4.5 step 3: "the Deferred is inserted
    /// into outstanding before Wait is called, so early replies are not
    /// lost"). Call [`Deferred::wait`] only after the datagram is on
    /// the wire.
    pub fn begin(&self, xid: Xid) -> Deferred {
        let waiter = Arc::new(Waiter { slot: Mutex::new(None), ready: Condvar::new() });
        self.inner.outstanding.lock().unwrap().insert(xid, waiter.clone());
        Deferred { xid, waiter, registry: self.inner.clone() }
    }

    /// Route an inbound reply packet to its waiter, if any is still
    /// outstanding. Returns `true` if a waiter was found and woken.
    /// Called from the I/O thread for every packet carrying `result` or
    /// `error` (spec.md §4.5's dispatch split).
    pub fn deliver(&self, xid: Xid, packet: Packet) -> bool {
        let outstanding = self.inner.outstanding.lock().unwrap();
        if let Some(waiter) = outstanding.get(&xid) {
            *waiter.slot.lock().unwrap() = Some(packet);
            waiter.ready.notify_all();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom_wire::Cmd;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn deliver_before_wait_is_not_lost() {
        let registry = DeferredRegistry::new();
        let xid = registry.new_xid();
        let deferred = registry.begin(xid);
        let reply = Packet::new(Cmd::Pull).with("xid", xid).with("result", 42);
        assert!(registry.deliver(xid, reply.clone()));
        let got = deferred.wait(Some(Duration::from_secs(1))).expect("reply");
        assert_eq!(got, reply);
    }

    #[test]
    fn deliver_wakes_a_concurrently_waiting_thread() {
        let registry = Arc::new(DeferredRegistry::new());
        let xid = registry.new_xid();
        let deferred = registry.begin(xid);
        let registry2 = registry.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let reply = Packet::new(Cmd::Pull).with("xid", xid).with("result", 7);
            registry2.deliver(xid, reply);
        });
        let got = deferred.wait(Some(Duration::from_secs(2))).expect("reply");
        assert_eq!(got.get("result").and_then(nom_wire::Value::as_int), Some(7));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_when_no_reply_arrives() {
        let registry = DeferredRegistry::new();
        let xid = registry.new_xid();
        let deferred = registry.begin(xid);
        assert!(deferred.wait(Some(Duration::from_millis(20))).is_none());
    }

    #[test]
    fn deliver_for_unknown_xid_is_a_noop() {
        let registry = DeferredRegistry::new();
        let reply = Packet::new(Cmd::Pull).with("xid", 999).with("result", 1);
        assert!(!registry.deliver(999, reply));
    }
}
