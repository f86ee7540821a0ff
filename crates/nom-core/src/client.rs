//! Peer bookkeeping (spec.md §3 GLOSSARY "Client"). Grounded on
//! `service.py`'s `Client`/`Service.GetClient`/`Service.clients`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;

/// A known peer address. Created on first observation (an inbound
/// packet from an unseen address, or an explicit `Connect`), retained
/// until an explicit DESYNC. Authorizers may stash their own
/// per-client state by wrapping this type; spec.md leaves the
/// attribute set open ("authorizer-owned attributes").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub addr: SocketAddr,
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Client { addr }
    }
}

/// `addr -> Client`, created lazily and dropped on DESYNC (spec.md §3's
/// Client lifecycle rule).
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<SocketAddr, Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry::default()
    }

    /// Look up (or lazily create) the client for `addr`. Mirrors
    /// `Service.GetClient`: any inbound packet from an unseen address is
    /// silently auto-promoted to a client (spec.md §7's "unknown sender
    /// addresses are silently auto-promoted").
    pub fn get_or_insert(&self, addr: SocketAddr) -> Client {
        if let Some(cli) = self.clients.read().unwrap().get(&addr) {
            return cli.clone();
        }
        let cli = Client::new(addr);
        self.clients.write().unwrap().insert(addr, cli.clone());
        cli
    }

    pub fn get(&self, addr: SocketAddr) -> Option<Client> {
        self.clients.read().unwrap().get(&addr).cloned()
    }

    pub fn forget(&self, addr: SocketAddr) {
        self.clients.write().unwrap().remove(&addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_insert_is_idempotent() {
        let registry = ClientRegistry::new();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let a = registry.get_or_insert(addr);
        let b = registry.get_or_insert(addr);
        assert_eq!(a, b);
    }

    #[test]
    fn forget_removes_the_client() {
        let registry = ClientRegistry::new();
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        registry.get_or_insert(addr);
        registry.forget(addr);
        assert!(registry.get(addr).is_none());
    }
}
