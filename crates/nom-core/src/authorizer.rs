//! Access control hooks (spec.md §4.4, §9 "Authorization"). Grounded on
//! `service.py`'s `Authorizor`.

use nom_wire::Packet;

use crate::capability::Capability;
use crate::client::Client;

/// The two decision points spec.md names: whether a peer may complete a
/// SYNC handshake, and whether a given PULL against a given object is
/// permitted. The default implementation matches the source exactly:
/// always allow SYNC, deny any PULL whose `attr` begins with `_`.
pub trait Authorizer: Send + Sync {
    fn can_client_sync(&self, client: &Client) -> bool {
        let _ = client;
        true
    }

    fn can_client_access(&self, client: &Client, obj: &dyn Capability, pkt: &Packet) -> bool {
        let _ = (client, obj);
        match pkt.get("attr").and_then(|v| v.as_bytes()) {
            Some(attr) => !attr.starts_with(b"_"),
            None => true,
        }
    }
}

/// `service.py`'s `Authorizor()` default, used when no authorizer is
/// configured.
#[derive(Default)]
pub struct DefaultAuthorizer;

impl Authorizer for DefaultAuthorizer {}

#[cfg(test)]
mod tests {
    use super::*;
    use nom_wire::{Cmd, Value};
    use std::net::SocketAddr;

    #[test]
    fn denies_attrs_starting_with_underscore() {
        let auth = DefaultAuthorizer;
        let client = Client::new("127.0.0.1:1".parse::<SocketAddr>().unwrap());
        let pkt = Packet::new(Cmd::Pull).with("attr", Value::bytes(b"_secret".to_vec()));
        struct Noop;
        impl Capability for Noop {
            fn get_attr(&self, _: &str) -> crate::error::Result<Value> {
                Ok(Value::None)
            }
            fn set_attr(&self, _: &str, _: Value) -> crate::error::Result<()> {
                Ok(())
            }
            fn del_attr(&self, _: &str) -> crate::error::Result<()> {
                Ok(())
            }
            fn get_item(&self, _: Value) -> crate::error::Result<Value> {
                Ok(Value::None)
            }
            fn set_item(&self, _: Value, _: Value) -> crate::error::Result<()> {
                Ok(())
            }
            fn del_item(&self, _: Value) -> crate::error::Result<()> {
                Ok(())
            }
            fn len(&self) -> crate::error::Result<i32> {
                Ok(0)
            }
            fn repr(&self) -> crate::error::Result<String> {
                Ok(String::new())
            }
            fn str(&self) -> crate::error::Result<String> {
                Ok(String::new())
            }
            fn call(&self, _: Vec<Value>, _: Vec<(String, Value)>) -> crate::error::Result<Value> {
                Ok(Value::None)
            }
        }
        assert!(!auth.can_client_access(&client, &Noop, &pkt));
    }

    #[test]
    fn allows_sync_by_default() {
        let auth = DefaultAuthorizer;
        let client = Client::new("127.0.0.1:1".parse::<SocketAddr>().unwrap());
        assert!(auth.can_client_sync(&client));
    }
}
