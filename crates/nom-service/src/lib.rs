//! The UDP transport and dispatch loop (spec.md §4.4-4.5, component C6).

pub mod config;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use service::Service;

#[cfg(test)]
mod tests {
    use super::*;
    use nom_core::{Capability, CoreError};
    use nom_wire::Value;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Counter(AtomicI32);

    impl Capability for Counter {
        fn get_attr(&self, attr: &str) -> nom_core::Result<Value> {
            match attr {
                "value" => Ok(Value::Int(self.0.load(Ordering::SeqCst))),
                other => Err(CoreError::UnknownPull(other.to_owned())),
            }
        }
        fn set_attr(&self, attr: &str, val: Value) -> nom_core::Result<()> {
            match (attr, val.as_int()) {
                ("value", Some(v)) => {
                    self.0.store(v, Ordering::SeqCst);
                    Ok(())
                }
                _ => Err(CoreError::UnknownPull(attr.to_owned())),
            }
        }
        fn del_attr(&self, _attr: &str) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn get_item(&self, _item: Value) -> nom_core::Result<Value> {
            Err(CoreError::AccessDenied)
        }
        fn set_item(&self, _item: Value, _val: Value) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn del_item(&self, _item: Value) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn len(&self) -> nom_core::Result<i32> {
            Ok(1)
        }
        fn repr(&self) -> nom_core::Result<String> {
            Ok(format!("Counter({})", self.0.load(Ordering::SeqCst)))
        }
        fn str(&self) -> nom_core::Result<String> {
            self.repr()
        }
        fn call(&self, args: Vec<Value>, _kwargs: Vec<(String, Value)>) -> nom_core::Result<Value> {
            let step = args.first().and_then(Value::as_int).unwrap_or(1);
            Ok(Value::Int(self.0.fetch_add(step, Ordering::SeqCst)))
        }
    }

    fn loopback_config() -> ServiceConfig {
        ServiceConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            deferred_timeout: Some(Duration::from_secs(2)),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn resolve_and_get_attr_round_trip_over_loopback_udp() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.register(Arc::new(Counter(AtomicI32::new(42))), "counter");
        host.clone().spawn();

        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let resolved = client.resolve(host.local_addr(), "counter").expect("resolve");
        let (oid, owner) = match resolved {
            Value::Handle { oid, owner } => (oid, owner),
            other => panic!("expected handle, got {other:?}"),
        };
        assert_eq!(owner, host.local_addr());

        let value = client.pull(owner, &oid, "GetAttr", vec![("attr".into(), Value::bytes(b"value".to_vec()))]).expect("pull");
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn list_reports_every_registered_name() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.register(Arc::new(Counter(AtomicI32::new(0))), "a");
        host.register(Arc::new(Counter(AtomicI32::new(0))), "b");
        host.clone().spawn();

        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let mut names: Vec<String> = client
            .list(host.local_addr())
            .expect("list")
            .into_iter()
            .filter_map(|v| v.as_text().map(str::to_owned))
            .collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn resolve_unknown_name_surfaces_as_a_remote_error() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.clone().spawn();
        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let err = client.resolve(host.local_addr(), "missing").unwrap_err();
        match err {
            ServiceError::Core(CoreError::Remote { name, .. }) => assert_eq!(name, "name-error"),
            other => panic!("expected a remote name-error, got {other:?}"),
        }
    }

    #[test]
    fn access_to_underscore_attrs_is_denied_by_default() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.register(Arc::new(Counter(AtomicI32::new(1))), "counter");
        host.clone().spawn();
        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let Value::Handle { oid, owner } = client.resolve(host.local_addr(), "counter").unwrap() else {
            panic!("expected handle")
        };
        let err = client
            .pull(owner, &oid, "GetAttr", vec![("attr".into(), Value::bytes(b"_secret".to_vec()))])
            .unwrap_err();
        match err {
            ServiceError::Core(CoreError::Remote { name, .. }) => assert_eq!(name, "runtime-error"),
            other => panic!("expected a remote runtime-error, got {other:?}"),
        }
    }

    /// A local object whose `GetAttr("boom")` raises a user-level error —
    /// spec.md §8 scenario 4: the remote exception's name and args must
    /// survive the round trip verbatim.
    struct Raiser;
    impl Capability for Raiser {
        fn get_attr(&self, attr: &str) -> nom_core::Result<Value> {
            match attr {
                "boom" => Err(CoreError::Remote { name: "ValueError".into(), args: vec![Value::text("nope")] }),
                other => Err(CoreError::UnknownPull(other.to_owned())),
            }
        }
        fn set_attr(&self, _: &str, _: Value) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn del_attr(&self, _: &str) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn get_item(&self, _: Value) -> nom_core::Result<Value> {
            Err(CoreError::AccessDenied)
        }
        fn set_item(&self, _: Value, _: Value) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn del_item(&self, _: Value) -> nom_core::Result<()> {
            Err(CoreError::AccessDenied)
        }
        fn len(&self) -> nom_core::Result<i32> {
            Ok(0)
        }
        fn repr(&self) -> nom_core::Result<String> {
            Ok("Raiser".into())
        }
        fn str(&self) -> nom_core::Result<String> {
            Ok("Raiser".into())
        }
        fn call(&self, _: Vec<Value>, _: Vec<(String, Value)>) -> nom_core::Result<Value> {
            Err(CoreError::AccessDenied)
        }
    }

    #[test]
    fn remote_exception_carries_name_and_args_verbatim() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.register(Arc::new(Raiser), "raiser");
        host.clone().spawn();
        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let Value::Handle { oid, owner } = client.resolve(host.local_addr(), "raiser").unwrap() else {
            panic!("expected handle")
        };
        let err = client
            .pull(owner, &oid, "GetAttr", vec![("attr".into(), Value::bytes(b"boom".to_vec()))])
            .unwrap_err();
        match err {
            ServiceError::Core(CoreError::Remote { name, args }) => {
                assert_eq!(name, "ValueError");
                assert_eq!(args, vec![Value::text("nope")]);
            }
            other => panic!("expected a remote ValueError, got {other:?}"),
        }
    }

    #[test]
    fn desync_drops_the_client_and_a_later_packet_recreates_it() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.clone().spawn();
        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        client.resolve(host.local_addr(), "missing").ok();
        assert!(host.known_peer(client.local_addr()));

        client.disconnect(host.local_addr()).expect("send desync");
        // give the host's I/O thread a moment to process the DESYNC.
        std::thread::sleep(Duration::from_millis(100));
        assert!(!host.known_peer(client.local_addr()));

        client.resolve(host.local_addr(), "missing").ok();
        std::thread::sleep(Duration::from_millis(100));
        assert!(host.known_peer(client.local_addr()));
    }

    #[test]
    fn handle_passed_as_a_call_argument_round_trips_to_the_same_local_object() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.register(Arc::new(Counter(AtomicI32::new(9))), "counter");
        host.register(Arc::new(echo::Echo), "echo");
        host.clone().spawn();
        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let Value::Handle { oid: counter_oid, owner } = client.resolve(host.local_addr(), "counter").unwrap() else {
            panic!("expected handle")
        };
        let Value::Handle { oid: echo_oid, .. } = client.resolve(host.local_addr(), "echo").unwrap() else {
            panic!("expected handle")
        };

        let handle_arg = Value::Handle { oid: counter_oid.clone(), owner };
        let result = client
            .pull(
                owner,
                &echo_oid,
                "Call",
                vec![
                    ("args".into(), Value::seq(nom_wire::SeqKind::Immutable, vec![handle_arg.clone()])),
                    ("kwargs".into(), Value::Map(Vec::new())),
                ],
            )
            .expect("call");
        assert_eq!(result, handle_arg);
    }

    #[test]
    fn concurrent_outbound_pulls_each_get_their_own_reply() {
        let host = Service::bind(loopback_config()).expect("bind host");
        host.register(Arc::new(Counter(AtomicI32::new(0))), "counter");
        host.clone().spawn();
        let client = Service::bind(loopback_config()).expect("bind client");
        client.clone().spawn();

        let Value::Handle { oid, owner } = client.resolve(host.local_addr(), "counter").unwrap() else {
            panic!("expected handle")
        };

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let client = client.clone();
                let oid = oid.clone();
                std::thread::spawn(move || {
                    client
                        .pull(owner, &oid, "Call", vec![("args".into(), Value::seq(nom_wire::SeqKind::Immutable, vec![Value::Int(1)]))])
                        .map(|v| (i, v))
                })
            })
            .collect();

        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.join().unwrap().expect("pull"));
        }
        assert_eq!(seen.len(), 16);

        let final_value = client
            .pull(owner, &oid, "GetAttr", vec![("attr".into(), Value::bytes(b"value".to_vec()))])
            .unwrap();
        assert_eq!(final_value, Value::Int(16));
    }

    mod echo {
        use nom_core::{Capability, CoreError, Result};
        use nom_wire::Value;

        pub struct Echo;
        impl Capability for Echo {
            fn get_attr(&self, attr: &str) -> Result<Value> {
                Err(CoreError::UnknownPull(attr.to_owned()))
            }
            fn set_attr(&self, attr: &str, _val: Value) -> Result<()> {
                Err(CoreError::UnknownPull(attr.to_owned()))
            }
            fn del_attr(&self, attr: &str) -> Result<()> {
                Err(CoreError::UnknownPull(attr.to_owned()))
            }
            fn get_item(&self, _item: Value) -> Result<Value> {
                Err(CoreError::AccessDenied)
            }
            fn set_item(&self, _item: Value, _val: Value) -> Result<()> {
                Err(CoreError::AccessDenied)
            }
            fn del_item(&self, _item: Value) -> Result<()> {
                Err(CoreError::AccessDenied)
            }
            fn len(&self) -> Result<i32> {
                Ok(0)
            }
            fn repr(&self) -> Result<String> {
                Ok("Echo".into())
            }
            fn str(&self) -> Result<String> {
                Ok("Echo".into())
            }
            fn call(&self, mut args: Vec<Value>, _kwargs: Vec<(String, Value)>) -> Result<Value> {
                Ok(if args.is_empty() { Value::None } else { args.swap_remove(0) })
            }
        }
    }
}
