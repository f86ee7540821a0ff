//! Sample objects registered by the demo host. These stand in for
//! spec.md §8 scenario 1's "S exposes x = 42" and scenario 6's
//! echo-style object — ordinary application state wired up to the
//! [`Capability`] set a remote peer can drive.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use nom_core::{Capability, CoreError, Result};
use nom_wire::Value;

/// A shared counter. `GetAttr("value")` reads it; `Call(step)`
/// increments by `step` (default 1) and returns the pre-increment value.
pub struct Counter(AtomicI32);

impl Counter {
    pub fn new(initial: i32) -> Self {
        Counter(AtomicI32::new(initial))
    }
}

impl Capability for Counter {
    fn get_attr(&self, attr: &str) -> Result<Value> {
        match attr {
            "value" => Ok(Value::Int(self.0.load(Ordering::SeqCst))),
            other => Err(CoreError::UnknownPull(format!("no such attribute {other:?}"))),
        }
    }

    fn set_attr(&self, attr: &str, val: Value) -> Result<()> {
        match (attr, val.as_int()) {
            ("value", Some(v)) => {
                self.0.store(v, Ordering::SeqCst);
                Ok(())
            }
            ("value", None) => Err(CoreError::UnknownPull("value must be an int".into())),
            (other, _) => Err(CoreError::UnknownPull(format!("no such attribute {other:?}"))),
        }
    }

    fn del_attr(&self, attr: &str) -> Result<()> {
        Err(CoreError::UnknownPull(format!("cannot delete attribute {attr:?}")))
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
        Ok(1)
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("Counter({})", self.0.load(Ordering::SeqCst)))
    }

    fn str(&self) -> Result<String> {
        Ok(self.0.load(Ordering::SeqCst).to_string())
    }

    fn call(&self, args: Vec<Value>, _kwargs: Vec<(String, Value)>) -> Result<Value> {
        let step = args.first().and_then(Value::as_int).unwrap_or(1);
        Ok(Value::Int(self.0.fetch_add(step, Ordering::SeqCst)))
    }
}

/// A shared piece of text, mutable via `SetAttr("text", ...)`.
pub struct Note(Mutex<String>);

impl Note {
    pub fn new(initial: impl Into<String>) -> Self {
        Note(Mutex::new(initial.into()))
    }
}

impl Capability for Note {
    fn get_attr(&self, attr: &str) -> Result<Value> {
        match attr {
            "text" => Ok(Value::text(self.0.lock().unwrap().clone())),
            other => Err(CoreError::UnknownPull(format!("no such attribute {other:?}"))),
        }
    }

    fn set_attr(&self, attr: &str, val: Value) -> Result<()> {
        match (attr, val.as_text()) {
            ("text", Some(s)) => {
                *self.0.lock().unwrap() = s.to_owned();
                Ok(())
            }
            ("text", None) => Err(CoreError::UnknownPull("text must be a string".into())),
            (other, _) => Err(CoreError::UnknownPull(format!("no such attribute {other:?}"))),
        }
    }

    fn del_attr(&self, attr: &str) -> Result<()> {
        Err(CoreError::UnknownPull(format!("cannot delete attribute {attr:?}")))
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
        Ok(self.0.lock().unwrap().len() as i32)
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("Note({:?})", self.0.lock().unwrap()))
    }

    fn str(&self) -> Result<String> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn call(&self, _args: Vec<Value>, _kwargs: Vec<(String, Value)>) -> Result<Value> {
        Err(CoreError::UnknownPull("Note is not callable".into()))
    }
}

/// Returns its first argument unchanged. Exists to exercise spec.md §8
/// scenario 6: calling `echo` with a handle argument round-trips the
/// handle's bytes verbatim, so a peer that calls `p.echo(p)` on its own
/// object gets back the identical `(oid, owner)` pair it sent — the
/// object table on the receiving side resolves that pair to the exact
/// same live object, not a new proxy.
pub struct Echo;

impl Capability for Echo {
    fn get_attr(&self, attr: &str) -> Result<Value> {
        Err(CoreError::UnknownPull(format!("no such attribute {attr:?}")))
    }

    fn set_attr(&self, attr: &str, _val: Value) -> Result<()> {
        Err(CoreError::UnknownPull(format!("no such attribute {attr:?}")))
    }

    fn del_attr(&self, attr: &str) -> Result<()> {
        Err(CoreError::UnknownPull(format!("no such attribute {attr:?}")))
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
