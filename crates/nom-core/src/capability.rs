//! The object capability set (spec.md §3 GLOSSARY, "capability set"):
//! the ten operations a NOM object exposes, whether it lives locally or
//! behind a [`crate::remote_reference::RemoteReference`].
//!
//! The source (`proxy.py`) gets this for free from Python's dynamic
//! `getattr`/`setattr`/duck typing; Rust has no such reflection, so this
//! trait *is* the interface local objects implement directly, and
//! [`crate::remote_reference::RemoteReference`] implements the same
//! trait by issuing a PULL per call instead of touching memory.

use nom_wire::Value;

use crate::error::Result;

pub trait Capability: Send + Sync {
    fn get_attr(&self, attr: &str) -> Result<Value>;
    fn set_attr(&self, attr: &str, val: Value) -> Result<()>;
    fn del_attr(&self, attr: &str) -> Result<()>;
    fn get_item(&self, item: Value) -> Result<Value>;
    fn set_item(&self, item: Value, val: Value) -> Result<()>;
    fn del_item(&self, item: Value) -> Result<()>;
    fn len(&self) -> Result<i32>;
    fn repr(&self) -> Result<String>;
    fn str(&self) -> Result<String>;
    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value>;
}

/// Direct, structural pass-through onto a local [`Capability`]
/// (`proxy.ReverseProxy` in the source). In Python this adapts an
/// arbitrary object to the capability set via `getattr`/`setattr`; here
/// the wrapped object already speaks [`Capability`], so this wrapper
/// exists only so `nom-service`'s PULL dispatch has one concrete type to
/// hold regardless of whether the underlying object is reached through
/// an `Arc` freshly looked up in the object table.
pub struct ReverseProxy<'a>(pub &'a dyn Capability);

impl<'a> ReverseProxy<'a> {
    pub fn new(obj: &'a dyn Capability) -> Self {
        ReverseProxy(obj)
    }
}

impl<'a> Capability for ReverseProxy<'a> {
    fn get_attr(&self, attr: &str) -> Result<Value> {
        self.0.get_attr(attr)
    }
    fn set_attr(&self, attr: &str, val: Value) -> Result<()> {
        self.0.set_attr(attr, val)
    }
    fn del_attr(&self, attr: &str) -> Result<()> {
        self.0.del_attr(attr)
    }
    fn get_item(&self, item: Value) -> Result<Value> {
        self.0.get_item(item)
    }
    fn set_item(&self, item: Value, val: Value) -> Result<()> {
        self.0.set_item(item, val)
    }
    fn del_item(&self, item: Value) -> Result<()> {
        self.0.del_item(item)
    }
    fn len(&self) -> Result<i32> {
        self.0.len()
    }
    fn repr(&self) -> Result<String> {
        self.0.repr()
    }
    fn str(&self) -> Result<String> {
        self.0.str()
    }
    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        self.0.call(args, kwargs)
    }
}
