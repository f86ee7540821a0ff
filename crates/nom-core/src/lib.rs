//! Object model and remote-reference proxying on top of `nom-wire`
//! (spec.md §4.3-4.6, components C3-C5, C7). No networking: the
//! transport edge is the [`remote_reference::PullTransport`] trait,
//! implemented by `nom-service`.

pub mod authorizer;
pub mod capability;
pub mod client;
pub mod deferred;
pub mod error;
pub mod object_table;
pub mod remote_reference;
pub mod translator;

pub use authorizer::{Authorizer, DefaultAuthorizer};
pub use capability::{Capability, ReverseProxy};
pub use client::{Client, ClientRegistry};
pub use deferred::{Deferred, DeferredRegistry, Xid};
pub use error::{CoreError, Result};
pub use object_table::ObjectTable;
pub use remote_reference::{PullTransport, RemoteReference};
pub use translator::ObjectTranslator;
