//! Service configuration (spec.md §6 "Configuration knobs").

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use nom_core::{Authorizer, DefaultAuthorizer};
use nom_wire::TextErrorMode;

/// Built programmatically by library users and by the demo binaries'
/// `main` after parsing `structopt` args; spec.md names no on-disk
/// config file format, so none is invented here.
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub authorizer: Arc<dyn Authorizer>,
    /// `None` blocks forever, matching the source's `Deferred.TIMEOUT=None` default.
    pub deferred_timeout: Option<Duration>,
    pub text_error_mode: TextErrorMode,
    /// Outbound TEXT codec name (spec.md §6's `codec.preferred_encoding`).
    pub preferred_encoding: String,
    pub bufsize: usize,
}

impl ServiceConfig {
    /// spec.md §4.4's default bind address, `("", 12074)`.
    pub fn default_bind_addr() -> SocketAddr {
        "0.0.0.0:12074"
            .to_socket_addrs()
            .expect("default bind address is well-formed")
            .next()
            .expect("default bind address resolves")
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind_addr: Self::default_bind_addr(),
            authorizer: Arc::new(DefaultAuthorizer),
            deferred_timeout: None,
            text_error_mode: TextErrorMode::Replace,
            preferred_encoding: "UTF-8".to_owned(),
            // `Service.BUFSIZE` in the source.
            bufsize: 65536,
        }
    }
}
