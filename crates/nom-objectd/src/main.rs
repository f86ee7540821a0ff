//! Reference NOM host. Registers a counter, a note, and an echo object
//! and serves them over UDP until killed — spec.md §8 scenario 1's
//! "S exposes x = 42" and scenario 6's handle round-trip, wired up as a
//! long-running daemon the way the teacher's `mirror`/`proxy` binaries
//! run a long-lived socket loop under `main`.

mod objects;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

use nom_core::DefaultAuthorizer;
use nom_service::{Service, ServiceConfig};

use objects::{Counter, Echo, Note};

#[derive(StructOpt)]
#[structopt(about = "Reference NOM object host")]
struct Opts {
    /// Address to bind the UDP service on.
    #[structopt(long, default_value = "0.0.0.0:12074")]
    bind: SocketAddr,

    /// Initial value for the `counter` object.
    #[structopt(long, default_value = "0")]
    counter_initial: i32,

    /// Initial text for the `note` object.
    #[structopt(long, default_value = "")]
    note_initial: String,

    /// Seconds a deferred outbound request waits before timing out.
    /// Only relevant if this host itself issues outbound pulls; unset
    /// blocks forever, matching spec.md §6's default.
    #[structopt(long)]
    deferred_timeout: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let opts = Opts::from_args();

    let config = ServiceConfig {
        bind_addr: opts.bind,
        authorizer: Arc::new(DefaultAuthorizer),
        deferred_timeout: opts.deferred_timeout.map(Duration::from_secs),
        ..ServiceConfig::default()
    };

    let service = match Service::bind(config) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to bind service");
            std::process::exit(1);
        }
    };

    service.register(Arc::new(Counter::new(opts.counter_initial)), "counter");
    service.register(Arc::new(Note::new(opts.note_initial)), "note");
    service.register(Arc::new(Echo), "echo");

    tracing::info!(addr = %service.local_addr(), "nom-objectd listening");

    service.serve_forever();
}
