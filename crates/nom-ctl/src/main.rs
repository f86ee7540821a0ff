//! Short-lived CLI client against a running `nom-objectd` (or any NOM
//! service): `resolve`, `list`, `get`, `set`, `call`. Grounded on the
//! teacher's `cpm`'s `Command`/`structopt` shape (`crates/cpm/src/main.rs`)
//! — a one-shot process that opens a connection, issues one transaction,
//! prints the result, and exits.

use std::net::SocketAddr;
use std::time::Duration;

use displaydoc::Display;
use structopt::StructOpt;
use thiserror::Error;

use nom_service::{Service, ServiceConfig, ServiceError};
use nom_wire::{LongInt, Value};

#[derive(StructOpt)]
#[structopt(about = "CLI client for a NOM object host")]
struct Opts {
    /// Address of the nom-objectd (or other NOM service) to talk to.
    #[structopt(long)]
    peer: SocketAddr,

    /// Seconds to wait for a reply before giving up.
    #[structopt(long, default_value = "5")]
    timeout: u64,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Resolve a published name to an object handle.
    Resolve {
        /// Published name, e.g. "counter".
        name: String,
    },
    /// List every name published by the peer.
    List,
    /// Resolve `name` then fetch one of its attributes.
    Get {
        name: String,
        attr: String,
    },
    /// Resolve `name` then set one of its attributes.
    Set {
        name: String,
        attr: String,
        /// Value to set; parsed as an integer if possible, else text.
        value: String,
    },
    /// Resolve `name` then call it with the given arguments.
    Call {
        name: String,
        /// Arguments; each parsed as an integer if possible, else text.
        args: Vec<String>,
    },
}

#[derive(Error, Display, Debug)]
enum CtlError {
    /// failed to bind the local client socket: {0}
    Bind(#[source] std::io::Error),
    /// {0}
    Service(#[from] ServiceError),
    /// {0:?} did not resolve to an object handle
    NotAHandle(Value),
}

fn parse_value(s: &str) -> Value {
    match s.parse::<i32>() {
        Ok(v) => Value::Int(v),
        Err(_) => Value::text(s),
    }
}

/// A terse, human-readable rendering of a reply value. Not a wire
/// format: just enough to eyeball a result at a terminal.
fn display_value(v: &Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Long(l) => l.as_decimal().to_owned(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => format!("{b:?}"),
        Value::None => "None".to_owned(),
        Value::Seq(_, items) => {
            let parts: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", display_value(k), display_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Handle { oid, owner } => format!("<handle oid={} owner={}>", oid.as_decimal(), owner),
        Value::Error { name, args } => {
            let parts: Vec<String> = args.iter().map(display_value).collect();
            format!("{}({})", name, parts.join(", "))
        }
        other => format!("{other:?}"),
    }
}

fn resolve_handle(service: &Service, peer: SocketAddr, name: &str) -> Result<(LongInt, SocketAddr), CtlError> {
    match service.resolve(peer, name)? {
        Value::Handle { oid, owner } => Ok((oid, owner)),
        other => Err(CtlError::NotAHandle(other)),
    }
}

fn run(opts: Opts) -> Result<(), CtlError> {
    let config = ServiceConfig {
        bind_addr: "0.0.0.0:0".parse().unwrap(),
        deferred_timeout: Some(Duration::from_secs(opts.timeout)),
        ..ServiceConfig::default()
    };
    let service = Service::bind(config).map_err(|e| match e {
        ServiceError::Io(io) => CtlError::Bind(io),
        other => CtlError::Service(other),
    })?;
    service.clone().spawn();

    match opts.command {
        Command::Resolve { name } => {
            let (oid, owner) = resolve_handle(&service, opts.peer, &name)?;
            println!("{name} -> oid={} owner={}", oid.as_decimal(), owner);
        }
        Command::List => {
            for entry in service.list(opts.peer)? {
                println!("{}", display_value(&entry));
            }
        }
        Command::Get { name, attr } => {
            let (oid, owner) = resolve_handle(&service, opts.peer, &name)?;
            let val = service.pull(owner, &oid, "GetAttr", vec![("attr".into(), Value::bytes(attr.into_bytes()))])?;
            println!("{}", display_value(&val));
        }
        Command::Set { name, attr, value } => {
            let (oid, owner) = resolve_handle(&service, opts.peer, &name)?;
            service.pull(
                owner,
                &oid,
                "SetAttr",
                vec![("attr".into(), Value::bytes(attr.into_bytes())), ("val".into(), parse_value(&value))],
            )?;
            println!("ok");
        }
        Command::Call { name, args } => {
            let (oid, owner) = resolve_handle(&service, opts.peer, &name)?;
            let args: Vec<Value> = args.iter().map(|s| parse_value(s)).collect();
            let val = service.pull(
                owner,
                &oid,
                "Call",
                vec![
                    ("args".into(), Value::seq(nom_wire::SeqKind::Immutable, args)),
                    ("kwargs".into(), Value::Map(Vec::new())),
                ],
            )?;
            println!("{}", display_value(&val));
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    let opts = Opts::from_args();
    if let Err(err) = run(opts) {
        eprintln!("nom-ctl: {err}");
        std::process::exit(1);
    }
}
