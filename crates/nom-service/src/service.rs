//! The UDP service (spec.md §4.4, component C6). Grounded on
//! `service.py`'s `Service`: a socket, a dispatch loop, and the command
//! table (`cmd_*`/`pull_*`). The threading model (spec.md §5) is carried
//! from the teacher's other half — `common::SyncTcpEndPoint`'s blocking
//! `std::net::TcpStream` read/write pair — generalized from one
//! outstanding transaction to many, correlated by `xid` through
//! [`nom_core::DeferredRegistry`] instead of the teacher's single-slot
//! `transact()`.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Weak};
use std::thread;

use tracing::{debug, error, trace, warn};

use nom_core::{
    Authorizer, Capability, Client, ClientRegistry, CoreError, DeferredRegistry, ObjectTable,
    ObjectTranslator, PullTransport, ReverseProxy,
};
use nom_wire::{Cmd, Codec, LongInt, Packet, Value};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// A running NOM service: one UDP socket, the object table, the
/// xid-correlated deferred registry, and the known-peer map. Construct
/// with [`Service::bind`], then [`Service::spawn`] the dispatch loop on
/// a background thread (the source's `Service` is itself a daemon
/// `threading.Thread`; here the loop is a plain function run on a
/// thread the caller owns the `JoinHandle` for).
pub struct Service {
    socket: UdpSocket,
    addr: SocketAddr,
    codec: Codec,
    table: Arc<ObjectTable>,
    clients: ClientRegistry,
    deferred: DeferredRegistry,
    authorizer: Arc<dyn Authorizer>,
    translator: ObjectTranslator,
    deferred_timeout: Option<std::time::Duration>,
    bufsize: usize,
}

/// Routes `nom-core`'s `PullTransport` calls back through the owning
/// service without creating an `Arc` reference cycle (the service owns
/// an `ObjectTranslator` which owns this transport).
struct WeakTransport(Weak<Service>);

impl PullTransport for WeakTransport {
    fn pull(&self, peer: SocketAddr, oid: &LongInt, op: &str, attrs: Vec<(String, Value)>) -> nom_core::Result<Value> {
        let service = self.0.upgrade().ok_or(CoreError::AccessDenied)?;
        service.pull(peer, oid, op, attrs).map_err(service_error_to_core)
    }
}

fn service_error_to_core(err: ServiceError) -> CoreError {
    match err {
        ServiceError::Core(e) => e,
        ServiceError::Timeout => CoreError::NotReady,
        other => CoreError::Remote { name: "service-error".into(), args: vec![Value::text(other.to_string())] },
    }
}

fn core_error_to_reply(err: CoreError) -> Value {
    let (name, args): (&str, Vec<Value>) = match err {
        CoreError::Remote { name, args } => return Value::Error { name, args },
        CoreError::BadOid(oid) => ("value-error", vec![Value::text(format!("Bad OID in serialized data: {oid}"))]),
        CoreError::NoSuchName(_) => ("name-error", vec![Value::text("No such name")]),
        CoreError::AccessDenied => ("runtime-error", vec![Value::text("Access denied")]),
        CoreError::NotReady => ("runtime-error", vec![Value::text("Value not available yet")]),
        CoreError::UnknownCommand(_) => ("name-error", vec![Value::text("Unknown command")]),
        CoreError::UnknownPull(_) => ("name-error", vec![Value::text("Unknown pull")]),
        CoreError::Wire(e) => ("value-error", vec![Value::text(e.to_string())]),
    };
    Value::Error { name: name.to_owned(), args }
}

impl Service {
    pub fn bind(config: ServiceConfig) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(config.bind_addr)?;
        let addr = socket.local_addr()?;
        let table = Arc::new(ObjectTable::new());
        let mut codec = Codec::new();
        codec.text_error_mode = config.text_error_mode;
        codec.preferred_encoding = config.preferred_encoding;
        let table_for_translator = table.clone();
        let deferred_timeout = config.deferred_timeout;
        let bufsize = config.bufsize;
        Ok(Arc::new_cyclic(move |weak: &Weak<Service>| {
            let transport: Arc<dyn PullTransport> = Arc::new(WeakTransport(weak.clone()));
            Service {
                socket,
                addr,
                codec,
                table,
                clients: ClientRegistry::new(),
                deferred: DeferredRegistry::new(),
                authorizer: config.authorizer,
                translator: ObjectTranslator::new(addr, table_for_translator, transport),
                deferred_timeout,
                bufsize,
            }
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn table(&self) -> &Arc<ObjectTable> {
        &self.table
    }

    pub fn translator(&self) -> &ObjectTranslator {
        &self.translator
    }

    /// Register `obj` under `name`, publishing it for `RESOLVE` and `LIST`.
    pub fn register(&self, obj: Arc<dyn Capability>, name: impl Into<String>) -> i64 {
        self.table.register(obj, name)
    }

    pub fn unregister(&self, name: &str) {
        self.table.unregister(name)
    }

    /// Whether `addr` currently has a live [`Client`] entry. Spec.md §8's
    /// teardown scenario: absent right after DESYNC, present again the
    /// moment a further packet arrives from that address.
    pub fn known_peer(&self, addr: SocketAddr) -> bool {
        self.clients.get(addr).is_some()
    }

    /// Run the dispatch loop on the calling thread until the socket
    /// errors unrecoverably. Spec.md §5: "One I/O thread per service
    /// blocks in recvfrom."
    pub fn serve_forever(self: Arc<Self>) {
        let mut buf = vec![0u8; self.bufsize];
        loop {
            let (n, src) = match self.socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "service socket recv failed, stopping dispatch loop");
                    return;
                }
            };
            let cli = self.clients.get_or_insert(src);
            let pkt = match Packet::decode(&self.codec, &buf[..n]) {
                Ok(pkt) => pkt,
                Err(e) => {
                    warn!(error = %e, peer = %src, "dropping malformed packet");
                    continue;
                }
            };
            trace!(?pkt, peer = %src, "inbound packet");
            if pkt.has("result") || pkt.has("error") {
                if let Some(xid) = pkt.xid() {
                    self.deferred.deliver(xid, pkt);
                }
                continue;
            }
            self.dispatch(pkt, cli);
        }
    }

    /// Spawn [`Self::serve_forever`] on its own thread, matching the
    /// source's daemon-thread `Service`.
    pub fn spawn(self: &Arc<Self>) -> thread::JoinHandle<()> {
        let service = self.clone();
        thread::Builder::new()
            .name("nom-service-io".into())
            .spawn(move || service.serve_forever())
            .expect("failed to spawn service I/O thread")
    }

    fn dispatch(self: &Arc<Self>, pkt: Packet, cli: Client) {
        match pkt.cmd {
            Cmd::Sync => self.cmd_sync(&pkt, &cli),
            Cmd::Desync => self.cmd_desync(&cli),
            Cmd::Pull => {
                // spec.md §5: dispatched on a fresh worker thread so a
                // reentrant or blocking user operation cannot deadlock
                // the I/O thread.
                let service = self.clone();
                thread::spawn(move || service.cmd_pull(pkt, cli));
            }
            Cmd::Resolve => self.cmd_resolve(&pkt, &cli),
            Cmd::List => self.cmd_list(&pkt, &cli),
            Cmd::Push => debug!("PUSH received; protocol slot reserved, no-op"),
            Cmd::Keepalive | Cmd::Unknown(_) => self.cmd_unknown(&pkt, &cli),
        }
    }

    fn reply(&self, cmd: Cmd, xid: Option<i32>, body: impl FnOnce(Packet) -> Packet, cli: &Client) {
        let mut pkt = Packet::new(cmd);
        if let Some(xid) = xid {
            pkt = pkt.with("xid", xid);
        }
        let pkt = body(pkt);
        match pkt.encode(&self.codec) {
            Ok(bytes) => {
                if let Err(e) = self.socket.send_to(&bytes, cli.addr) {
                    error!(error = %e, peer = %cli.addr, "failed to send reply");
                }
            }
            Err(e) => error!(error = %e, "failed to encode reply packet"),
        }
    }

    fn cmd_sync(&self, pkt: &Packet, cli: &Client) {
        let ok = self.authorizer.can_client_sync(cli);
        self.reply(Cmd::Sync, pkt.xid(), |p| p.with("result", ok), cli);
        if !ok {
            self.clients.forget(cli.addr);
        }
    }

    fn cmd_desync(&self, cli: &Client) {
        self.clients.forget(cli.addr);
    }

    fn cmd_pull(self: Arc<Self>, pkt: Packet, cli: Client) {
        let xid = pkt.xid();
        let result = self.handle_pull(&pkt, &cli);
        self.reply(
            Cmd::Pull,
            xid,
            |p| match result {
                Ok(v) => p.with("result", v),
                Err(e) => p.with("error", core_error_to_reply(e)),
            },
            &cli,
        );
    }

    fn handle_pull(&self, pkt: &Packet, cli: &Client) -> nom_core::Result<Value> {
        let oid = match pkt.get("oid") {
            Some(Value::Long(l)) => l.clone(),
            _ => return Err(CoreError::BadOid("missing".into())),
        };
        let obj = self.table.lookup_long(&oid)?;
        if !self.authorizer.can_client_access(cli, obj.as_ref(), pkt) {
            return Err(CoreError::AccessDenied);
        }
        let op = pkt
            .get("op")
            .and_then(Value::as_bytes)
            .and_then(|b| std::str::from_utf8(b).ok())
            .unwrap_or("");
        let proxy = ReverseProxy::new(obj.as_ref());
        dispatch_pull(&proxy, op, pkt)
    }

    fn cmd_resolve(&self, pkt: &Packet, cli: &Client) {
        let name = pkt.get("name").and_then(Value::as_bytes).and_then(|b| std::str::from_utf8(b).ok());
        let result = match name {
            Some(name) => self.table.resolve(name).map(|(oid, _)| self.translator.encode_existing(oid)),
            None => Err(CoreError::NoSuchName(String::new())),
        };
        self.reply(
            Cmd::Resolve,
            pkt.xid(),
            |p| match result {
                Ok(v) => p.with("result", v),
                Err(e) => p.with("error", core_error_to_reply(e)),
            },
            cli,
        );
    }

    fn cmd_list(&self, pkt: &Packet, cli: &Client) {
        let names = self.table.list();
        let result = Value::seq(
            nom_wire::SeqKind::Unique,
            names.into_iter().map(Value::text).collect(),
        );
        self.reply(Cmd::List, pkt.xid(), |p| p.with("result", result), cli);
    }

    fn cmd_unknown(&self, pkt: &Packet, cli: &Client) {
        warn!(cmd = ?pkt.cmd, "bad packet command");
        self.reply(
            pkt.cmd,
            pkt.xid(),
            |p| p.with("error", core_error_to_reply(CoreError::UnknownCommand(pkt.cmd.as_byte()))),
            cli,
        );
    }

    /// Issue an outbound PULL and block until the reply arrives or the
    /// configured deferred timeout elapses. Used both by
    /// [`WeakTransport`] (on behalf of `RemoteReference`) and directly
    /// by callers that already know an `oid`.
    pub fn pull(&self, peer: SocketAddr, oid: &LongInt, op: &str, attrs: Vec<(String, Value)>) -> Result<Value> {
        let mut pkt = Packet::new(Cmd::Pull)
            .with("op", Value::bytes(op.as_bytes().to_vec()))
            .with("oid", Value::Long(oid.clone()));
        for (k, v) in attrs {
            pkt.attrs.insert(k, v);
        }
        let reply = self.transact(peer, pkt)?;
        extract_result(reply)
    }

    /// `Service.Connect`: perform a SYNC handshake with `peer`,
    /// registering it as a known client on success.
    pub fn connect(&self, peer: SocketAddr) -> Result<Client> {
        let cli = self.clients.get_or_insert(peer);
        let reply = self.transact(peer, Packet::new(Cmd::Sync))?;
        match reply.get("result") {
            Some(Value::Bool(true)) => Ok(cli),
            _ => {
                self.clients.forget(peer);
                Err(ServiceError::Core(CoreError::AccessDenied))
            }
        }
    }

    /// `Service.Disconnect`: fire-and-forget DESYNC, no reply expected.
    pub fn disconnect(&self, peer: SocketAddr) -> Result<()> {
        let bytes = Packet::new(Cmd::Desync).encode(&self.codec)?;
        self.socket.send_to(&bytes, peer)?;
        self.clients.forget(peer);
        Ok(())
    }

    pub fn resolve(&self, peer: SocketAddr, name: &str) -> Result<Value> {
        let pkt = Packet::new(Cmd::Resolve).with("name", Value::bytes(name.as_bytes().to_vec()));
        let reply = self.transact(peer, pkt)?;
        extract_result(reply)
    }

    pub fn list(&self, peer: SocketAddr) -> Result<Vec<Value>> {
        let reply = self.transact(peer, Packet::new(Cmd::List))?;
        match extract_result(reply)? {
            Value::Seq(_, items) => Ok(items),
            other => Ok(vec![other]),
        }
    }

    /// Mint an xid, register a waiter *before* sending (spec.md §4.5
    /// step 3's ordering requirement), send, then block for the reply.
    fn transact(&self, peer: SocketAddr, pkt: Packet) -> Result<Packet> {
        let xid = self.deferred.new_xid();
        let pkt = pkt.with("xid", xid);
        let deferred = self.deferred.begin(xid);
        let bytes = pkt.encode(&self.codec)?;
        self.socket.send_to(&bytes, peer)?;
        deferred.wait(self.deferred_timeout).ok_or(ServiceError::Timeout)
    }
}

fn extract_result(reply: Packet) -> Result<Value> {
    if let Some(Value::Error { name, args }) = reply.get("error").cloned() {
        return Err(ServiceError::Core(CoreError::Remote { name, args }));
    }
    reply.get("result").cloned().ok_or(ServiceError::Core(CoreError::NotReady))
}

fn dispatch_pull(obj: &ReverseProxy<'_>, op: &str, pkt: &Packet) -> nom_core::Result<Value> {
    match op {
        "GetAttr" => obj.get_attr(text_attr(pkt, "attr")?),
        "SetAttr" => {
            obj.set_attr(text_attr(pkt, "attr")?, pkt.get("val").cloned().unwrap_or(Value::None))?;
            Ok(Value::None)
        }
        "DelAttr" => {
            obj.del_attr(text_attr(pkt, "attr")?)?;
            Ok(Value::None)
        }
        "GetItem" => obj.get_item(pkt.get("item").cloned().unwrap_or(Value::None)),
        "SetItem" => {
            obj.set_item(pkt.get("item").cloned().unwrap_or(Value::None), pkt.get("val").cloned().unwrap_or(Value::None))?;
            Ok(Value::None)
        }
        "DelItem" => {
            obj.del_item(pkt.get("item").cloned().unwrap_or(Value::None))?;
            Ok(Value::None)
        }
        "Len" => Ok(Value::Int(obj.len()?)),
        "Repr" => Ok(Value::text(obj.repr()?)),
        "Str" => Ok(Value::text(obj.str()?)),
        "Call" => {
            let args = pkt.get("args").and_then(Value::as_seq).map(|s| s.to_vec()).unwrap_or_default();
            let kwargs = match pkt.get("kwargs") {
                Some(Value::Map(entries)) => entries
                    .iter()
                    .filter_map(|(k, v)| k.as_text().map(|s| (s.to_owned(), v.clone())))
                    .collect(),
                _ => Vec::new(),
            };
            obj.call(args, kwargs)
        }
        other => Err(CoreError::UnknownPull(other.to_owned())),
    }
}

fn text_attr<'a>(pkt: &'a Packet, name: &str) -> nom_core::Result<&'a str> {
    pkt.get(name)
        .and_then(Value::as_bytes)
        .and_then(|b| std::str::from_utf8(b).ok())
        .ok_or_else(|| CoreError::UnknownPull(format!("missing attribute {name:?}")))
}
