//! SSH tunnels through a jump host.
//!
//! [`SshTunnelOpener`] authenticates against the jump host, binds a loopback
//! listener on an ephemeral port and forwards every accepted connection over
//! a `direct-tcpip` channel to the engine. One worker thread owns the SSH
//! session and pumps all forwarded connections in non-blocking mode until
//! the tunnel is closed.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ssh2::{Channel, Session};

use crate::descriptor::{Endpoint, TunnelAuth, TunnelDescriptor};
use crate::error::IntrospectError;
use crate::source::{Close, Tunnel, TunnelOpener};

const IDLE_WAIT: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy)]
pub struct SshTunnelOpener {
    connect_timeout: Duration,
}

impl Default for SshTunnelOpener {
    fn default() -> Self {
        SshTunnelOpener {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl SshTunnelOpener {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn dial(&self, hop: &TunnelDescriptor) -> Result<TcpStream, IntrospectError> {
        let context = || format!("ssh {}:{}", hop.host, hop.port);
        let addrs = (hop.host.as_str(), hop.port)
            .to_socket_addrs()
            .map_err(|e| IntrospectError::connection(context(), e))?;

        let mut last = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last = Some(err),
            }
        }
        Err(match last {
            Some(err) => IntrospectError::connection(context(), err),
            None => IntrospectError::Connection(format!("{}: no addresses resolved", context())),
        })
    }

    fn session(&self, hop: &TunnelDescriptor) -> Result<Session, IntrospectError> {
        let context = || format!("ssh {}@{}:{}", hop.username, hop.host, hop.port);
        let stream = self.dial(hop)?;

        let mut session = Session::new().map_err(|e| IntrospectError::connection(context(), e))?;
        session.set_timeout(u32::try_from(self.connect_timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| IntrospectError::connection(context(), e))?;

        let authenticated = match &hop.auth {
            TunnelAuth::Password { password } => session.userauth_password(&hop.username, password),
            TunnelAuth::PrivateKey { path, passphrase } => session.userauth_pubkey_file(
                &hop.username,
                None,
                &expand_home(path),
                passphrase.as_deref(),
            ),
        };
        authenticated.map_err(|e| IntrospectError::connection(context(), e))?;

        if !session.authenticated() {
            return Err(IntrospectError::Connection(format!(
                "{}: authentication rejected",
                context()
            )));
        }
        // Forwarding runs without a deadline; the pump polls.
        session.set_timeout(0);
        Ok(session)
    }
}

impl TunnelOpener for SshTunnelOpener {
    fn open(
        &self,
        hop: &TunnelDescriptor,
        target: &Endpoint,
    ) -> Result<Box<dyn Tunnel>, IntrospectError> {
        let port = target.port.ok_or_else(|| {
            IntrospectError::Connection(format!("tunnel target {} has no port", target.host))
        })?;
        let session = self.session(hop)?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .map_err(|e| IntrospectError::connection("binding tunnel listener", e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| IntrospectError::connection("binding tunnel listener", e))?;
        let local = listener
            .local_addr()
            .map_err(|e| IntrospectError::connection("binding tunnel listener", e))?;

        let label = format!("ssh tunnel {local} -> {}:{port} via {}", target.host, hop.host);
        let stop = Arc::new(AtomicBool::new(false));
        let forward = Forwarder {
            session,
            listener,
            target_host: target.host.clone(),
            target_port: port,
            stop: stop.clone(),
        };
        let worker = thread::Builder::new()
            .name("schemagraph-tunnel".into())
            .spawn(move || forward.run())
            .map_err(|e| IntrospectError::connection(&label, e))?;

        tracing::debug!(tunnel = %label, "tunnel open");
        Ok(Box::new(SshTunnel {
            local,
            label,
            stop,
            worker: Some(worker),
        }))
    }
}

/// Expands a leading `~/` against `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

struct SshTunnel {
    local: SocketAddr,
    label: String,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Tunnel for SshTunnel {
    fn local_endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.local.ip().to_string(),
            port: Some(self.local.port()),
        }
    }
}

impl Close for SshTunnel {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn close(mut self: Box<Self>) -> Result<(), IntrospectError> {
        self.stop.store(true, Ordering::Release);
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| {
                IntrospectError::Connection(format!("{}: forwarding thread panicked", self.label))
            }),
            None => Ok(()),
        }
    }
}

/// One forwarded connection: a local socket paired with its SSH channel.
struct Link {
    socket: TcpStream,
    channel: Channel,
}

impl Link {
    /// Moves whatever is ready in either direction. Returns whether any
    /// bytes moved, or an error once either side has closed.
    fn pump(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let mut moved = false;

        match self.socket.read(buf) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                write_fully(&mut self.channel, &buf[..n])?;
                moved = true;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err),
        }

        match self.channel.read(buf) {
            Ok(0) if self.channel.eof() => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(0) => {}
            Ok(n) => {
                write_fully(&mut self.socket, &buf[..n])?;
                moved = true;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err),
        }
        Ok(moved)
    }
}

/// `write_all` for non-blocking writers.
fn write_fully(writer: &mut impl Write, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match writer.write(data) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::sleep(IDLE_WAIT),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

struct Forwarder {
    session: Session,
    listener: TcpListener,
    target_host: String,
    target_port: u16,
    stop: Arc<AtomicBool>,
}

impl Forwarder {
    fn accept(&self, socket: TcpStream) -> io::Result<Link> {
        // Channel setup is a request/response exchange; do it blocking.
        self.session.set_blocking(true);
        let channel = self
            .session
            .channel_direct_tcpip(&self.target_host, self.target_port, None);
        self.session.set_blocking(false);
        let channel = channel.map_err(io::Error::from)?;
        socket.set_nonblocking(true)?;
        Ok(Link { socket, channel })
    }

    fn run(self) {
        self.session.set_blocking(false);
        let mut links: Vec<Link> = Vec::new();
        let mut buf = vec![0u8; 16 * 1024];

        while !self.stop.load(Ordering::Acquire) {
            let mut busy = false;

            match self.listener.accept() {
                Ok((socket, peer)) => match self.accept(socket) {
                    Ok(link) => {
                        tracing::debug!(%peer, "tunnel connection opened");
                        links.push(link);
                        busy = true;
                    }
                    Err(err) => tracing::warn!(%peer, error = %err, "tunnel channel refused"),
                },
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    tracing::warn!(error = %err, "tunnel listener failed");
                    break;
                }
            }

            links.retain_mut(|link| match link.pump(&mut buf) {
                Ok(moved) => {
                    busy |= moved;
                    true
                }
                Err(_) => false,
            });

            if !busy {
                thread::sleep(IDLE_WAIT);
            }
        }

        drop(links);
        self.session.set_blocking(true);
        if let Err(err) = self.session.disconnect(None, "tunnel closed", None) {
            tracing::debug!(error = %err, "ssh disconnect failed");
        }
    }
}
