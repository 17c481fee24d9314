use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use socket2::{Domain, Protocol, Socket, Type};

use super::message::{AppSequence, DiscoveryMessage};
use super::DiscoveryAnnouncement;
use crate::cancel::CancelToken;
use crate::config::DiscoveryConfig;
use crate::error::{BridgeError, Result};

/// Largest UDP payload we accept.
const MAX_DATAGRAM: usize = 65535;

/// WS-Discovery participant: announces the device, answers probes, and
/// withdraws the announcement on shutdown.
///
/// Lifecycle per run: bind → `Hello` → listen → `Bye` → release. The
/// listener is a single thread that processes datagrams strictly in arrival
/// order. [`stop`](Self::stop) does not return until that thread has exited.
pub struct Responder {
    config: DiscoveryConfig,
    announcement: DiscoveryAnnouncement,
    running: Option<Running>,
}

struct Running {
    socket: Arc<UdpSocket>,
    sequence: Arc<Sequence>,
    cancel: CancelToken,
    listener: JoinHandle<()>,
}

impl Responder {
    pub fn new(config: DiscoveryConfig, announcement: DiscoveryAnnouncement) -> Self {
        Self {
            config,
            announcement,
            running: None,
        }
    }

    /// Bind the discovery socket, send `Hello`, and start listening.
    ///
    /// Fails with [`BridgeError::Bind`] if the port is taken or the
    /// multicast group cannot be joined. Nothing is left running in that case.
    pub fn start(&mut self) -> Result<()> {
        self.start_with(|listener| {
            thread::Builder::new()
                .name("ws-discovery".to_string())
                .spawn(move || listener.run())
        })
    }

    /// [`start`](Self::start) with the listener thread created by `spawn`.
    fn start_with<F>(&mut self, spawn: F) -> Result<()>
    where
        F: FnOnce(Listener) -> std::io::Result<JoinHandle<()>>,
    {
        if self.running.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }

        let socket = Arc::new(bind_socket(&self.config)?);
        let sequence = Arc::new(Sequence::new());
        let cancel = CancelToken::new();

        send(
            &socket,
            &DiscoveryMessage::hello(&self.announcement),
            self.config.announce_addr.into(),
            &sequence,
        );

        let listener = Listener {
            socket: socket.clone(),
            announcement: self.announcement.clone(),
            sequence: sequence.clone(),
            cancel: cancel.clone(),
            config: self.config.clone(),
        };
        let listener = match spawn(listener) {
            Ok(handle) => handle,
            Err(e) => {
                // Hello is already out; withdraw it.
                send(
                    &socket,
                    &DiscoveryMessage::bye(&self.announcement),
                    self.config.announce_addr.into(),
                    &sequence,
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            addr = %self.config.bind_addr,
            endpoint = %self.announcement.endpoint_id,
            "WS-Discovery responder started"
        );

        self.running = Some(Running {
            socket,
            sequence,
            cancel,
            listener,
        });
        Ok(())
    }

    /// Send `Bye`, stop the listener, and release the socket.
    ///
    /// No-op when not running.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        send(
            &running.socket,
            &DiscoveryMessage::bye(&self.announcement),
            self.config.announce_addr.into(),
            &running.sequence,
        );

        running.cancel.cancel();
        if running.listener.join().is_err() {
            tracing::error!("WS-Discovery listener panicked");
        }
        drop(running.socket);

        tracing::info!("WS-Discovery responder stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address the socket is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .as_ref()
            .and_then(|r| r.socket.local_addr().ok())
    }

    pub fn announcement(&self) -> &DiscoveryAnnouncement {
        &self.announcement
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `AppSequence` state for one run.
struct Sequence {
    instance_id: u64,
    next: AtomicU32,
}

impl Sequence {
    fn new() -> Self {
        let instance_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            instance_id,
            next: AtomicU32::new(1),
        }
    }

    fn next(&self) -> AppSequence {
        AppSequence {
            instance_id: self.instance_id,
            message_number: self.next.fetch_add(1, Ordering::SeqCst),
        }
    }
}

/// Receive loop state, owned by the listener thread.
struct Listener {
    socket: Arc<UdpSocket>,
    announcement: DiscoveryAnnouncement,
    sequence: Arc<Sequence>,
    cancel: CancelToken,
    config: DiscoveryConfig,
}

impl Listener {
    /// Blocking receive loop.
    ///
    /// The socket's read timeout bounds each `recv_from`, so cancellation is
    /// observed within one poll interval. Errors never end the loop.
    fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        while !self.cancel.is_cancelled() {
            match self.socket.recv_from(&mut buf) {
                Ok((len, src)) => {
                    self.handle_datagram(&buf[..len], src);
                }
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    tracing::warn!(error = %e, "WS-Discovery receive error");
                    self.cancel.sleep(self.config.error_backoff);
                }
            }
        }
        tracing::debug!("WS-Discovery listener exited");
    }

    /// Reply to probes; drop everything else.
    fn handle_datagram(&self, payload: &[u8], src: SocketAddr) {
        let Some(DiscoveryMessage::Probe {
            source_addr,
            message_id,
            typed,
        }) = DiscoveryMessage::from_datagram(payload, src)
        else {
            tracing::trace!(%src, len = payload.len(), "ignoring non-probe datagram");
            return;
        };

        if typed {
            tracing::info!(%source_addr, "received NetworkVideoTransmitter probe");
        } else {
            tracing::debug!(%source_addr, "received generic probe");
        }

        let reply = DiscoveryMessage::probe_match(message_id.as_deref(), &self.announcement);
        send(&self.socket, &reply, source_addr, &self.sequence);
    }
}

/// Serialize and send one outbound message. Send failures are logged only.
fn send(socket: &UdpSocket, message: &DiscoveryMessage, dest: SocketAddr, sequence: &Sequence) {
    let Some(xml) = message.to_xml(sequence.next()) else {
        return;
    };
    match socket.send_to(xml.as_bytes(), dest) {
        Ok(_) => tracing::debug!(kind = message.kind(), %dest, "sent WS-Discovery message"),
        Err(e) => tracing::error!(
            kind = message.kind(),
            %dest,
            error = %e,
            "failed to send WS-Discovery message"
        ),
    }
}

/// Create the discovery socket: reusable address, bound, multicast joined.
fn bind_socket(config: &DiscoveryConfig) -> Result<UdpSocket> {
    let addr = SocketAddr::V4(config.bind_addr);
    let bind_err = |source| BridgeError::Bind { addr, source };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;

    let group = *config.announce_addr.ip();
    if group.is_multicast() {
        socket
            .join_multicast_v4(&group, &config.interface)
            .map_err(bind_err)?;
        tracing::debug!(%group, interface = %config.interface, "joined multicast group");
    }

    socket
        .set_read_timeout(Some(config.poll_interval))
        .map_err(bind_err)?;

    Ok(socket.into())
}
