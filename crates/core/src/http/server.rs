use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::request::HttpRequest;
use super::response::HttpResponse;
use super::router::Router;
use crate::error::{BridgeError, Result};

/// Accept poll period while no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// How long a connection may stall while sending its request.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking HTTP/1.1 server for the ONVIF endpoints.
///
/// One accept thread, one short-lived thread per connection, one request
/// per connection.
pub struct HttpServer {
    bind_addr: SocketAddr,
    router: Arc<Router>,
    running: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    accept: Option<JoinHandle<()>>,
}

impl HttpServer {
    pub fn new(bind_addr: SocketAddr, router: Router) -> Self {
        Self {
            bind_addr,
            router: Arc::new(router),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            accept: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(BridgeError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let router = self.router.clone();
        let handle = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || accept_loop(listener, router, running));
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        tracing::info!(addr = %local_addr, "ONVIF HTTP server listening");
        self.local_addr = Some(local_addr);
        self.accept = Some(handle);
        Ok(())
    }

    /// Stop accepting and wait for the accept thread. In-flight connections
    /// finish on their own threads.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept.take() {
            if handle.join().is_err() {
                tracing::error!("HTTP accept thread panicked");
            }
            tracing::info!("ONVIF HTTP server stopped");
        }
        self.local_addr = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bound address while running. Differs from the configured address
    /// when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Non-blocking accept loop, checking `running` every [`ACCEPT_POLL`].
fn accept_loop(listener: TcpListener, router: Arc<Router>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let router = router.clone();
                let spawned = thread::Builder::new()
                    .name("http-conn".to_string())
                    .spawn(move || handle_connection(stream, peer, &router));
                if let Err(e) = spawned {
                    tracing::warn!(%peer, error = %e, "failed to spawn connection thread");
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

fn handle_connection(stream: TcpStream, peer: SocketAddr, router: &Router) {
    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        tracing::debug!(%peer, error = %e, "failed to set read timeout");
    }
    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut reader = BufReader::new(reader_stream);
    let mut writer = stream;

    let response = match HttpRequest::read_from(&mut reader) {
        Ok(Some(request)) => {
            tracing::debug!(%peer, method = %request.method, path = %request.path, "request");
            router.handle(&request, peer)
        }
        Ok(None) => return,
        Err(BridgeError::Parse { kind }) => {
            tracing::warn!(%peer, error = %kind, "HTTP parse error");
            HttpResponse::bad_request()
        }
        Err(e) => {
            tracing::debug!(%peer, error = %e, "read error");
            return;
        }
    };

    tracing::debug!(%peer, status = response.status_code, "response");
    if let Err(e) = writer.write_all(&response.serialize()).and_then(|_| writer.flush()) {
        tracing::debug!(%peer, error = %e, "write error");
    }
}
