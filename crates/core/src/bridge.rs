use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::discovery::{DiscoveryAnnouncement, Responder};
use crate::error::{BridgeError, Result};
use crate::http::{HttpServer, Router};
use crate::onvif::Services;
use crate::relay::{Supervisor, SupervisorStatus};

/// Composition root: relay supervisor, ONVIF HTTP server, WS-Discovery.
///
/// Start order is supervisor, HTTP, discovery, so the device only announces
/// itself once its stream and endpoints exist. Stop order is the reverse.
pub struct Bridge {
    config: Arc<BridgeConfig>,
    supervisor: Supervisor,
    http: HttpServer,
    discovery: Option<Responder>,
    running: bool,
}

impl Bridge {
    /// Bridge running `mediamtx` and `ffmpeg`, serving on
    /// `0.0.0.0:<onvif_port>`.
    pub fn new(config: Arc<BridgeConfig>) -> Result<Self> {
        config.validate()?;
        let supervisor = Supervisor::for_config(&config)?;
        Ok(Self::with_supervisor(config, supervisor))
    }

    pub fn with_supervisor(config: Arc<BridgeConfig>, supervisor: Supervisor) -> Self {
        let bind = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.onvif_port));
        let router = Router::new(Services::new(config.clone()))
            .with_relay_status(supervisor.status_handle());
        Self {
            http: HttpServer::new(bind, router),
            config,
            supervisor,
            discovery: None,
            running: false,
        }
    }

    /// Serve HTTP on `addr` instead of `0.0.0.0:<onvif_port>`.
    pub fn with_http_bind(mut self, addr: SocketAddr) -> Self {
        let router = Router::new(Services::new(self.config.clone()))
            .with_relay_status(self.supervisor.status_handle());
        self.http = HttpServer::new(addr, router);
        self
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(BridgeError::AlreadyRunning);
        }

        let config = &self.config;
        tracing::info!(
            camera = %config.camera_name,
            upstream = %config.rtsp_url_masked(),
            onvif_port = config.onvif_port,
            rtsp_proxy_port = config.rtsp_proxy_port,
            "starting ONVIF bridge"
        );

        self.supervisor.start()?;

        if let Err(e) = self.http.start() {
            self.supervisor.stop();
            return Err(e);
        }

        if config.enable_discovery {
            let mut responder = Responder::new(
                config.discovery.clone(),
                DiscoveryAnnouncement::from_config(config),
            );
            match responder.start() {
                Ok(()) => self.discovery = Some(responder),
                Err(e @ BridgeError::Bind { .. }) => {
                    tracing::warn!(error = %e, "WS-Discovery unavailable, continuing without it");
                }
                Err(e) => {
                    self.http.stop();
                    self.supervisor.stop();
                    return Err(e);
                }
            }
        } else {
            tracing::info!("WS-Discovery disabled");
        }

        self.running = true;
        tracing::info!(
            device_service = %config.device_service_url(),
            stream = %config.proxy_rtsp_url(),
            "ONVIF bridge ready"
        );
        Ok(())
    }

    /// Stop discovery, then HTTP, then the relay processes. No-op when
    /// not running.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        tracing::info!("stopping ONVIF bridge");
        if let Some(mut responder) = self.discovery.take() {
            responder.stop();
        }
        self.http.stop();
        self.supervisor.stop();
        self.running = false;
        tracing::info!("ONVIF bridge stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.local_addr()
    }

    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery.as_ref().and_then(Responder::local_addr)
    }

    pub fn relay_status(&self) -> SupervisorStatus {
        self.supervisor.status()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}
