use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::json;

use super::request::HttpRequest;
use super::response::HttpResponse;
use crate::onvif::{Service, Services};
use crate::relay::SupervisorStatus;
use crate::soap::{AuthCheck, Dispatch, check_credentials};

/// Plain-text answer to `GET` on a SOAP endpoint.
pub const ENDPOINT_HINT: &str = "ONVIF Service Endpoint - Use POST for SOAP requests";

/// Maps requests to the ONVIF services and `/health`.
///
/// | Method | Path | Response |
/// |--------|------|----------|
/// | `POST` | `/onvif/{device,media,events}_service` | SOAP, 200 or 400 (fault) |
/// | `GET` | `/onvif/{device,media,events}_service` | [`ENDPOINT_HINT`] |
/// | `GET` | `/health` | JSON status |
/// | other | | 404 / 405 |
pub struct Router {
    services: Services,
    relay_status: Option<Arc<RwLock<SupervisorStatus>>>,
}

impl Router {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            relay_status: None,
        }
    }

    /// Report relay supervisor state in `/health`.
    pub fn with_relay_status(mut self, status: Arc<RwLock<SupervisorStatus>>) -> Self {
        self.relay_status = Some(status);
        self
    }

    pub fn handle(&self, request: &HttpRequest, peer: SocketAddr) -> HttpResponse {
        if let Some(service) = Service::from_path(&request.path) {
            return match request.method.as_str() {
                "POST" => self.handle_soap(service, request, peer),
                "GET" => HttpResponse::ok().text(ENDPOINT_HINT),
                _ => HttpResponse::method_not_allowed().add_header("Allow", "GET, POST"),
            };
        }

        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/health") => self.handle_health(),
            (_, "/health") => HttpResponse::method_not_allowed().add_header("Allow", "GET"),
            _ => {
                tracing::debug!(%peer, method = %request.method, path = %request.path, "no route");
                HttpResponse::not_found()
            }
        }
    }

    fn handle_soap(
        &self,
        service: Service,
        request: &HttpRequest,
        peer: SocketAddr,
    ) -> HttpResponse {
        let config = self.services.config();
        tracing::debug!(
            %peer,
            %service,
            body = %String::from_utf8_lossy(&request.body[..request.body.len().min(500)]),
            "SOAP request"
        );

        match check_credentials(&request.body, &config.onvif_username, &config.onvif_password) {
            AuthCheck::Unverified { username } => {
                tracing::warn!(
                    %peer,
                    %service,
                    %username,
                    "unverified credentials, admitting anyway"
                );
            }
            AuthCheck::Anonymous | AuthCheck::Accepted => {}
        }

        match self.services.handle(service, &request.body) {
            Dispatch::Response(body) => HttpResponse::ok().soap(body),
            Dispatch::Fault(fault) => HttpResponse::bad_request().soap(fault.to_bytes()),
        }
    }

    fn handle_health(&self) -> HttpResponse {
        let config = self.services.config();
        let relay = self
            .relay_status
            .as_ref()
            .map(|status| serde_json::to_value(&*status.read()).unwrap_or_default());

        HttpResponse::ok().json(&json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "camera_name": config.camera_name,
            "onvif_port": config.onvif_port,
            "rtsp_proxy_port": config.rtsp_proxy_port,
            "relay": relay,
        }))
    }
}
