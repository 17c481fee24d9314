//! ONVIF Profile S services over [`BridgeConfig`].
//!
//! Every response is a fixed template with configuration values substituted
//! in. Nothing here has state of its own; the three services differ only in
//! their action tables.
//!
//! | Service | Path | Namespace |
//! |---------|------|-----------|
//! | Device | `/onvif/device_service` | `tds` |
//! | Media | `/onvif/media_service` | `trt` |
//! | Events | `/onvif/events_service` | `tev` |

pub mod device;
pub mod events;
pub mod media;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::soap::{Dispatch, Dispatcher};

/// One of the three SOAP endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Device,
    Media,
    Events,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Device, Service::Media, Service::Events];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Device => "/onvif/device_service",
            Self::Media => "/onvif/media_service",
            Self::Events => "/onvif/events_service",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.path() == path)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Media => "media",
            Self::Events => "events",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The device, media and events dispatchers, sharing one configuration.
pub struct Services {
    config: Arc<BridgeConfig>,
    device: Dispatcher<BridgeConfig>,
    media: Dispatcher<BridgeConfig>,
    events: Dispatcher<BridgeConfig>,
}

impl Services {
    pub fn new(config: Arc<BridgeConfig>) -> Self {
        Self {
            config,
            device: device::dispatcher(),
            media: media::dispatcher(),
            events: events::dispatcher(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn dispatcher(&self, service: Service) -> &Dispatcher<BridgeConfig> {
        match service {
            Service::Device => &self.device,
            Service::Media => &self.media,
            Service::Events => &self.events,
        }
    }

    pub fn handle(&self, service: Service, body: &[u8]) -> Dispatch {
        self.dispatcher(service).dispatch(&self.config, body)
    }
}

/// Escape a configuration value for element or attribute content.
pub(crate) fn esc(value: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(value)
}
