//! Expose a plain RTSP camera as an ONVIF Profile S device.
//!
//! | Module | Role |
//! |--------|------|
//! | [`discovery`] | WS-Discovery responder (Hello/Bye, Probe → ProbeMatch) |
//! | [`relay`] | Supervises the local RTSP relay-server and stream-forwarder |
//! | [`soap`] | Action resolution, envelopes, faults |
//! | [`onvif`] | Device, media and events services |
//! | [`http`] | HTTP/1.1 surface for the services and `/health` |
//! | [`bridge`] | Starts and stops all of the above in order |

pub mod bridge;
pub mod cancel;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod onvif;
pub mod relay;
pub mod soap;

pub use bridge::Bridge;
pub use cancel::CancelToken;
pub use config::{BridgeConfig, DiscoveryConfig, RelayConfig};
pub use error::{BridgeError, Result};
