//! WS-Discovery responder (WS-Discovery 2005/04, ONVIF Core §7.3).
//!
//! ONVIF clients locate devices by multicasting a SOAP-over-UDP `Probe` to
//! `239.255.255.250:3702`. A device answers with a unicast `ProbeMatch`
//! carrying its endpoint reference, types, scopes and service address
//! (`XAddrs`). Devices also announce themselves with a multicast `Hello` when
//! they appear and withdraw with `Bye` when they leave.
//!
//! ```text
//! client                      bridge
//!   |  Probe (multicast)  -->   |
//!   |  <-- ProbeMatch (unicast) |
//! ```
//!
//! Inbound parsing is deliberately permissive: any datagram mentioning
//! `Probe` gets a reply, whether or not it names `NetworkVideoTransmitter`.

pub mod message;
pub mod responder;

use std::net::Ipv4Addr;

use crate::config::BridgeConfig;

pub use message::{AppSequence, DiscoveryMessage};
pub use responder::Responder;

/// Well-known WS-Discovery UDP port.
pub const WS_DISCOVERY_PORT: u16 = 3702;

/// Well-known WS-Discovery IPv4 multicast group.
pub const WS_DISCOVERY_MULTICAST: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// WS-Discovery namespace.
pub const WS_DISCOVERY_NS: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";

/// Device type every outbound message advertises.
pub const DEVICE_TYPE: &str = "NetworkVideoTransmitter";

/// Immutable identity carried in every outbound discovery message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryAnnouncement {
    /// Endpoint UUID, without the `urn:uuid:` prefix.
    pub endpoint_id: String,
    pub scopes: Vec<String>,
    /// Device service URL clients should contact.
    pub xaddrs: String,
    /// Always 1: nothing about the device changes while it runs.
    pub metadata_version: u32,
}

impl DiscoveryAnnouncement {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            endpoint_id: config.hardware_id.clone(),
            scopes: vec![
                "onvif://www.onvif.org/type/video_encoder".to_string(),
                "onvif://www.onvif.org/type/Network_Video_Transmitter".to_string(),
                "onvif://www.onvif.org/Profile/Streaming".to_string(),
                format!("onvif://www.onvif.org/hardware/{}", config.camera_model),
                format!("onvif://www.onvif.org/name/{}", config.scope_name()),
            ],
            xaddrs: config.device_service_url(),
            metadata_version: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_from_config() {
        let config = BridgeConfig {
            hardware_id: "1b4e28ba-2fa1-11d2-883f-0016d3cca427".to_string(),
            camera_name: "Back Yard".to_string(),
            camera_model: "Bridge-1".to_string(),
            server_ip: "10.1.1.2".to_string(),
            onvif_port: 8080,
            ..BridgeConfig::default()
        };
        let ann = DiscoveryAnnouncement::from_config(&config);
        assert_eq!(ann.endpoint_id, "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
        assert_eq!(ann.xaddrs, "http://10.1.1.2:8080/onvif/device_service");
        assert_eq!(ann.metadata_version, 1);
        assert!(ann.scopes.contains(&"onvif://www.onvif.org/hardware/Bridge-1".to_string()));
        assert!(ann.scopes.contains(&"onvif://www.onvif.org/name/Back_Yard".to_string()));
    }
}
