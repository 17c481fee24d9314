use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::LazyLock;

use quick_xml::escape::escape;
use regex::Regex;
use uuid::Uuid;

use super::{DEVICE_TYPE, DiscoveryAnnouncement, WS_DISCOVERY_NS};

const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
const WSA_NS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
const DN_NS: &str = "http://www.onvif.org/ver10/network/wsdl";

/// `To` header for multicast announcements.
const TO_DISCOVERY: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";
/// `To` header for unicast replies.
const TO_ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

const PROBE_MARKER: &str = "Probe";

static MESSAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[\w.-]+:)?MessageID(?:\s[^>]*)?>\s*([^<\s]+)\s*</").expect("valid regex")
});

/// A WS-Discovery message, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    /// Multicast announcement sent once when the responder starts.
    Hello {
        message_id: String,
        announcement: DiscoveryAnnouncement,
    },
    /// Multicast withdrawal sent once when the responder stops.
    Bye {
        message_id: String,
        announcement: DiscoveryAnnouncement,
    },
    /// Inbound search request.
    Probe {
        source_addr: SocketAddr,
        /// The probe's own `MessageID`, when one could be found.
        message_id: Option<String>,
        /// Whether the probe names `NetworkVideoTransmitter`.
        typed: bool,
    },
    /// Unicast answer to a probe.
    ProbeMatch {
        message_id: String,
        relates_to: String,
        announcement: DiscoveryAnnouncement,
    },
}

/// `AppSequence` header values (WS-Discovery §7).
///
/// `instance_id` is fixed for one responder run; `message_number` increases
/// with every outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppSequence {
    pub instance_id: u64,
    pub message_number: u32,
}

/// Fresh `urn:uuid:` message identifier.
pub fn new_message_id() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

impl DiscoveryMessage {
    pub fn hello(announcement: &DiscoveryAnnouncement) -> Self {
        Self::Hello {
            message_id: new_message_id(),
            announcement: announcement.clone(),
        }
    }

    pub fn bye(announcement: &DiscoveryAnnouncement) -> Self {
        Self::Bye {
            message_id: new_message_id(),
            announcement: announcement.clone(),
        }
    }

    /// Build the reply to a probe. `RelatesTo` echoes the probe's
    /// `MessageID`, or a fresh token if the probe carried none.
    pub fn probe_match(
        probe_message_id: Option<&str>,
        announcement: &DiscoveryAnnouncement,
    ) -> Self {
        Self::ProbeMatch {
            message_id: new_message_id(),
            relates_to: probe_message_id
                .map(str::to_string)
                .unwrap_or_else(new_message_id),
            announcement: announcement.clone(),
        }
    }

    /// Classify an inbound datagram.
    ///
    /// Returns `None` for anything that is not UTF-8 or does not contain the
    /// `Probe` marker. Such datagrams are dropped without a reply.
    pub fn from_datagram(payload: &[u8], source_addr: SocketAddr) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        if !text.contains(PROBE_MARKER) {
            return None;
        }
        let message_id = MESSAGE_ID
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        Some(Self::Probe {
            source_addr,
            message_id,
            typed: text.contains(DEVICE_TYPE),
        })
    }

    /// Render the outbound SOAP envelope.
    ///
    /// Returns `None` for [`Probe`](Self::Probe), which is inbound only.
    pub fn to_xml(&self, seq: AppSequence) -> Option<String> {
        let xml = match self {
            Self::Hello {
                message_id,
                announcement,
            } => envelope(
                message_id,
                None,
                TO_DISCOVERY,
                "Hello",
                seq,
                &format!("<d:Hello>{}</d:Hello>", endpoint_body(announcement)),
            ),
            Self::Bye {
                message_id,
                announcement,
            } => envelope(
                message_id,
                None,
                TO_DISCOVERY,
                "Bye",
                seq,
                &format!(
                    "<d:Bye>{}</d:Bye>",
                    endpoint_reference(&announcement.endpoint_id)
                ),
            ),
            Self::ProbeMatch {
                message_id,
                relates_to,
                announcement,
            } => envelope(
                message_id,
                Some(relates_to),
                TO_ANONYMOUS,
                "ProbeMatches",
                seq,
                &format!(
                    "<d:ProbeMatches><d:ProbeMatch>{}</d:ProbeMatch></d:ProbeMatches>",
                    endpoint_body(announcement)
                ),
            ),
            Self::Probe { .. } => return None,
        };
        Some(xml)
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::Bye { .. } => "Bye",
            Self::Probe { .. } => "Probe",
            Self::ProbeMatch { .. } => "ProbeMatch",
        }
    }
}

fn envelope(
    message_id: &str,
    relates_to: Option<&str>,
    to: &str,
    action: &str,
    seq: AppSequence,
    body: &str,
) -> String {
    let mut header = String::new();
    let _ = write!(header, "<wsa:MessageID>{}</wsa:MessageID>", escape(message_id));
    if let Some(relates_to) = relates_to {
        let _ = write!(header, "<wsa:RelatesTo>{}</wsa:RelatesTo>", escape(relates_to));
    }
    let _ = write!(
        header,
        "<wsa:To>{to}</wsa:To>\
         <wsa:Action>{WS_DISCOVERY_NS}/{action}</wsa:Action>\
         <d:AppSequence InstanceId=\"{}\" MessageNumber=\"{}\"/>",
        seq.instance_id, seq.message_number
    );

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <soap:Envelope xmlns:soap=\"{SOAP_ENV_NS}\" xmlns:wsa=\"{WSA_NS}\" \
         xmlns:d=\"{WS_DISCOVERY_NS}\" xmlns:dn=\"{DN_NS}\">\
         <soap:Header>{header}</soap:Header>\
         <soap:Body>{body}</soap:Body>\
         </soap:Envelope>"
    )
}

fn endpoint_reference(endpoint_id: &str) -> String {
    format!(
        "<wsa:EndpointReference><wsa:Address>urn:uuid:{}</wsa:Address></wsa:EndpointReference>",
        escape(endpoint_id)
    )
}

fn endpoint_body(announcement: &DiscoveryAnnouncement) -> String {
    let scopes = announcement
        .scopes
        .iter()
        .map(|s| escape(s.as_str()).into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{}<d:Types>dn:{DEVICE_TYPE}</d:Types>\
         <d:Scopes>{scopes}</d:Scopes>\
         <d:XAddrs>{}</d:XAddrs>\
         <d:MetadataVersion>{}</d:MetadataVersion>",
        endpoint_reference(&announcement.endpoint_id),
        escape(announcement.xaddrs.as_str()),
        announcement.metadata_version
    )
}
