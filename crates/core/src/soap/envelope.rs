use quick_xml::escape::escape;

use super::{SOAP_ENV_NS, TDS_NS, TEV_NS, TRT_NS, TT_NS, WSA_NS, WSNT_NS, WSTOP_NS};

/// A SOAP fault to be returned instead of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Fault code local name, e.g. `ActionNotSupported`. Rendered as `soap:<code>`.
    pub code: String,
    /// Human-readable reason text.
    pub reason: String,
}

impl Fault {
    pub fn new(code: &str, reason: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            reason: reason.into(),
        }
    }

    pub fn action_not_supported(action: &str) -> Self {
        Self::new("ActionNotSupported", format!("Action {action} not supported"))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        make_fault(&self.code, &self.reason)
    }
}

/// Wrap a response body in a SOAP 1.2 envelope declaring the ONVIF namespaces.
pub fn wrap_response(inner: &str) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <soap:Envelope xmlns:soap=\"{SOAP_ENV_NS}\" xmlns:tds=\"{TDS_NS}\" \
         xmlns:trt=\"{TRT_NS}\" xmlns:tev=\"{TEV_NS}\" xmlns:tt=\"{TT_NS}\" \
         xmlns:wsa=\"{WSA_NS}\" xmlns:wsnt=\"{WSNT_NS}\" xmlns:wstop=\"{WSTOP_NS}\">\n\
         <soap:Body>\n{}\n</soap:Body>\n\
         </soap:Envelope>",
        inner.trim()
    )
    .into_bytes()
}

/// Build a SOAP 1.2 fault envelope (SOAP 1.2 Part 1 §5.4).
///
/// `code` becomes the `soap:Value` (prefixed with `soap:`); `message` becomes
/// the `soap:Text` reason, XML-escaped.
pub fn make_fault(code: &str, message: &str) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <soap:Envelope xmlns:soap=\"{SOAP_ENV_NS}\">\n\
         <soap:Body>\n\
         <soap:Fault>\n\
         <soap:Code><soap:Value>soap:{}</soap:Value></soap:Code>\n\
         <soap:Reason><soap:Text xml:lang=\"en\">{}</soap:Text></soap:Reason>\n\
         </soap:Fault>\n\
         </soap:Body>\n\
         </soap:Envelope>",
        escape(code),
        escape(message)
    )
    .into_bytes()
}
