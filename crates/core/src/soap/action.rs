use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

/// Returned when no action can be determined.
pub const UNKNOWN_ACTION: &str = "Unknown";

/// Element names that frame a request but never name an action.
const STRUCTURAL: &[&str] = &["Envelope", "Header", "Body", "Security"];

/// Fallback patterns, tried in order.
static FALLBACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<\w+:(\w+)\s*xmlns", // <tds:GetDeviceInformation xmlns...
        r"<(\w+)\s*xmlns",     // <GetDeviceInformation xmlns...
        r"<\w+:(\w+)>",        // <tds:GetDeviceInformation>
        r"<(\w+)/>",           // <GetDeviceInformation/>
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Name of the operation a SOAP request invokes.
///
/// This is the local (namespace-stripped) name of the first child element of
/// the envelope's `Body`, whichever SOAP version namespace it is in. If the
/// body cannot be parsed, the raw text is scanned with a few tag patterns
/// instead. Returns [`UNKNOWN_ACTION`] when neither finds anything.
pub fn resolve_action(body: &[u8]) -> String {
    if let Some(action) = action_from_xml(body) {
        return action;
    }
    tracing::debug!("SOAP body not parseable, falling back to pattern match");
    action_from_text(&String::from_utf8_lossy(body)).unwrap_or_else(|| UNKNOWN_ACTION.to_string())
}

fn action_from_xml(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if body_depth == Some(depth) {
                    return Some(local_name(&e));
                }
                depth += 1;
                if body_depth.is_none() && e.local_name().as_ref() == b"Body" {
                    body_depth = Some(depth);
                }
            }
            Ok(Event::Empty(e)) => {
                if body_depth == Some(depth) {
                    return Some(local_name(&e));
                }
                if body_depth.is_none() && e.local_name().as_ref() == b"Body" {
                    return None;
                }
            }
            Ok(Event::End(_)) => {
                if body_depth == Some(depth) {
                    return None;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "SOAP body XML error");
                return None;
            }
        }
        buf.clear();
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// First non-structural tag name matched by the fallback patterns.
fn action_from_text(text: &str) -> Option<String> {
    FALLBACK_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|name| !STRUCTURAL.contains(name))
            .map(str::to_string)
    })
}
