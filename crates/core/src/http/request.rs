use std::io::{BufRead, Read};

use crate::error::{BridgeError, ParseErrorKind, Result};

/// Upper bound on the request head (request line plus headers).
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Upper bound on a request body. SOAP requests are a few KiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A parsed HTTP/1.1 request (RFC 9112 §3).
///
/// ```text
/// Method SP Request-Target SP HTTP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [Content-Length bytes of body]
/// ```
///
/// Header lookup is case-insensitive.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    /// Request target with any query string removed.
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Parse the request head: request line and headers, no body.
    pub fn parse_head(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(parse_error(ParseErrorKind::EmptyRequest))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 || !parts[2].starts_with("HTTP/") {
            return Err(parse_error(ParseErrorKind::InvalidRequestLine));
        }

        let path = match parts[1].split_once('?') {
            Some((path, _query)) => path,
            None => parts[1],
        };

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(parse_error(ParseErrorKind::InvalidHeader))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(HttpRequest {
            method: parts[0].to_string(),
            path: path.to_string(),
            version: parts[2].to_string(),
            headers,
            body: Vec::new(),
        })
    }

    /// Read one request from `reader`: the head, then `Content-Length`
    /// bytes of body.
    ///
    /// Returns `Ok(None)` if the peer closed the connection before sending
    /// anything.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Option<Self>> {
        let mut head = String::new();
        let mut consumed = 0;
        loop {
            let mut line = String::new();
            // Never buffer more than one byte past the limit, newline or not.
            let allowance = (MAX_HEAD_BYTES - consumed + 1) as u64;
            let read = reader.by_ref().take(allowance).read_line(&mut line)?;
            if read == 0 {
                if head.trim().is_empty() {
                    return Ok(None);
                }
                break;
            }
            consumed += read;
            if consumed > MAX_HEAD_BYTES {
                return Err(parse_error(ParseErrorKind::TooLarge));
            }
            head.push_str(&line);
            if line == "\r\n" || line == "\n" {
                // Tolerate stray blank lines ahead of the request line.
                if head.trim().is_empty() {
                    head.clear();
                    continue;
                }
                break;
            }
        }

        let mut request = Self::parse_head(&head)?;
        let length = request.content_length()?;
        if length > MAX_BODY_BYTES {
            return Err(parse_error(ParseErrorKind::TooLarge));
        }
        if length > 0 {
            let mut body = vec![0; length];
            reader.read_exact(&mut body)?;
            request.body = body;
        }
        Ok(Some(request))
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared body length; zero when the header is absent.
    pub fn content_length(&self) -> Result<usize> {
        match self.get_header("Content-Length") {
            Some(value) => value
                .parse()
                .map_err(|_| parse_error(ParseErrorKind::InvalidContentLength)),
            None => Ok(0),
        }
    }
}

fn parse_error(kind: ParseErrorKind) -> BridgeError {
    BridgeError::Parse { kind }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_post_head() {
        let raw = "POST /onvif/device_service HTTP/1.1\r\n\
                   Host: 10.0.0.1:8080\r\n\
                   Content-Type: application/soap+xml; charset=utf-8\r\n\r\n";
        let req = HttpRequest::parse_head(raw).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/onvif/device_service");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.get_header("content-type"), Some("application/soap+xml; charset=utf-8"));
    }

    #[test]
    fn query_string_is_dropped() {
        let req =
            HttpRequest::parse_head("GET /onvif/device_service?wsdl HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/onvif/device_service");
    }

    #[test]
    fn read_body_by_content_length() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
        let mut reader = Cursor::new(&raw[..]);
        let req = HttpRequest::read_from(&mut reader).unwrap().unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn closed_connection_yields_none() {
        let mut reader = Cursor::new(&b""[..]);
        assert!(HttpRequest::read_from(&mut reader).unwrap().is_none());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 50\r\n\r\nshort";
        let mut reader = Cursor::new(&raw[..]);
        assert!(matches!(HttpRequest::read_from(&mut reader), Err(BridgeError::Io(_))));
    }

    #[test]
    fn unterminated_head_stops_at_limit() {
        let raw = vec![b'A'; 4 * MAX_HEAD_BYTES];
        let mut reader = Cursor::new(&raw[..]);
        assert!(matches!(
            HttpRequest::read_from(&mut reader),
            Err(BridgeError::Parse { kind: ParseErrorKind::TooLarge })
        ));
        assert!(reader.position() <= MAX_HEAD_BYTES as u64 + 1);
    }

    #[test]
    fn blank_line_flood_counts_toward_limit() {
        let raw = b"\r\n".repeat(MAX_HEAD_BYTES);
        let mut reader = Cursor::new(&raw[..]);
        assert!(matches!(
            HttpRequest::read_from(&mut reader),
            Err(BridgeError::Parse { kind: ParseErrorKind::TooLarge })
        ));
    }

    #[test]
    fn head_at_limit_is_accepted() {
        let prefix = "GET / HTTP/1.1\r\nX-Pad: ";
        let pad = MAX_HEAD_BYTES - prefix.len() - "\r\n\r\n".len();
        let raw = format!("{prefix}{}\r\n\r\n", "p".repeat(pad));
        assert_eq!(raw.len(), MAX_HEAD_BYTES);
        let mut reader = Cursor::new(raw.as_bytes());
        let req = HttpRequest::read_from(&mut reader).unwrap().unwrap();
        assert_eq!(req.get_header("x-pad").map(str::len), Some(pad));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            HttpRequest::parse_head(""),
            Err(BridgeError::Parse { kind: ParseErrorKind::EmptyRequest })
        ));
        assert!(matches!(
            HttpRequest::parse_head("GET /\r\n\r\n"),
            Err(BridgeError::Parse { kind: ParseErrorKind::InvalidRequestLine })
        ));
        assert!(matches!(
            HttpRequest::parse_head("GET / HTTP/1.1\r\nno-colon\r\n\r\n"),
            Err(BridgeError::Parse { kind: ParseErrorKind::InvalidHeader })
        ));
        let req =
            HttpRequest::parse_head("POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n").unwrap();
        assert!(matches!(
            req.content_length(),
            Err(BridgeError::Parse { kind: ParseErrorKind::InvalidContentLength })
        ));
    }
}
