/// An HTTP/1.1 response.
///
/// Builder style: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then [`serialize`](Self::serialize).
/// `Content-Length` and `Connection: close` are always emitted; the server
/// answers one request per connection.
#[must_use]
#[derive(Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Value of the `Server` header.
pub const SERVER_AGENT: &str = concat!("onvif-bridge/", env!("CARGO_PKG_VERSION"));

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

impl HttpResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        HttpResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![("Server".to_string(), SERVER_AGENT.to_string())],
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method Not Allowed")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.add_header("Content-Type", content_type)
    }

    pub fn soap(self, body: Vec<u8>) -> Self {
        self.with_body(SOAP_CONTENT_TYPE, body)
    }

    pub fn text(self, body: &str) -> Self {
        self.with_body("text/plain; charset=utf-8", body)
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        self.with_body("application/json", value.to_string())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}
