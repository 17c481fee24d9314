//! Minimal HTTP/1.1 surface for the ONVIF SOAP endpoints.
//!
//! ONVIF clients only ever `POST` a SOAP envelope and read one reply, so the
//! server closes every connection after a single response. There is no
//! keep-alive, chunked encoding or TLS.

pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use request::HttpRequest;
pub use response::HttpResponse;
pub use router::Router;
pub use server::HttpServer;
