//! SOAP 1.2 plumbing shared by the ONVIF services.
//!
//! Services never build envelopes themselves. They get exactly three entry
//! points from this module:
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`resolve_action`] | Name of the operation a request invokes |
//! | [`wrap_response`] | Wrap a response body in an envelope |
//! | [`make_fault`] | Build a `soap:Fault` envelope |
//!
//! [`Dispatcher`] ties them together: it resolves the action, runs the
//! matching handler, and returns an `ActionNotSupported` fault otherwise.

pub mod action;
pub mod dispatch;
pub mod envelope;
pub mod security;

pub use action::resolve_action;
pub use dispatch::{Dispatch, Dispatcher, Handler};
pub use envelope::{Fault, make_fault, wrap_response};
pub use security::{AuthCheck, check_credentials};

pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const TDS_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const TRT_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const TEV_NS: &str = "http://www.onvif.org/ver10/events/wsdl";
pub const TT_NS: &str = "http://www.onvif.org/ver10/schema";
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
pub const WSNT_NS: &str = "http://docs.oasis-open.org/wsn/b-2";
pub const WSTOP_NS: &str = "http://docs.oasis-open.org/wsn/t-1";
