use super::action::resolve_action;
use super::envelope::{Fault, wrap_response};

/// Produces the inner response XML for one action.
///
/// Receives the service state and the raw request body.
pub type Handler<S> = fn(&S, &[u8]) -> String;

/// Outcome of dispatching one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Complete response envelope.
    Response(Vec<u8>),
    /// No handler matched; the caller renders the fault.
    Fault(Fault),
}

/// Routes SOAP requests to a fixed table of action handlers.
pub struct Dispatcher<S> {
    service: &'static str,
    actions: Vec<(&'static str, Handler<S>)>,
}

impl<S> Dispatcher<S> {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            actions: Vec::new(),
        }
    }

    /// Register a handler. Later registrations of the same name are ignored.
    pub fn on(mut self, action: &'static str, handler: Handler<S>) -> Self {
        self.actions.push((action, handler));
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Action names this dispatcher handles, in table order.
    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.iter().map(|(name, _)| *name)
    }

    pub fn dispatch(&self, state: &S, body: &[u8]) -> Dispatch {
        let action = resolve_action(body);
        tracing::info!(service = self.service, %action, "SOAP action");

        match self.actions.iter().find(|(name, _)| *name == action) {
            Some((_, handler)) => Dispatch::Response(wrap_response(&handler(state, body))),
            None => {
                tracing::warn!(service = self.service, %action, "unsupported SOAP action");
                Dispatch::Fault(Fault::action_not_supported(&action))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: u32,
    }

    fn get_value(state: &Counter, _body: &[u8]) -> String {
        format!("<GetValueResponse>{}</GetValueResponse>", state.value)
    }

    fn echo_len(_state: &Counter, body: &[u8]) -> String {
        format!("<EchoResponse>{}</EchoResponse>", body.len())
    }

    fn dispatcher() -> Dispatcher<Counter> {
        Dispatcher::new("test")
            .on("GetValue", get_value)
            .on("Echo", echo_len)
    }

    fn request(action: &str) -> Vec<u8> {
        format!(
            "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\">\
             <s:Body><t:{action} xmlns:t=\"urn:test\"/></s:Body></s:Envelope>"
        )
        .into_bytes()
    }

    #[test]
    fn routes_to_matching_handler() {
        let Dispatch::Response(bytes) =
            dispatcher().dispatch(&Counter { value: 7 }, &request("GetValue"))
        else {
            panic!("expected response");
        };
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<GetValueResponse>7</GetValueResponse>"));
        assert!(xml.contains("<soap:Body>"));
    }

    #[test]
    fn handler_sees_request_body() {
        let body = request("Echo");
        let Dispatch::Response(bytes) = dispatcher().dispatch(&Counter { value: 0 }, &body) else {
            panic!("expected response");
        };
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains(&format!("<EchoResponse>{}</EchoResponse>", body.len())));
    }

    #[test]
    fn unknown_action_yields_fault() {
        let outcome = dispatcher().dispatch(&Counter { value: 0 }, &request("Reboot"));
        assert_eq!(outcome, Dispatch::Fault(Fault::action_not_supported("Reboot")));
    }

    #[test]
    fn lists_actions_in_order() {
        let d = dispatcher();
        assert_eq!(d.service(), "test");
        assert_eq!(d.actions().collect::<Vec<_>>(), vec!["GetValue", "Echo"]);
    }
}
