//! Connection wrapper and the message loop that feeds the endpoint.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::pin::pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::Notify;
use zbus::message::{Flags, Type as MessageType};
use zbus::Message;

use super::codec;
use super::endpoint::{Dispatch, StatusEndpoint};
use super::introspect::{self, INTROSPECTABLE_INTERFACE};
use crate::error::EndpointError;
use crate::host::Host;

pub const PEER_INTERFACE: &str = "org.freedesktop.DBus.Peer";

const MACHINE_ID_FILES: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Outgoing half of a bus connection.
pub trait Transport {
    fn send(&self, message: &Message) -> zbus::Result<()>;

    /// Block until every message handed to `send` is queued for delivery.
    fn flush(&self) -> zbus::Result<()>;
}

impl Transport for zbus::blocking::Connection {
    fn send(&self, message: &Message) -> zbus::Result<()> {
        zbus::blocking::Connection::send(self, message)
    }

    fn flush(&self) -> zbus::Result<()> {
        // `send` only returns once the message has been written to the socket.
        Ok(())
    }
}

/// A bus connection as the host lends it to endpoints.
///
/// Besides sending, it tracks which object paths are claimed so two
/// endpoints can never answer for the same path.
pub struct BusConnection {
    transport: Box<dyn Transport>,
    registered_paths: RefCell<BTreeSet<String>>,
}

impl BusConnection {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            registered_paths: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn register_object_path(&self, path: &str) -> Result<(), EndpointError> {
        if !self.registered_paths.borrow_mut().insert(path.to_string()) {
            return Err(EndpointError::PathInUse(path.to_string()));
        }
        debug!("Registered object path {}", path);
        Ok(())
    }

    pub fn unregister_object_path(&self, path: &str) {
        if self.registered_paths.borrow_mut().remove(path) {
            debug!("Unregistered object path {}", path);
        } else {
            warn!("Object path {} was not registered", path);
        }
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.registered_paths.borrow().contains(path)
    }

    pub fn send(&self, message: &Message) -> zbus::Result<()> {
        self.transport.send(message)
    }

    pub fn flush(&self) -> zbus::Result<()> {
        self.transport.flush()
    }
}

fn expects_reply(message: &Message) -> bool {
    !message
        .header()
        .primary()
        .flags()
        .contains(Flags::NoReplyExpected)
}

fn machine_id() -> Option<String> {
    MACHINE_ID_FILES.iter().find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// First segment of `path` below `parent`, if `path` lies under it.
fn child_of<'a>(parent: &str, path: &'a str) -> Option<&'a str> {
    let rest = if parent == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(parent)?.strip_prefix('/')?
    };
    rest.split('/').next().filter(|name| !name.is_empty())
}

/// Answer for a call no object handler claimed: `Peer` methods on any path,
/// introspection of the nodes above the endpoint, UnknownMethod otherwise.
fn fallback_reply(endpoint_path: &str, message: &Message) -> zbus::Result<Message> {
    let header = message.header();
    let interface = header.interface().map(|name| name.as_str());
    let member = header.member().map(|name| name.as_str());
    let path = header.path().map(|path| path.as_str()).unwrap_or_default();

    match (interface, member) {
        (Some(PEER_INTERFACE), Some("Ping")) => codec::encode_reply(message, &()),
        (Some(PEER_INTERFACE), Some("GetMachineId")) => match machine_id() {
            Some(id) => codec::encode_reply(message, &(id,)),
            None => codec::failed_reply(message, "Unable to read the machine id"),
        },
        (Some(INTROSPECTABLE_INTERFACE), Some("Introspect")) => {
            match child_of(path, endpoint_path) {
                Some(child) => {
                    codec::encode_reply(message, &(introspect::child_listing(&[child]),))
                }
                None => codec::unknown_method_reply(message),
            }
        }
        _ => codec::unknown_method_reply(message),
    }
}

/// Hand one inbound method call to the endpoint and answer it if the
/// endpoint did not.
///
/// A call the endpoint has a handler for but could not answer gets a
/// `Failed` error. Anything else gets the fallback answer. Nothing is sent
/// when the caller set NO_REPLY_EXPECTED. Returns the endpoint's outcome.
pub fn route<H: Host + ?Sized>(
    bus: &BusConnection,
    endpoint: &StatusEndpoint<'_, H>,
    message: &Message,
) -> Dispatch {
    if message.message_type() != MessageType::MethodCall {
        return Dispatch::NotHandled;
    }

    let for_endpoint = message
        .header()
        .path()
        .is_some_and(|path| path.as_str() == endpoint.path());

    let outcome = if for_endpoint {
        endpoint.dispatch(message)
    } else {
        Dispatch::NotHandled
    };

    if outcome == Dispatch::Handled || !expects_reply(message) {
        return outcome;
    }

    let reply = if for_endpoint && endpoint.serves(message) {
        codec::failed_reply(message, "Internal error: no reply was produced")
    } else {
        fallback_reply(endpoint.path(), message)
    };

    match reply {
        Ok(reply) => {
            if let Err(e) = bus.send(&reply).and_then(|()| bus.flush()) {
                error!("Failed to send fallback reply: {}", e);
            }
        }
        Err(e) => error!("Failed to build fallback reply: {}", e),
    }

    outcome
}

/// Run the message loop until `shutdown` is notified or `messages` ends.
///
/// `messages` should be subscribed before the service name is requested;
/// calls that arrive before the subscription exists are never seen.
pub async fn serve<H, S>(messages: S, endpoint: &StatusEndpoint<'_, H>, shutdown: Arc<Notify>)
where
    H: Host + ?Sized,
    S: Stream<Item = zbus::Result<Message>>,
{
    let bus = endpoint.bus();
    let mut messages = pin!(messages);
    info!("Serving {} at {}", endpoint.interface(), endpoint.path());

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Shutdown requested, leaving message loop");
                break;
            }
            next = messages.next() => match next {
                Some(Ok(message)) => {
                    route(bus, endpoint, &message);
                }
                Some(Err(e)) => {
                    warn!("Dropping unreadable message: {}", e);
                }
                None => {
                    warn!("Bus connection closed");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::rc::Rc;

    /// Transport that keeps every message instead of writing it anywhere.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Rc<RefCell<Vec<Message>>>,
        pub flushes: Rc<RefCell<usize>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, message: &Message) -> zbus::Result<()> {
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }

        fn flush(&self) -> zbus::Result<()> {
            *self.flushes.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn register_rejects_second_claim_on_same_path() {
        let bus = BusConnection::new(RecordingTransport::default());
        bus.register_object_path("/Status").unwrap();
        let err = bus.register_object_path("/Status").unwrap_err();
        assert!(matches!(err, EndpointError::PathInUse(path) if path == "/Status"));
    }

    #[test]
    fn unregister_frees_path() {
        let bus = BusConnection::new(RecordingTransport::default());
        bus.register_object_path("/Status").unwrap();
        bus.unregister_object_path("/Status");
        assert!(!bus.is_registered("/Status"));
        bus.register_object_path("/Status").unwrap();
    }

    #[test]
    fn child_of_yields_first_segment_below_parent() {
        assert_eq!(child_of("/", "/Status"), Some("Status"));
        assert_eq!(child_of("/", "/org/fcitx"), Some("org"));
        assert_eq!(child_of("/org", "/org/fcitx"), Some("fcitx"));
        assert_eq!(child_of("/Status", "/Status"), None);
        assert_eq!(child_of("/Stat", "/Status"), None);
        assert_eq!(child_of("/Other", "/Status"), None);
    }

    #[test]
    fn send_and_flush_reach_transport() {
        let transport = RecordingTransport::default();
        let bus = BusConnection::new(transport.clone());
        let message = Message::method("/Status", "Ping")
            .unwrap()
            .build(&())
            .unwrap();
        bus.send(&message).unwrap();
        bus.flush().unwrap();
        assert_eq!(transport.sent.borrow().len(), 1);
        assert_eq!(*transport.flushes.borrow(), 1);
    }
}
