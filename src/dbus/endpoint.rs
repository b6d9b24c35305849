//! The status object: method table, dispatcher and object-path lifetime.

use log::{debug, error, info};
use zbus::message::Type as MessageType;
use zbus::names::InterfaceName;
use zbus::zvariant::ObjectPath;
use zbus::Message;

use super::bus::BusConnection;
use super::handlers;
use super::introspect::{self, INTROSPECTABLE_INTERFACE};
use super::table::{MethodEntry, MethodTable};
use crate::error::{EndpointError, Result, TableError};
use crate::host::Host;

pub const STATUS_OBJECT_PATH: &str = "/Status";
pub const DEFAULT_SERVICE_ROOT: &str = "org.fcitx.Fcitx";

/// Outcome of offering a message to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A reply was produced and sent.
    Handled,
    /// Nothing was sent; the caller decides how to answer.
    NotHandled,
}

/// Interface name served under `service_root`.
pub fn status_interface(service_root: &str) -> String {
    format!("{}.Status", service_root)
}

fn build_table<H: Host + ?Sized>(
    interface: &str,
) -> std::result::Result<MethodTable<H>, TableError> {
    let document = introspect::document(interface);
    let mut table = MethodTable::new();
    table.register(
        INTROSPECTABLE_INTERFACE,
        "Introspect",
        move |_: &H, request: &Message| handlers::introspect(&document, request),
    )?;
    table.register(interface, "Get", |host: &H, request: &Message| {
        handlers::get(host, request)
    })?;
    table.register(interface, "Set", |host: &H, request: &Message| {
        handlers::set(host, request)
    })?;
    Ok(table)
}

/// The status object registered on the host's bus connection.
///
/// The object path stays registered until the endpoint is dropped.
pub struct StatusEndpoint<'h, H: Host + ?Sized> {
    host: &'h H,
    bus: &'h BusConnection,
    path: String,
    interface: String,
    table: MethodTable<H>,
}

impl<'h, H: Host + ?Sized> StatusEndpoint<'h, H> {
    /// Register the status object at `/Status`.
    pub fn new(host: &'h H, service_root: &str) -> Result<Self> {
        Self::with_path(host, service_root, STATUS_OBJECT_PATH)
    }

    pub fn with_path(host: &'h H, service_root: &str, path: &str) -> Result<Self> {
        let Some(bus) = host.bus_connection() else {
            error!("D-Bus not initialized");
            return Err(EndpointError::BusUnavailable);
        };

        ObjectPath::try_from(path).map_err(|e| EndpointError::InvalidObjectPath {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let interface = status_interface(service_root);
        InterfaceName::try_from(interface.as_str()).map_err(|e| {
            EndpointError::InvalidInterface {
                name: interface.clone(),
                reason: e.to_string(),
            }
        })?;

        let table = build_table::<H>(&interface)?;
        Self::attach(host, bus, path, interface, table)
    }

    /// Serve a caller-supplied table at `/Status` instead of the built-in one.
    #[cfg(test)]
    pub(crate) fn with_table(
        host: &'h H,
        interface: &str,
        table: MethodTable<H>,
    ) -> Result<Self> {
        let bus = host.bus_connection().ok_or(EndpointError::BusUnavailable)?;
        Self::attach(host, bus, STATUS_OBJECT_PATH, interface.to_string(), table)
    }

    fn attach(
        host: &'h H,
        bus: &'h BusConnection,
        path: &str,
        interface: String,
        table: MethodTable<H>,
    ) -> Result<Self> {
        bus.register_object_path(path)?;

        info!("Status endpoint registered at {} ({})", path, interface);
        Ok(Self {
            host,
            bus,
            path: path.to_string(),
            interface,
            table,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn bus(&self) -> &'h BusConnection {
        self.bus
    }

    fn entry_for(&self, request: &Message) -> Option<&MethodEntry<H>> {
        if request.message_type() != MessageType::MethodCall {
            return None;
        }

        let header = request.header();
        let (Some(interface), Some(member)) = (header.interface(), header.member()) else {
            return None;
        };

        let entry = self.table.lookup(interface.as_str(), member.as_str());
        if entry.is_none() {
            debug!(
                "No handler for {}.{} on {}",
                interface.as_str(),
                member.as_str(),
                self.path
            );
        }
        entry
    }

    /// Whether the table has a handler for `request`'s interface and member.
    pub fn serves(&self, request: &Message) -> bool {
        self.entry_for(request).is_some()
    }

    /// Run the handler registered for `request`, if any, and send its reply.
    pub fn dispatch(&self, request: &Message) -> Dispatch {
        let Some(entry) = self.entry_for(request) else {
            return Dispatch::NotHandled;
        };

        debug!("Dispatching {}.{}", entry.interface(), entry.method());
        let Some(reply) = entry.call(self.host, request) else {
            error!(
                "Internal error: {}.{} produced no reply",
                entry.interface(),
                entry.method()
            );
            return Dispatch::NotHandled;
        };

        if let Err(e) = self.bus.send(&reply).and_then(|()| self.bus.flush()) {
            error!(
                "Failed to send {}.{} reply: {}",
                entry.interface(),
                entry.method(),
                e
            );
        }
        Dispatch::Handled
    }
}

impl<H: Host + ?Sized> Drop for StatusEndpoint<'_, H> {
    fn drop(&mut self) {
        self.bus.unregister_object_path(&self.path);
        info!("Status endpoint at {} unregistered", self.path);
    }
}
