//! Collaborator surface the host process provides to the endpoint.

use crate::dbus::BusConnection;
use crate::status::StatusRegistry;

/// The process hosting the status endpoint.
///
/// The connection handed out here is only borrowed: it must outlive every
/// endpoint created from it, and the endpoint never closes it.
pub trait Host: StatusRegistry {
    /// An already-initialized bus connection, or `None` when the host has not
    /// connected yet.
    fn bus_connection(&self) -> Option<&BusConnection>;
}
