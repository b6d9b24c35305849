//! D-Bus status object for input-method hosts
//!
//! Serves `Get`/`Set` for the host's statuses at `/Status`, plus
//! introspection, through a small method table dispatched by hand.

mod bus;
pub mod codec;
mod endpoint;
mod handlers;
pub mod introspect;
pub mod table;

pub use bus::{route, serve, BusConnection, Transport, PEER_INTERFACE};
pub use endpoint::{
    status_interface, Dispatch, StatusEndpoint, DEFAULT_SERVICE_ROOT, STATUS_OBJECT_PATH,
};
pub use handlers::select_status_option;
