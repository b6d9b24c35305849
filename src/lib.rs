pub mod app;
pub mod dbus;
pub mod error;
pub mod host;
pub mod settings;
pub mod status;
