use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::sync::Notify;
use zbus::blocking::Connection;
use zbus::MessageStream;

use crate::dbus::{self, BusConnection, StatusEndpoint};
use crate::host::Host;
use crate::settings::{BusKind, LogLevel, Settings};
use crate::status::{StatusDescriptor, StatusMenu, StatusRegistry, StatusTable};

/// Host used by the standalone daemon: a status table plus the bus
/// connection it lends to the endpoint.
pub struct DaemonHost {
    bus: Option<BusConnection>,
    statuses: StatusTable,
}

impl DaemonHost {
    pub fn new(bus: Option<BusConnection>, statuses: StatusTable) -> Self {
        Self { bus, statuses }
    }
}

impl StatusRegistry for DaemonHost {
    fn lookup_status(&self, name: &str) -> Option<StatusDescriptor> {
        self.statuses.lookup_status(name)
    }

    fn lookup_menu_for_status(&self, name: &str) -> Option<&dyn StatusMenu> {
        self.statuses.lookup_menu_for_status(name)
    }
}

impl Host for DaemonHost {
    fn bus_connection(&self) -> Option<&BusConnection> {
        self.bus.as_ref()
    }
}

fn level_filter_from_settings(settings: &Settings) -> log::LevelFilter {
    match settings.log_level() {
        LogLevel::Trace => log::LevelFilter::Trace,
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Warn => log::LevelFilter::Warn,
        LogLevel::Error => log::LevelFilter::Error,
    }
}

fn init_logging(settings: &Settings) {
    // RUST_LOG, when set, overrides the configured level.
    let result = env_logger::Builder::new()
        .filter_level(level_filter_from_settings(settings))
        .parse_default_env()
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialized: {}", e);
    }
}

fn load_statuses(settings: &Settings) -> Result<StatusTable> {
    match settings.statuses_file() {
        Some(path) => StatusTable::load(path),
        None => {
            info!("No statuses file configured, using built-in statuses");
            Ok(StatusTable::builtin())
        }
    }
}

fn connect(settings: &Settings) -> Result<Connection> {
    match settings.bus() {
        BusKind::Session => Connection::session(),
        BusKind::System => Connection::system(),
    }
    .with_context(|| format!("Failed to connect to {:?} bus", settings.bus()))
}

fn request_name(connection: &Connection, settings: &Settings) -> Result<()> {
    if !settings.request_name() {
        return Ok(());
    }

    connection
        .request_name(settings.service_root())
        .with_context(|| format!("Failed to request bus name {}", settings.service_root()))?;
    info!("Acquired bus name {}", settings.service_root());
    Ok(())
}

/// Subscribe to inbound messages, then claim the service name.
///
/// The bus drops messages sent before a subscriber exists, so a client
/// that calls as soon as the name appears must find the stream open.
fn subscribe_then_claim<S>(
    subscribe: impl FnOnce() -> S,
    claim: impl FnOnce() -> Result<()>,
) -> Result<S> {
    let messages = subscribe();
    claim()?;
    Ok(messages)
}

fn run(settings: &Settings) -> Result<()> {
    let statuses = load_statuses(settings)?;
    let connection = connect(settings)?;
    let host = DaemonHost::new(Some(BusConnection::new(connection.clone())), statuses);

    let endpoint = StatusEndpoint::new(&host, settings.service_root())
        .context("Failed to start status endpoint")?;

    let messages = subscribe_then_claim(
        || MessageStream::from(connection.inner()),
        || request_name(&connection, settings),
    )?;

    let shutdown = Arc::new(Notify::new());
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutdown signal received, initiating graceful shutdown...");
        shutdown_flag.notify_one();
    }) {
        error!("Failed to set Ctrl-C handler: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build message loop runtime")?;
    runtime.block_on(dbus::serve(messages, &endpoint, shutdown));

    // Unregister /Status before the host and its connection go away.
    drop(endpoint);
    Ok(())
}

pub fn run_daemon() {
    let settings = Settings::new();
    init_logging(&settings);

    info!(
        "Starting status daemon for {} on the {:?} bus",
        settings.status_interface(),
        settings.bus()
    );

    if let Err(e) = run(&settings) {
        error!("Status daemon failed: {:#}", e);
        eprintln!("Failed to run status daemon: {:#}", e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}
