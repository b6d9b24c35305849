use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use zbus::blocking::Connection;

use dbus_status_lib::dbus::introspect::INTROSPECTABLE_INTERFACE;
use dbus_status_lib::dbus::{status_interface, DEFAULT_SERVICE_ROOT, STATUS_OBJECT_PATH};

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bus name owning the status object; also the interface prefix.
    #[clap(long, default_value = DEFAULT_SERVICE_ROOT)]
    service_root: String,

    /// Talk to the system bus instead of the session bus.
    #[clap(long)]
    system: bool,

    #[clap(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the short and long description of a status.
    Get { status_name: String },
    /// Select the option tagged `status` on a status.
    Set { status_name: String, status: String },
    /// Print the introspection document of the status object.
    Introspect,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let conn = if args.system {
        Connection::system()
    } else {
        Connection::session()
    }
    .context("Failed to connect to D-Bus")?;
    info!("Connected to D-Bus");

    let interface = status_interface(&args.service_root);
    let destination = args.service_root.as_str();

    match args.command {
        Command::Get { status_name } => {
            let reply = conn
                .call_method(
                    Some(destination),
                    STATUS_OBJECT_PATH,
                    Some(interface.as_str()),
                    "Get",
                    &(status_name.as_str(),),
                )
                .with_context(|| format!("Get '{}' failed", status_name))?;
            let (short_description, long_description) =
                reply.body().deserialize::<(String, String)>()?;
            println!("{}\t{}", short_description, long_description);
        }
        Command::Set {
            status_name,
            status,
        } => {
            let reply = conn
                .call_method(
                    Some(destination),
                    STATUS_OBJECT_PATH,
                    Some(interface.as_str()),
                    "Set",
                    &(status_name.as_str(), status.as_str()),
                )
                .with_context(|| format!("Set '{}' to '{}' failed", status_name, status))?;
            let (succeeded,) = reply.body().deserialize::<(bool,)>()?;
            debug!("Set returned {}", succeeded);
            println!("{}", succeeded);
            if !succeeded {
                std::process::exit(2);
            }
        }
        Command::Introspect => {
            let reply = conn
                .call_method(
                    Some(destination),
                    STATUS_OBJECT_PATH,
                    Some(INTROSPECTABLE_INTERFACE),
                    "Introspect",
                    &(),
                )
                .context("Introspect failed")?;
            let document = reply.body().deserialize::<String>()?;
            print!("{}", document);
        }
    }

    Ok(())
}
