fn main() {
    dbus_status_lib::app::run_daemon();
}
