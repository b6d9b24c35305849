//! Introspection document for the status object.

pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

const DOCTYPE: &str = "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\
\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n";

/// Render the XML describing the Introspectable interface and the status
/// interface named `status_interface`.
pub fn document(status_interface: &str) -> String {
    let mut xml = String::from(DOCTYPE);
    xml.push_str("<node>\n");
    xml.push_str(&format!(
        "  <interface name=\"{}\">\n\
         \x20   <method name=\"Introspect\">\n\
         \x20     <arg name=\"data\" direction=\"out\" type=\"s\"/>\n\
         \x20   </method>\n\
         \x20 </interface>\n",
        INTROSPECTABLE_INTERFACE
    ));
    xml.push_str(&format!(
        "  <interface name=\"{}\">\n\
         \x20   <method name=\"Get\">\n\
         \x20     <arg name=\"status_name\" direction=\"in\" type=\"s\"/>\n\
         \x20     <arg name=\"short_description\" direction=\"out\" type=\"s\"/>\n\
         \x20     <arg name=\"long_description\" direction=\"out\" type=\"s\"/>\n\
         \x20   </method>\n\
         \x20   <method name=\"Set\">\n\
         \x20     <arg name=\"status_name\" direction=\"in\" type=\"s\"/>\n\
         \x20     <arg name=\"status\" direction=\"in\" type=\"s\"/>\n\
         \x20     <arg name=\"succeeded\" direction=\"out\" type=\"b\"/>\n\
         \x20   </method>\n\
         \x20 </interface>\n",
        status_interface
    ));
    xml.push_str("</node>\n");
    xml
}

/// Render the XML for an intermediate path that only lists its children.
pub fn child_listing(children: &[&str]) -> String {
    let mut xml = String::from(DOCTYPE);
    xml.push_str("<node>\n");
    for child in children {
        xml.push_str(&format!("  <node name=\"{}\"/>\n", child));
    }
    xml.push_str("</node>\n");
    xml
}
