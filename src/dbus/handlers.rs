//! Handlers for the methods served at the status object path.

use log::{debug, error, warn};
use zbus::Message;

use super::codec;
use crate::status::{StatusDescriptor, StatusRegistry};

const GET_SIGNATURE: &str = "s";
const SET_SIGNATURE: &str = "ss";

fn build_or_log(method: &str, reply: zbus::Result<Message>) -> Option<Message> {
    match reply {
        Ok(message) => Some(message),
        Err(e) => {
            error!("Failed to build {} reply: {}", method, e);
            None
        }
    }
}

fn reject_signature(
    method: &str,
    request: &Message,
    reason: &dyn std::fmt::Display,
) -> Option<Message> {
    warn!("Rejecting {} call: {}", method, reason);
    build_or_log(method, codec::unknown_method_reply(request))
}

/// `Introspect() -> (s)`: serve the prebuilt document.
pub fn introspect(document: &str, request: &Message) -> Option<Message> {
    build_or_log("Introspect", codec::encode_reply(request, &(document,)))
}

/// `Get(s status_name) -> (s, s)`.
///
/// Unknown statuses answer with two empty strings.
pub fn get<R: StatusRegistry + ?Sized>(registry: &R, request: &Message) -> Option<Message> {
    let (status_name,): (String,) = match codec::decode_args(request, GET_SIGNATURE) {
        Ok(args) => args,
        Err(e) => return reject_signature("Get", request, &e),
    };

    let descriptor = registry.lookup_status(&status_name).unwrap_or_else(|| {
        debug!("Get: unknown status '{}'", status_name);
        StatusDescriptor::default()
    });

    build_or_log(
        "Get",
        codec::encode_reply(
            request,
            &(
                descriptor.short_description.as_str(),
                descriptor.long_description.as_str(),
            ),
        ),
    )
}

/// Activate the first option of `status_name` tagged `tag`.
///
/// Returns whether an option was activated.
pub fn select_status_option<R: StatusRegistry + ?Sized>(
    registry: &R,
    status_name: &str,
    tag: &str,
) -> bool {
    let Some(menu) = registry.lookup_menu_for_status(status_name) else {
        debug!("Set: no menu for status '{}'", status_name);
        return false;
    };

    match (0..menu.len()).find(|&index| menu.tag(index) == Some(tag)) {
        Some(index) => {
            menu.activate(index);
            true
        }
        None => {
            debug!(
                "Set: status '{}' has no option tagged '{}'",
                status_name, tag
            );
            false
        }
    }
}

/// `Set(s status_name, s status) -> (b)`.
pub fn set<R: StatusRegistry + ?Sized>(registry: &R, request: &Message) -> Option<Message> {
    let (status_name, tag): (String, String) =
        match codec::decode_args(request, SET_SIGNATURE) {
            Ok(args) => args,
            Err(e) => return reject_signature("Set", request, &e),
        };

    let succeeded = select_status_option(registry, &status_name, &tag);
    build_or_log("Set", codec::encode_reply(request, &(succeeded,)))
}
