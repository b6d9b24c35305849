//! Positional argument decoding and reply encoding.

use serde::de::DeserializeOwned;
use serde::ser::Serialize;
use zbus::zvariant::{DynamicType, Type};
use zbus::Message;

use crate::error::CodecError;

pub const UNKNOWN_METHOD_ERROR: &str = "org.freedesktop.DBus.Error.UnknownMethod";
pub const FAILED_ERROR: &str = "org.freedesktop.DBus.Error.Failed";

/// Signature of the message body, `""` when there is none.
pub fn body_signature(message: &Message) -> String {
    message
        .header()
        .signature()
        .map(|signature| signature.to_string())
        .unwrap_or_default()
}

/// Decode the body as `T`, which must match `expected` exactly.
///
/// The signature is compared before deserializing so extra or missing
/// arguments are rejected instead of being silently dropped or defaulted.
pub fn decode_args<T>(message: &Message, expected: &str) -> Result<T, CodecError>
where
    T: DeserializeOwned + Type,
{
    let actual = body_signature(message);
    if actual != expected {
        return Err(CodecError::SignatureMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    message
        .body()
        .deserialize::<T>()
        .map_err(|e| CodecError::Malformed {
            signature: actual,
            reason: e.to_string(),
        })
}

/// Build a method return for `call` carrying `body` as its arguments.
pub fn encode_reply<B>(call: &Message, body: &B) -> zbus::Result<Message>
where
    B: Serialize + DynamicType,
{
    Message::method_reply(call)?.build(body)
}

/// Build the standard UnknownMethod error for `call`, naming the signature it
/// arrived with.
pub fn unknown_method_reply(call: &Message) -> zbus::Result<Message> {
    let header = call.header();
    let text = format!(
        "Method \"{}\" with signature \"{}\" on interface \"{}\" doesn't exist",
        header.member().map(|member| member.as_str()).unwrap_or(""),
        body_signature(call),
        header.interface().map(|iface| iface.as_str()).unwrap_or(""),
    );
    Message::method_error(call, UNKNOWN_METHOD_ERROR)?.build(&text)
}

/// Build a generic `Failed` error for `call` carrying `text`.
pub fn failed_reply(call: &Message, text: &str) -> zbus::Result<Message> {
    Message::method_error(call, FAILED_ERROR)?.build(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::message::Type as MessageType;

    fn call<B: Serialize + DynamicType>(body: &B) -> Message {
        Message::method("/Status", "Get")
            .unwrap()
            .interface("org.fcitx.Fcitx.Status")
            .unwrap()
            .build(body)
            .unwrap()
    }

    #[test]
    fn decode_accepts_exact_signature() {
        let message = call(&("punc",));
        let (name,): (String,) = decode_args(&message, "s").unwrap();
        assert_eq!(name, "punc");
    }

    #[test]
    fn decode_rejects_missing_arguments() {
        let message = call(&());
        let err = decode_args::<(String,)>(&message, "s").unwrap_err();
        assert_eq!(
            err,
            CodecError::SignatureMismatch {
                expected: "s".to_string(),
                actual: String::new(),
            }
        );
    }

    #[test]
    fn decode_rejects_extra_arguments() {
        let message = call(&("punc", "full"));
        let err = decode_args::<(String,)>(&message, "s").unwrap_err();
        assert!(matches!(err, CodecError::SignatureMismatch { actual, .. } if actual == "ss"));
    }

    #[test]
    fn decode_rejects_wrong_type() {
        let message = call(&(7u32,));
        assert!(decode_args::<(String,)>(&message, "s").is_err());
    }

    #[test]
    fn reply_references_the_call() {
        let message = call(&("punc",));
        let reply = encode_reply(&message, &(true,)).unwrap();
        assert_eq!(reply.message_type(), MessageType::MethodReturn);
        assert!(reply.header().reply_serial().is_some());
        let (value,): (bool,) = reply.body().deserialize().unwrap();
        assert!(value);
    }

    #[test]
    fn unknown_method_reply_names_signature() {
        let message = call(&(7u32,));
        let reply = unknown_method_reply(&message).unwrap();
        assert_eq!(reply.message_type(), MessageType::Error);
        assert_eq!(
            reply.header().error_name().map(|name| name.as_str()),
            Some(UNKNOWN_METHOD_ERROR)
        );
        let text: String = reply.body().deserialize().unwrap();
        assert_eq!(
            text,
            "Method \"Get\" with signature \"u\" on interface \"org.fcitx.Fcitx.Status\" doesn't exist"
        );
    }

    #[test]
    fn failed_reply_carries_text() {
        let message = call(&("punc",));
        let reply = failed_reply(&message, "no reply").unwrap();
        assert_eq!(reply.message_type(), MessageType::Error);
        assert!(reply.header().reply_serial().is_some());
        assert_eq!(
            reply.header().error_name().map(|name| name.as_str()),
            Some(FAILED_ERROR)
        );
        let text: String = reply.body().deserialize().unwrap();
        assert_eq!(text, "no reply");
    }
}
