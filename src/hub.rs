//! # Hub topics
//! Topic layout of the IoT hub's MQTT mapping, and the keep-alive bookkeeping of a session. The MQTT session itself
//! is run by the firmware's cloud task.

use core::fmt::Write;
use heapless::String;

/// Desired-property patches, delivered flat
pub const TWIN_PATCH_SUBSCRIPTION: &str = "$iothub/twin/PATCH/properties/desired/#";
/// Responses to twin requests, the full document wraps the settings in `desired`
pub const TWIN_RESPONSE_SUBSCRIPTION: &str = "$iothub/twin/res/#";
/// Direct method invocations
pub const METHOD_SUBSCRIPTION: &str = "$iothub/methods/POST/#";
/// Request for the full twin, sent after every connect
pub const TWIN_GET_TOPIC: &str = "$iothub/twin/GET/?$rid=1";

/// Prefix of desired-property patches
const TWIN_PATCH_PREFIX: &str = "$iothub/twin/PATCH/properties/desired/";
/// Prefix of twin responses
const TWIN_RESPONSE_PREFIX: &str = "$iothub/twin/res/";
/// Prefix of direct method invocations
const METHOD_PREFIX: &str = "$iothub/methods/POST/";
/// Separator between method name and request id
const REQUEST_ID_SEPARATOR: &str = "/?$rid=";

/// Capacity of the topic strings we build
pub const TOPIC_CAPACITY: usize = 96;

/// What arrived on a subscribed topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboundTopic<'a> {
    /// A desired-properties patch
    TwinPatch,
    /// The response to a twin request
    TwinResponse {
        /// Status of the request, only 200 carries a document
        status: u16,
    },
    /// A direct method invocation
    Method {
        /// Name of the method
        name: &'a str,
        /// Request id, needed for the response topic
        request_id: &'a str,
    },
}

/// Work out what a message on `topic` is. `None` for topics we did not subscribe to.
pub fn classify(topic: &str) -> Option<InboundTopic<'_>> {
    if topic.starts_with(TWIN_PATCH_PREFIX) {
        return Some(InboundTopic::TwinPatch);
    }
    if let Some(rest) = topic.strip_prefix(TWIN_RESPONSE_PREFIX) {
        let (status, _) = rest.split_once('/')?;
        return status
            .parse()
            .ok()
            .map(|status| InboundTopic::TwinResponse { status });
    }
    let rest = topic.strip_prefix(METHOD_PREFIX)?;
    let (name, request_id) = rest.split_once(REQUEST_ID_SEPARATOR)?;
    if name.is_empty() {
        return None;
    }
    Some(InboundTopic::Method { name, request_id })
}

/// The topic device-to-cloud messages are published on
pub fn telemetry_topic(device_id: &str) -> Result<String<TOPIC_CAPACITY>, core::fmt::Error> {
    let mut topic = String::new();
    write!(topic, "devices/{device_id}/messages/events/")?;
    Ok(topic)
}

/// The topic the response to a direct method goes to
pub fn method_response_topic(
    status: u16,
    request_id: &str,
) -> Result<String<TOPIC_CAPACITY>, core::fmt::Error> {
    let mut topic = String::new();
    write!(topic, "$iothub/methods/res/{status}/?$rid={request_id}")?;
    Ok(topic)
}

/// What to do when the ping interval elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PingAction {
    /// Send a ping, nothing is outstanding
    Send,
    /// The previous ping was never answered, the broker is gone
    Expired,
}

/// Keep-alive bookkeeping of a hub session
///
/// Pings go out from the session loop without waiting for the answer. The answer is picked up on the receive path
/// along with every other packet, so a message that arrives before it is handled like any other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    /// A ping went out and its answer has not arrived yet
    awaiting_response: bool,
}

impl KeepAlive {
    /// Create a new `KeepAlive` with no ping outstanding
    pub const fn new() -> Self {
        Self {
            awaiting_response: false,
        }
    }

    /// The ping interval elapsed
    pub const fn on_interval(&mut self) -> PingAction {
        if self.awaiting_response {
            PingAction::Expired
        } else {
            self.awaiting_response = true;
            PingAction::Send
        }
    }

    /// The broker answered a ping
    pub const fn on_response(&mut self) {
        self.awaiting_response = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_twin_patch() {
        assert_eq!(
            classify("$iothub/twin/PATCH/properties/desired/?$version=12"),
            Some(InboundTopic::TwinPatch)
        );
    }

    #[test]
    fn classifies_twin_response() {
        assert_eq!(
            classify("$iothub/twin/res/200/?$rid=1"),
            Some(InboundTopic::TwinResponse { status: 200 })
        );
        assert_eq!(
            classify("$iothub/twin/res/404/?$rid=1"),
            Some(InboundTopic::TwinResponse { status: 404 })
        );
        assert_eq!(classify("$iothub/twin/res/abc/?$rid=1"), None);
    }

    #[test]
    fn classifies_method() {
        assert_eq!(
            classify("$iothub/methods/POST/stop/?$rid=42"),
            Some(InboundTopic::Method {
                name: "stop",
                request_id: "42"
            })
        );
        assert_eq!(classify("$iothub/methods/POST//?$rid=42"), None);
        assert_eq!(classify("$iothub/methods/POST/stop"), None);
    }

    #[test]
    fn ignores_unknown_topics() {
        assert_eq!(classify("devices/x/messages/devicebound/"), None);
    }

    #[test]
    fn builds_topics() {
        assert_eq!(
            telemetry_topic("porch").unwrap().as_str(),
            "devices/porch/messages/events/"
        );
        assert_eq!(
            method_response_topic(404, "7").unwrap().as_str(),
            "$iothub/methods/res/404/?$rid=7"
        );
    }

    #[test]
    fn answered_pings_keep_the_session() {
        let mut keep_alive = KeepAlive::new();
        for _ in 0..3 {
            assert_eq!(keep_alive.on_interval(), PingAction::Send);
            keep_alive.on_response();
        }
    }

    #[test]
    fn unanswered_ping_expires_on_the_next_interval() {
        let mut keep_alive = KeepAlive::new();
        assert_eq!(keep_alive.on_interval(), PingAction::Send);
        assert_eq!(keep_alive.on_interval(), PingAction::Expired);
    }

    #[test]
    fn message_before_the_ping_answer_keeps_the_session() {
        let mut keep_alive = KeepAlive::new();
        assert_eq!(keep_alive.on_interval(), PingAction::Send);

        // a direct method arrives ahead of the answer and is classified as usual
        assert_eq!(
            classify("$iothub/methods/POST/stop/?$rid=9"),
            Some(InboundTopic::Method {
                name: "stop",
                request_id: "9"
            })
        );

        keep_alive.on_response();
        assert_eq!(keep_alive.on_interval(), PingAction::Send);
    }
}
