//! # Remote commands
//! Takes in what the hub sends us, twin documents and direct method invocations, and turns it into
//! [`RemoteCommand`]s.
//!
//! The hub callbacks do not touch the alarm state. They post commands into a [`RemoteInbox`], which the main cycle
//! drains at the start of every cycle. A command arriving while a cycle runs waits for the next one.
//!
//! Twin documents come in two shapes. A desired-properties patch is flat:
//! ```json
//! {"Enable/Disable":{"value":true},"$version":7}
//! ```
//! while the full twin wraps the same setting in `desired`:
//! ```json
//! {"desired":{"Enable/Disable":{"value":true},"$version":7},"reported":{}}
//! ```
//! If both are present, the value under `desired` wins.

use crate::error::RemoteError;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use serde::Deserialize;

/// A request from the hub for the alarm state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RemoteCommand {
    /// Enable (arm) or disable the alarm, from the twin document
    SetEnabled(bool),
    /// Silence a triggered alarm, from the `stop` direct method
    Stop,
}

/// The one setting we read from the twin
#[derive(Deserialize)]
struct EnableSetting {
    /// true arms, false disables
    value: bool,
}

/// The `desired` section of a full twin document
#[derive(Deserialize)]
struct DesiredSection {
    /// The enable setting as desired by the hub
    #[serde(rename = "Enable/Disable", default)]
    enable: Option<EnableSetting>,
}

/// A twin document, either flat or wrapped in `desired`
#[derive(Deserialize)]
struct TwinDocument {
    /// The enable setting at the top level
    #[serde(rename = "Enable/Disable", default)]
    enable: Option<EnableSetting>,
    /// The desired section, if this is a full document
    #[serde(default)]
    desired: Option<DesiredSection>,
}

/// Decode the Enable/Disable value from a twin document
pub fn decode_twin_document(document: &[u8]) -> Result<bool, RemoteError> {
    let (twin, _used) = serde_json_core::from_slice::<TwinDocument>(document)
        .map_err(|_| RemoteError::MalformedDocument)?;

    twin.desired
        .and_then(|desired| desired.enable)
        .or(twin.enable)
        .map(|setting| setting.value)
        .ok_or(RemoteError::MissingEnableField)
}

/// The answer to a direct method invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MethodResponse {
    /// HTTP-like status code
    pub status: u16,
    /// JSON payload returned to the caller
    pub payload: &'static str,
}

impl MethodResponse {
    /// The method was recognized and queued
    pub const SUCCESS: Self = Self {
        status: 200,
        payload: "\"Successfully invoke device method\"",
    };

    /// No method of that name
    pub const NOT_FOUND: Self = Self {
        status: 404,
        payload: "\"No method found\"",
    };

    /// The method could not be queued
    pub const fn from_error(error: RemoteError) -> Self {
        Self {
            status: error.status_code(),
            payload: "\"Failed to invoke device method\"",
        }
    }
}

/// Commands from the hub waiting for the main cycle
pub struct RemoteInbox<M: RawMutex, const N: usize> {
    /// Commands in arrival order
    commands: Channel<M, RemoteCommand, N>,
}

impl<M: RawMutex, const N: usize> RemoteInbox<M, N> {
    /// Create a new, empty `RemoteInbox`
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
        }
    }

    /// Queue a command for the next cycle, without waiting
    pub fn post(&self, command: RemoteCommand) -> Result<(), RemoteError> {
        self.commands
            .try_send(command)
            .map_err(|_| RemoteError::InboxFull)
    }

    /// Take every command queued so far, oldest first
    pub fn drain(&self) -> heapless::Vec<RemoteCommand, N> {
        let mut commands = heapless::Vec::new();
        while let Ok(command) = self.commands.try_receive() {
            // the channel never holds more than N, so this cannot fail
            let _ = commands.push(command);
        }
        commands
    }
}

impl<M: RawMutex, const N: usize> Default for RemoteInbox<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates hub messages into commands for the main cycle
pub struct RemoteCommandHandler<'a, M: RawMutex, const N: usize> {
    /// Where decoded commands go
    inbox: &'a RemoteInbox<M, N>,
}

impl<'a, M: RawMutex, const N: usize> RemoteCommandHandler<'a, M, N> {
    /// Create a new `RemoteCommandHandler` posting into `inbox`
    pub const fn new(inbox: &'a RemoteInbox<M, N>) -> Self {
        Self { inbox }
    }

    /// Handle a twin document. Returns the decoded enable value, or the error if nothing was queued.
    pub fn handle_twin_document(&self, document: &[u8]) -> Result<bool, RemoteError> {
        let enabled = decode_twin_document(document).inspect_err(|e| {
            warn!("Rejected twin document: {:?}", e);
        })?;
        info!("Twin document: enabled = {}", enabled);
        self.inbox
            .post(RemoteCommand::SetEnabled(enabled))
            .inspect_err(|e| warn!("Dropped twin update: {:?}", e))?;
        Ok(enabled)
    }

    /// Handle a direct method invocation. Always produces a response, the hub expects one for every call.
    pub fn invoke_method(&self, name: &str, _payload: &[u8]) -> MethodResponse {
        match name {
            "stop" => match self.inbox.post(RemoteCommand::Stop) {
                Ok(()) => {
                    info!("Direct method stop queued");
                    MethodResponse::SUCCESS
                }
                Err(e) => {
                    warn!("Dropped direct method stop: {:?}", e);
                    MethodResponse::from_error(e)
                }
            },
            _ => {
                warn!("Unknown direct method");
                MethodResponse::NOT_FOUND
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type Inbox = RemoteInbox<NoopRawMutex, 4>;

    #[test]
    fn decodes_flat_patch() {
        let doc = br#"{"Enable/Disable":{"value":true},"$version":3}"#;
        assert_eq!(decode_twin_document(doc), Ok(true));
    }

    #[test]
    fn decodes_full_document() {
        let doc = br#"{"desired":{"Enable/Disable":{"value":false},"$version":3},"reported":{"$version":1}}"#;
        assert_eq!(decode_twin_document(doc), Ok(false));
    }

    #[test]
    fn desired_overrides_flat_value() {
        let doc = br#"{"Enable/Disable":{"value":false},"desired":{"Enable/Disable":{"value":true}}}"#;
        assert_eq!(decode_twin_document(doc), Ok(true));
    }

    #[test]
    fn flat_value_used_when_desired_lacks_it() {
        let doc = br#"{"Enable/Disable":{"value":true},"desired":{"$version":9}}"#;
        assert_eq!(decode_twin_document(doc), Ok(true));
    }

    #[test]
    fn missing_field_is_reported() {
        assert_eq!(
            decode_twin_document(br#"{"$version":4}"#),
            Err(RemoteError::MissingEnableField)
        );
    }

    #[test]
    fn malformed_document_is_reported() {
        assert_eq!(
            decode_twin_document(br#"{"Enable/Disable":{"value":"#),
            Err(RemoteError::MalformedDocument)
        );
        assert_eq!(
            decode_twin_document(br#"{"Enable/Disable":{"value":"yes"}}"#),
            Err(RemoteError::MalformedDocument)
        );
    }

    #[test]
    fn rejected_document_queues_nothing() {
        let inbox = Inbox::new();
        let handler = RemoteCommandHandler::new(&inbox);
        assert!(handler.handle_twin_document(b"not json").is_err());
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn twin_document_queues_set_enabled() {
        let inbox = Inbox::new();
        let handler = RemoteCommandHandler::new(&inbox);
        assert_eq!(
            handler.handle_twin_document(br#"{"Enable/Disable":{"value":true}}"#),
            Ok(true)
        );
        assert_eq!(inbox.drain().as_slice(), &[RemoteCommand::SetEnabled(true)]);
    }

    #[test]
    fn stop_method_succeeds() {
        let inbox = Inbox::new();
        let handler = RemoteCommandHandler::new(&inbox);
        let response = handler.invoke_method("stop", b"{}");
        assert_eq!(response.status, 200);
        assert_eq!(response.payload, "\"Successfully invoke device method\"");
        assert_eq!(inbox.drain().as_slice(), &[RemoteCommand::Stop]);
    }

    #[test]
    fn unknown_method_is_not_found() {
        let inbox = Inbox::new();
        let handler = RemoteCommandHandler::new(&inbox);
        assert_eq!(handler.invoke_method("ping", b""), MethodResponse::NOT_FOUND);
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn full_inbox_is_reported() {
        let inbox = RemoteInbox::<NoopRawMutex, 1>::new();
        let handler = RemoteCommandHandler::new(&inbox);
        assert_eq!(handler.invoke_method("stop", b"").status, 200);
        assert_eq!(handler.invoke_method("stop", b"").status, 503);
        assert_eq!(
            handler.handle_twin_document(br#"{"Enable/Disable":{"value":true}}"#),
            Err(RemoteError::InboxFull)
        );
    }

    #[test]
    fn drain_keeps_arrival_order() {
        let inbox = Inbox::new();
        inbox.post(RemoteCommand::SetEnabled(true)).unwrap();
        inbox.post(RemoteCommand::Stop).unwrap();
        inbox.post(RemoteCommand::SetEnabled(false)).unwrap();
        assert_eq!(
            inbox.drain().as_slice(),
            &[
                RemoteCommand::SetEnabled(true),
                RemoteCommand::Stop,
                RemoteCommand::SetEnabled(false)
            ]
        );
        assert!(inbox.drain().is_empty());
    }
}
