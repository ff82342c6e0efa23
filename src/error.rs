//! Error types of the alarm core, using thiserror 2.0 without std.
//!
//! None of these is fatal. The main cycle logs them and carries on with the next sample.

use thiserror::Error;

/// Ranging sensor errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    #[error("echo pulse not received within the timeout")]
    EchoTimeout,
}

/// Errors while taking in a remote twin document or direct method
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RemoteError {
    #[error("twin document is not valid JSON of the expected shape")]
    MalformedDocument,

    #[error("twin document carries no Enable/Disable value")]
    MissingEnableField,

    #[error("remote command inbox is full")]
    InboxFull,
}

impl RemoteError {
    /// The status code reported back to the hub for this error
    pub const fn status_code(self) -> u16 {
        match self {
            Self::MalformedDocument | Self::MissingEnableField => 400,
            Self::InboxFull => 503,
        }
    }
}

/// Errors while publishing a message to the hub
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    #[error("message does not fit the encode buffer")]
    Encode,

    #[error("transport refused the message")]
    Transport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_map_to_bad_request() {
        assert_eq!(RemoteError::MalformedDocument.status_code(), 400);
        assert_eq!(RemoteError::MissingEnableField.status_code(), 400);
        assert_eq!(RemoteError::InboxFull.status_code(), 503);
    }
}
