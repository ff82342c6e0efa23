//! # Telemetry reporter
//! Decides what goes to the hub in a cycle, and when.
//!
//! - the cycle that enters [`AlarmState::Triggered`] sends the trigger event, once per trigger
//! - otherwise, once more than the heartbeat interval has passed since the last message, a heartbeat
//!   reporting online (alarm enabled) or offline (alarm disabled)
//! - otherwise nothing
//!
//! The reporter hands out the message and considers it sent. Publishing is fire-and-forget: a failed publish does
//! not roll anything back, the next heartbeat or trigger tries again.

use crate::alarm::AlarmState;
use crate::config::EventFraming;
use crate::error::PublishError;
use heapless::Vec;
use serde::Serialize;

/// Capacity of an encoded message
pub const MESSAGE_CAPACITY: usize = 64;

/// A message for the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryMessage {
    /// The alarm just triggered
    TriggerEvent,
    /// Periodic sign of life
    Heartbeat {
        /// Whether the alarm is enabled
        online: bool,
    },
}

/// `{"alarm_status":"triggered","status":"online"}`
#[derive(Serialize)]
struct EventReport<'a> {
    /// Always `triggered`
    alarm_status: &'a str,
    /// Always `online`, a triggered alarm is enabled
    status: &'a str,
}

/// `{"alarm_status":"triggered"}`
#[derive(Serialize)]
struct AlarmStatusReport<'a> {
    /// Always `triggered`
    alarm_status: &'a str,
}

/// `{"status":"online"}` or `{"status":"offline"}`
#[derive(Serialize)]
struct StatusReport<'a> {
    /// `online` or `offline`
    status: &'a str,
}

/// Serialize `value` and append it to `encoded`
fn append_json<T: Serialize>(
    encoded: &mut Vec<u8, MESSAGE_CAPACITY>,
    value: &T,
) -> Result<(), PublishError> {
    let mut buf = [0u8; MESSAGE_CAPACITY];
    let len = serde_json_core::to_slice(value, &mut buf).map_err(|_| PublishError::Encode)?;
    encoded
        .extend_from_slice(&buf[..len])
        .map_err(|_| PublishError::Encode)
}

impl TelemetryMessage {
    /// Encode the message as JSON, ready for the transport
    pub fn encode(self, framing: EventFraming) -> Result<Vec<u8, MESSAGE_CAPACITY>, PublishError> {
        let mut encoded = Vec::new();
        match (self, framing) {
            (Self::TriggerEvent, EventFraming::Merged) => append_json(
                &mut encoded,
                &EventReport {
                    alarm_status: "triggered",
                    status: "online",
                },
            )?,
            (Self::TriggerEvent, EventFraming::Concatenated) => {
                append_json(
                    &mut encoded,
                    &AlarmStatusReport {
                        alarm_status: "triggered",
                    },
                )?;
                append_json(&mut encoded, &StatusReport { status: "online" })?;
            }
            (Self::Heartbeat { online }, _) => append_json(
                &mut encoded,
                &StatusReport {
                    status: if online { "online" } else { "offline" },
                },
            )?,
        }
        Ok(encoded)
    }
}

/// When the last message went out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportRecord {
    /// Time of the last message, ms since boot
    pub last_sent_at_ms: u64,
    /// Minimum time between heartbeats, in ms
    pub min_interval_ms: u64,
}

/// Decides per cycle whether to report and what
pub struct TelemetryReporter {
    /// Bookkeeping of the last message
    record: ReportRecord,
}

impl TelemetryReporter {
    /// Create a new `TelemetryReporter`. The first heartbeat is due one interval after `now_ms`.
    pub const fn new(min_interval_ms: u64, now_ms: u64) -> Self {
        Self {
            record: ReportRecord {
                last_sent_at_ms: now_ms,
                min_interval_ms,
            },
        }
    }

    /// Decide what to send in this cycle
    pub fn on_cycle(
        &mut self,
        state: AlarmState,
        state_changed: bool,
        now_ms: u64,
    ) -> Option<TelemetryMessage> {
        let message = if state_changed && state.is_triggered() {
            TelemetryMessage::TriggerEvent
        } else if now_ms.saturating_sub(self.record.last_sent_at_ms) > self.record.min_interval_ms {
            TelemetryMessage::Heartbeat {
                online: state.is_enabled(),
            }
        } else {
            return None;
        };
        self.record.last_sent_at_ms = now_ms;
        Some(message)
    }

    /// Restart the heartbeat interval at `now_ms`, as if a message had just been sent
    pub const fn reset_interval(&mut self, now_ms: u64) {
        self.record.last_sent_at_ms = now_ms;
    }

    /// The current bookkeeping
    pub const fn record(&self) -> ReportRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(message: TelemetryMessage, framing: EventFraming) -> std::string::String {
        let encoded = message.encode(framing).unwrap();
        std::string::String::from_utf8(encoded.to_vec()).unwrap()
    }

    #[test]
    fn wire_shapes() {
        assert_eq!(
            encoded(TelemetryMessage::TriggerEvent, EventFraming::Merged),
            r#"{"alarm_status":"triggered","status":"online"}"#
        );
        assert_eq!(
            encoded(TelemetryMessage::TriggerEvent, EventFraming::Concatenated),
            r#"{"alarm_status":"triggered"}{"status":"online"}"#
        );
        assert_eq!(
            encoded(
                TelemetryMessage::Heartbeat { online: true },
                EventFraming::Merged
            ),
            r#"{"status":"online"}"#
        );
        assert_eq!(
            encoded(
                TelemetryMessage::Heartbeat { online: false },
                EventFraming::Concatenated
            ),
            r#"{"status":"offline"}"#
        );
    }

    #[test]
    fn trigger_event_is_edge_triggered() {
        let mut reporter = TelemetryReporter::new(10_000, 0);
        assert_eq!(
            reporter.on_cycle(AlarmState::Triggered, true, 500),
            Some(TelemetryMessage::TriggerEvent)
        );
        for now in [1_000, 1_500, 2_000] {
            assert_eq!(reporter.on_cycle(AlarmState::Triggered, false, now), None);
        }
    }

    #[test]
    fn heartbeat_after_interval() {
        let mut reporter = TelemetryReporter::new(10_000, 0);
        assert_eq!(reporter.on_cycle(AlarmState::Armed, false, 10_000), None);
        assert_eq!(
            reporter.on_cycle(AlarmState::Armed, false, 10_001),
            Some(TelemetryMessage::Heartbeat { online: true })
        );
        assert_eq!(reporter.record().last_sent_at_ms, 10_001);
        assert_eq!(reporter.on_cycle(AlarmState::Armed, false, 15_000), None);
    }

    #[test]
    fn disabled_heartbeat_is_offline() {
        let mut reporter = TelemetryReporter::new(10_000, 0);
        assert_eq!(
            reporter.on_cycle(AlarmState::Disabled, false, 20_000),
            Some(TelemetryMessage::Heartbeat { online: false })
        );
    }

    #[test]
    fn trigger_event_restarts_the_interval() {
        let mut reporter = TelemetryReporter::new(10_000, 0);
        assert_eq!(
            reporter.on_cycle(AlarmState::Triggered, true, 25_000),
            Some(TelemetryMessage::TriggerEvent)
        );
        assert_eq!(reporter.on_cycle(AlarmState::Triggered, false, 30_000), None);
        assert_eq!(
            reporter.on_cycle(AlarmState::Triggered, false, 35_001),
            Some(TelemetryMessage::Heartbeat { online: true })
        );
    }

    #[test]
    fn reset_postpones_the_heartbeat() {
        let mut reporter = TelemetryReporter::new(10_000, 0);
        reporter.reset_interval(9_000);
        assert_eq!(reporter.on_cycle(AlarmState::Armed, false, 12_000), None);
        assert!(reporter.on_cycle(AlarmState::Armed, false, 19_001).is_some());
    }
}
