//! # Alarm monitor
//! One main cycle: take the acknowledge flag and the remote commands that are pending right now, advance the alarm
//! state, and let the reporter decide on a message.
//!
//! The monitor is the only owner of the alarm state and the report record. Everything arriving from other execution
//! contexts goes through the [`AckChannel`] or the [`RemoteInbox`] and is picked up at the start of a cycle.

use crate::ack::AckChannel;
use crate::alarm::AlarmState;
use crate::config::AlarmConfig;
use crate::remote::{RemoteCommand, RemoteInbox};
use crate::telemetry::{TelemetryMessage, TelemetryReporter};
use embassy_sync::blocking_mutex::raw::RawMutex;

/// The result of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleOutcome {
    /// State before the cycle
    pub previous: AlarmState,
    /// State after the cycle
    pub state: AlarmState,
    /// Message to publish, if any
    pub message: Option<TelemetryMessage>,
}

/// Owner of the alarm state and the report bookkeeping
pub struct AlarmMonitor {
    /// Current alarm state
    state: AlarmState,
    /// Decides what to report
    reporter: TelemetryReporter,
}

impl AlarmMonitor {
    /// Create a new `AlarmMonitor`, disabled, with the heartbeat interval starting at `now_ms`
    pub const fn new(config: &AlarmConfig, now_ms: u64) -> Self {
        Self {
            state: AlarmState::Disabled,
            reporter: TelemetryReporter::new(config.heartbeat_interval_ms, now_ms),
        }
    }

    /// The current alarm state, for the display and the sound
    pub const fn state(&self) -> AlarmState {
        self.state
    }

    /// The reporter, read-only
    #[cfg(test)]
    pub const fn reporter(&self) -> &TelemetryReporter {
        &self.reporter
    }

    /// Run one cycle with whatever is pending in `ack` and `inbox` right now
    pub fn run_cycle<M: RawMutex, const N: usize>(
        &mut self,
        intrusion_detected: bool,
        now_ms: u64,
        ack: &AckChannel,
        inbox: &RemoteInbox<M, N>,
    ) -> CycleOutcome {
        let ack_pending = ack.take_and_clear();
        let commands = inbox.drain();
        self.step(intrusion_detected, ack_pending, &commands, now_ms)
    }

    /// Run one cycle with explicit inputs
    ///
    /// Commands are applied in arrival order. The sensor reading and the acknowledge go along with the last command
    /// only, so they count once per cycle.
    pub fn step(
        &mut self,
        intrusion_detected: bool,
        ack_pending: bool,
        commands: &[RemoteCommand],
        now_ms: u64,
    ) -> CycleOutcome {
        let previous = self.state;
        let mut entered_triggered = false;
        let mut config_updated = false;

        let mut apply = |state: AlarmState,
                         intrusion: bool,
                         ack: bool,
                         command: Option<RemoteCommand>| {
            let next = state.advance(intrusion, ack, command);
            entered_triggered |= next.is_triggered() && !state.is_triggered();
            config_updated |= matches!(command, Some(RemoteCommand::SetEnabled(_)));
            next
        };

        let state = match commands.split_last() {
            None => apply(previous, intrusion_detected, ack_pending, None),
            Some((last, earlier)) => {
                let state = earlier
                    .iter()
                    .fold(previous, |state, command| apply(state, false, false, Some(*command)));
                apply(state, intrusion_detected, ack_pending, Some(*last))
            }
        };
        self.state = state;

        if state != previous {
            info!("Alarm state {:?} -> {:?}", previous, state);
        }

        // every accepted configuration update restarts the heartbeat interval
        if config_updated {
            self.reporter.reset_interval(now_ms);
        }

        let message = self
            .reporter
            .on_cycle(state, entered_triggered || state != previous, now_ms);

        CycleOutcome {
            previous,
            state,
            message,
        }
    }
}
