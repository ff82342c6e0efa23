//! # Alarm state
//! The three states of the alarm and the one function that moves between them.
//!
//! Precedence of the inputs, highest first:
//! 1. the hub disables the alarm, whatever state it is in
//! 2. the hub enables a disabled alarm
//! 3. an acknowledge (button or hub `stop`) silences a triggered alarm
//! 4. an intrusion triggers an armed alarm
//!
//! Anything else leaves the state as it is.

use crate::remote::RemoteCommand;

/// The state of the alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmState {
    /// The alarm is inactive, intrusions are ignored. This is the state after boot.
    #[default]
    Disabled,
    /// The alarm is enabled and watching for intrusions
    Armed,
    /// An intrusion was detected while armed, the alarm is ringing until acknowledged
    Triggered,
}

impl AlarmState {
    /// Compute the state after one cycle
    ///
    /// `ack_pending` is the value taken from the acknowledge channel for this cycle, `remote` the command from the hub
    /// (if any) consumed in this cycle.
    pub const fn advance(
        self,
        intrusion_detected: bool,
        ack_pending: bool,
        remote: Option<RemoteCommand>,
    ) -> Self {
        match (self, remote) {
            (_, Some(RemoteCommand::SetEnabled(false))) => Self::Disabled,
            (Self::Disabled, Some(RemoteCommand::SetEnabled(true))) => Self::Armed,
            (Self::Triggered, Some(RemoteCommand::Stop)) => Self::Armed,
            (Self::Triggered, _) if ack_pending => Self::Armed,
            (Self::Armed, _) if intrusion_detected => Self::Triggered,
            (state, _) => state,
        }
    }

    /// Whether the alarm is watching, i.e. armed or triggered
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether the alarm is ringing
    pub const fn is_triggered(self) -> bool {
        matches!(self, Self::Triggered)
    }

    /// Short upper case name for the display
    pub const fn label(self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::Armed => "ARMED",
            Self::Triggered => "TRIGGERED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [AlarmState; 3] = [
        AlarmState::Disabled,
        AlarmState::Armed,
        AlarmState::Triggered,
    ];
    const COMMANDS: [Option<RemoteCommand>; 4] = [
        None,
        Some(RemoteCommand::SetEnabled(false)),
        Some(RemoteCommand::SetEnabled(true)),
        Some(RemoteCommand::Stop),
    ];

    /// Every combination of inputs
    fn all_inputs() -> impl Iterator<Item = (AlarmState, bool, bool, Option<RemoteCommand>)> {
        STATES.into_iter().flat_map(|state| {
            [false, true].into_iter().flat_map(move |intrusion| {
                [false, true].into_iter().flat_map(move |ack| {
                    COMMANDS
                        .into_iter()
                        .map(move |command| (state, intrusion, ack, command))
                })
            })
        })
    }

    #[test]
    fn boots_disabled() {
        assert_eq!(AlarmState::default(), AlarmState::Disabled);
    }

    #[test]
    fn triggers_only_from_armed_with_intrusion() {
        for (state, intrusion, ack, command) in all_inputs() {
            if state.advance(intrusion, ack, command) == AlarmState::Triggered
                && state != AlarmState::Triggered
            {
                assert_eq!(state, AlarmState::Armed);
                assert!(intrusion);
            }
        }
    }

    #[test]
    fn disable_always_wins() {
        for (state, intrusion, ack, _) in all_inputs() {
            assert_eq!(
                state.advance(intrusion, ack, Some(RemoteCommand::SetEnabled(false))),
                AlarmState::Disabled
            );
        }
    }

    #[test]
    fn intrusion_while_disabled_is_ignored() {
        assert_eq!(
            AlarmState::Disabled.advance(true, false, None),
            AlarmState::Disabled
        );
    }

    #[test]
    fn enable_arms_a_disabled_alarm() {
        assert_eq!(
            AlarmState::Disabled.advance(true, false, Some(RemoteCommand::SetEnabled(true))),
            AlarmState::Armed
        );
    }

    #[test]
    fn enable_while_armed_still_triggers() {
        assert_eq!(
            AlarmState::Armed.advance(true, false, Some(RemoteCommand::SetEnabled(true))),
            AlarmState::Triggered
        );
    }

    #[test]
    fn ack_and_stop_silence_a_triggered_alarm() {
        assert_eq!(
            AlarmState::Triggered.advance(true, true, None),
            AlarmState::Armed
        );
        assert_eq!(
            AlarmState::Triggered.advance(true, false, Some(RemoteCommand::Stop)),
            AlarmState::Armed
        );
    }

    #[test]
    fn ack_and_stop_are_no_ops_unless_triggered() {
        for state in [AlarmState::Disabled, AlarmState::Armed] {
            assert_eq!(state.advance(false, true, None), state);
            assert_eq!(state.advance(false, false, Some(RemoteCommand::Stop)), state);
        }
    }

    #[test]
    fn stays_triggered_without_ack() {
        assert_eq!(
            AlarmState::Triggered.advance(false, false, None),
            AlarmState::Triggered
        );
        assert_eq!(
            AlarmState::Triggered.advance(true, false, Some(RemoteCommand::SetEnabled(true))),
            AlarmState::Triggered
        );
    }
}
