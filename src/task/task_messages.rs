//! # Task messages of the system
//! The channels and signals the tasks talk through.
//!
//! The alarm cycle task is the only one that owns alarm state. Everything flowing into it goes through the
//! [`ACK_CHANNEL`] (the local button) and the [`REMOTE_INBOX`] (the hub), everything flowing out through the
//! [`OUTBOUND_CHANNEL`] (to the hub), the [`DISPLAY_SIGNAL`] and the [`SOUND_SIGNAL`].

use defmt::Format;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use pico_perimeter_alarm::ack::AckChannel;
use pico_perimeter_alarm::alarm::AlarmState;
use pico_perimeter_alarm::remote::RemoteInbox;
use pico_perimeter_alarm::telemetry::TelemetryMessage;
use portable_atomic::AtomicBool;

/// How many remote commands can wait for the next cycle
pub const REMOTE_INBOX_DEPTH: usize = 4;

/// How many messages can wait for the hub connection
pub const OUTBOUND_DEPTH: usize = 4;

/// What the display shows
#[derive(PartialEq, Debug, Format, Clone, Copy)]
pub struct DisplayUpdate {
    /// The alarm state after the latest cycle
    pub state: AlarmState,
    /// The distance measured in the latest cycle, in cm
    pub distance_cm: f32,
    /// Whether the hub connection is up
    pub hub_connected: bool,
}

/// What the siren should do
#[derive(PartialEq, Eq, Debug, Format, Clone, Copy)]
pub enum SoundCommand {
    /// The alarm triggered, start the siren
    Ring,
    /// The alarm was silenced or disabled, stop the siren
    Silence,
}

/// Stop requests from the acknowledge button
pub static ACK_CHANNEL: AckChannel = AckChannel::new();

/// Commands from the hub, waiting for the alarm cycle
pub static REMOTE_INBOX: RemoteInbox<CriticalSectionRawMutex, REMOTE_INBOX_DEPTH> =
    RemoteInbox::new();

/// Messages for the hub. The alarm cycle never waits on this, when it is full the message is dropped.
pub static OUTBOUND_CHANNEL: Channel<CriticalSectionRawMutex, TelemetryMessage, OUTBOUND_DEPTH> =
    Channel::new();

/// For the display, only the latest state matters
pub static DISPLAY_SIGNAL: Signal<CriticalSectionRawMutex, DisplayUpdate> = Signal::new();

/// For the sound task
pub static SOUND_SIGNAL: Signal<CriticalSectionRawMutex, SoundCommand> = Signal::new();

/// Set by the cloud task while the broker connection is up
pub static HUB_CONNECTED: AtomicBool = AtomicBool::new(false);
