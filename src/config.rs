//! # Alarm configuration
//! The tunable constants of the alarm. Secrets and network addresses are not in here, those are generated by
//! `build.rs` from the files in `config/`.

/// How the trigger event is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventFraming {
    /// One well-formed object: `{"alarm_status":"triggered","status":"online"}`
    Merged,
    /// Two objects back to back: `{"alarm_status":"triggered"}{"status":"online"}`.
    /// Only for consumers that were built against the old devices.
    Concatenated,
}

/// The settings of the alarm
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmConfig {
    /// Anything closer than this is an intrusion, in cm
    pub threshold_cm: f32,
    /// Minimum time between two messages to the hub, in ms
    pub heartbeat_interval_ms: u64,
    /// Period of the main cycle, in ms
    pub cycle_period_ms: u64,
    /// How long to wait for the echo before giving up, in µs
    pub echo_timeout_us: u32,
    /// Speed of sound in cm/µs
    pub speed_of_sound_cm_per_us: f32,
    /// Wire form of the trigger event
    pub event_framing: EventFraming,
}

impl AlarmConfig {
    /// The values the device ships with
    pub const DEFAULT: Self = Self {
        threshold_cm: 70.0,
        heartbeat_interval_ms: 10_000,
        cycle_period_ms: 500,
        // ~5m round trip, the HC-SR04 is not specified beyond 4m anyway
        echo_timeout_us: 30_000,
        speed_of_sound_cm_per_us: 0.0343,
        event_framing: EventFraming::Merged,
    };
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
