//! # HC-SR04 driver
//! Drives the ultrasonic sensor directly over two GPIOs: a 10 µs pulse on the trigger pin starts a measurement, the
//! sensor answers with a pulse on the echo pin as wide as the sound took to get there and back.

use embassy_rp::gpio::{Input, Output};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use pico_perimeter_alarm::error::SensorError;
use pico_perimeter_alarm::range::EchoSensor;

/// Width of the trigger pulse
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// HC-SR04 on a trigger output and an echo input
pub struct HcSr04<'d> {
    /// Trigger pin, idles low
    trigger: Output<'d>,
    /// Echo pin, high for the duration of the round trip
    echo: Input<'d>,
}

impl<'d> HcSr04<'d> {
    /// Create a new `HcSr04`
    pub const fn new(trigger: Output<'d>, echo: Input<'d>) -> Self {
        Self { trigger, echo }
    }
}

impl EchoSensor for HcSr04<'_> {
    async fn trigger_pulse(&mut self) {
        self.trigger.set_low();
        Timer::after_micros(2).await;
        self.trigger.set_high();
        Timer::after(TRIGGER_PULSE).await;
        self.trigger.set_low();
    }

    async fn measure_echo_duration_us(&mut self, timeout_us: u32) -> Result<u32, SensorError> {
        let timeout = Duration::from_micros(u64::from(timeout_us));

        // the echo pulse starts some hundred µs after the trigger
        with_timeout(timeout, self.echo.wait_for_high())
            .await
            .map_err(|_| SensorError::EchoTimeout)?;
        let start = Instant::now();

        with_timeout(timeout, self.echo.wait_for_low())
            .await
            .map_err(|_| SensorError::EchoTimeout)?;

        Ok(u32::try_from(start.elapsed().as_micros()).unwrap_or(u32::MAX))
    }
}
