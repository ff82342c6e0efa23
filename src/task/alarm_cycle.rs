//! # Alarm cycle task
//! The main cycle: sample the sensor, let the monitor advance the alarm, hand out the results.
//!
//! This task feeds the hardware watchdog. If the cycle ever hangs, the board resets.

use crate::task::sensor::HcSr04;
use crate::task::task_messages::{
    ACK_CHANNEL, DISPLAY_SIGNAL, DisplayUpdate, HUB_CONNECTED, OUTBOUND_CHANNEL, REMOTE_INBOX,
    SOUND_SIGNAL, SoundCommand,
};
use crate::{SensorResources, StatusResources};
use defmt::{debug, info, warn};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Duration, Instant, Ticker};
use pico_perimeter_alarm::config::AlarmConfig;
use pico_perimeter_alarm::monitor::AlarmMonitor;
use pico_perimeter_alarm::range::RangeSampler;
use portable_atomic::Ordering;

/// Hardware watchdog timeout, several cycles long
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(5);

#[embassy_executor::task]
pub async fn alarm_cycle(r: SensorResources, s: StatusResources) {
    info!("Alarm cycle task started");

    let config = AlarmConfig::DEFAULT;

    let trigger = Output::new(r.trigger_pin, Level::Low);
    let echo = Input::new(r.echo_pin, Pull::None);
    let mut sampler = RangeSampler::new(HcSr04::new(trigger, echo), &config);

    let mut monitor = AlarmMonitor::new(&config, Instant::now().as_millis());

    let mut watchdog = Watchdog::new(s.watchdog);
    watchdog.pause_on_debug(true);
    watchdog.start(WATCHDOG_TIMEOUT);

    let mut ticker = Ticker::every(Duration::from_millis(config.cycle_period_ms));

    loop {
        let intrusion = sampler.sample().await;
        let distance_cm = sampler.last_distance_cm();
        debug!("Distance: {} cm, intrusion: {}", distance_cm, intrusion);

        let outcome = monitor.run_cycle(
            intrusion,
            Instant::now().as_millis(),
            &ACK_CHANNEL,
            &REMOTE_INBOX,
        );

        if let Some(message) = outcome.message {
            // publishing is fire-and-forget, the cycle never waits for the hub
            if OUTBOUND_CHANNEL.try_send(message).is_err() {
                warn!("Outbound queue full, dropping {:?}", message);
            }
        }

        if outcome.previous.is_triggered() != outcome.state.is_triggered() {
            SOUND_SIGNAL.signal(if outcome.state.is_triggered() {
                SoundCommand::Ring
            } else {
                SoundCommand::Silence
            });
        }

        DISPLAY_SIGNAL.signal(DisplayUpdate {
            state: outcome.state,
            distance_cm,
            hub_connected: HUB_CONNECTED.load(Ordering::Relaxed),
        });

        watchdog.feed();
        ticker.next().await;
    }
}
