//! # Acknowledge button task
//! Debounces the acknowledge button and turns every press into a stop request on the [`ACK_CHANNEL`].

use crate::AckButtonResources;
use crate::task::task_messages::ACK_CHANNEL;
use defmt::{debug, info};
use embassy_rp::gpio::{Input, Level, Pull};
use embassy_time::{Duration, Instant, Timer};

/// Handles the acknowledge button
/// Debounces button press
pub struct ButtonManager<'a> {
    /// The input pin for the button
    input: Input<'a>,
    /// The debounce duration
    debounce_duration: Duration,
}

impl<'a> ButtonManager<'a> {
    /// Create a new `ButtonManager`
    pub const fn new(input: Input<'a>) -> Self {
        Self {
            input,
            debounce_duration: Duration::from_millis(80),
        }
    }

    /// Wait for debounced presses forever. The button pulls the pin low, a press counts once it is released again, so
    /// holding the button sends exactly one request.
    pub async fn handle_button_press(&mut self) {
        loop {
            if self.debounce().await != Level::Low {
                continue;
            }
            let pressed_at = Instant::now();

            while self.debounce().await != Level::High {}
            debug!("Button was down for {}ms", pressed_at.elapsed().as_millis());

            info!("Acknowledge button pressed");
            ACK_CHANNEL.request_stop();
        }
    }

    /// Debounce the button by waiting for the level to be stable for the debounce duration. We determine the input
    /// level, await any edge, wait for the debounce duration, then check whether the level has changed.
    pub async fn debounce(&mut self) -> Level {
        loop {
            let l1 = self.input.get_level();

            self.input.wait_for_any_edge().await;

            Timer::after(self.debounce_duration).await;

            let l2 = self.input.get_level();
            if l1 != l2 {
                break l2;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn ack_button(r: AckButtonResources) {
    info!("Acknowledge button task started");
    let input = Input::new(r.button_pin, Pull::Up);
    let mut btn = ButtonManager::new(input);
    btn.handle_button_press().await;
}
