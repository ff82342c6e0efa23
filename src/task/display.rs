//! # Display task
//! Shows the alarm state, the latest distance and the hub link on the OLED display.
//!
//! The task redraws whenever the alarm cycle signals a new [`DisplayUpdate`], and only if something visible changed.
use crate::DisplayResources;
use crate::task::resources::Irqs;
use crate::task::task_messages::{DISPLAY_SIGNAL, DisplayUpdate};
use core::fmt::Write;
use defmt::{Debug2Format, error, info, warn};
use embassy_rp::i2c::{Config, I2c};
use embedded_graphics::{
    mono_font::{
        MonoTextStyleBuilder,
        ascii::{FONT_6X13, FONT_9X18_BOLD},
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use pico_perimeter_alarm::range::NO_ECHO_DISTANCE_CM;
use ssd1306_async::{I2CDisplayInterface, Ssd1306, prelude::*};

/// Where the alarm state goes, large
const STATE_POSITION: Point = Point::new(0, 4);
/// Where the distance goes
const DISTANCE_POSITION: Point = Point::new(0, 30);
/// Where the hub link status goes
const LINK_POSITION: Point = Point::new(0, 50);

/// Draw one frame into the display buffer
fn render<D>(target: &mut D, update: &DisplayUpdate) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let large = MonoTextStyleBuilder::new()
        .font(&FONT_9X18_BOLD)
        .text_color(BinaryColor::On)
        .build();
    let small = MonoTextStyleBuilder::new()
        .font(&FONT_6X13)
        .text_color(BinaryColor::On)
        .build();

    Text::with_baseline(update.state.label(), STATE_POSITION, large, Baseline::Top)
        .draw(target)?;

    let mut distance = heapless::String::<24>::new();
    // 24 chars always fit the longest line
    let _ = if update.distance_cm >= NO_ECHO_DISTANCE_CM {
        write!(distance, "Distance: --")
    } else {
        write!(distance, "Distance: {:.0} cm", update.distance_cm)
    };
    Text::with_baseline(&distance, DISTANCE_POSITION, small, Baseline::Top).draw(target)?;

    let link = if update.hub_connected {
        "Hub: online"
    } else {
        "Hub: offline"
    };
    Text::with_baseline(link, LINK_POSITION, small, Baseline::Top).draw(target)?;

    Ok(())
}

/// Whether two updates look different on screen
fn visibly_differs(a: &DisplayUpdate, b: &DisplayUpdate) -> bool {
    #[allow(clippy::cast_possible_truncation)]
    let rounded = |cm: f32| cm as i32;
    a.state != b.state
        || a.hub_connected != b.hub_connected
        || rounded(a.distance_cm) != rounded(b.distance_cm)
}

#[embassy_executor::task]
pub async fn display(r: DisplayResources) {
    info!("Display task started");

    let mut config = Config::default();
    config.frequency = 400_000;
    let i2c = I2c::new_async(r.i2c0, r.scl, r.sda, Irqs, config);

    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    if let Err(e) = display.init().await {
        error!("Failed to initialize display: {}", Debug2Format(&e));
        return;
    }
    if let Err(e) = display.set_brightness(Brightness::DIM).await {
        warn!("Failed to dim display: {}", Debug2Format(&e));
    }

    let mut shown: Option<DisplayUpdate> = None;

    loop {
        // Wait for a signal to update the display
        let update = DISPLAY_SIGNAL.wait().await;
        if shown.is_some_and(|shown| !visibly_differs(&shown, &update)) {
            continue;
        }

        // prepare the display, note that nothing is sent to the display before flush()
        display.clear();
        if render(&mut display, &update).is_err() {
            warn!("Failed to draw frame");
            continue;
        }

        match display.flush().await {
            Ok(()) => shown = Some(update),
            Err(e) => warn!("Failed to flush display: {}", Debug2Format(&e)),
        }
    }
}
