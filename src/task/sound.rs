//! # Sound task
//! Plays the siren on the `DFPlayer` Mini while the alarm is triggered.
//!
//! The `DFPlayer` is only powered while the siren plays. It is powered on, initialized and started on
//! [`SoundCommand::Ring`], and powered off on [`SoundCommand::Silence`].
use crate::DfPlayerResources;
use crate::task::resources::Irqs;
use crate::task::task_messages::{SOUND_SIGNAL, SoundCommand};
use defmt::{Debug2Format, info, warn};
use dfplayer_async::{DfPlayer, Equalizer, PlayBackSource, TimeSource};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::uart::{BufferedUart, Config};
use embassy_time::{Delay, Duration, Instant, Timer};
use static_cell::StaticCell;

/// Track number of the siren on the SD card
const SIREN_TRACK: u16 = 1;
/// Siren volume, 0 to 30
const SIREN_VOLUME: u8 = 20;

/// Time source for the `DFPlayer` driver
struct EmbassyTimeSource;

impl TimeSource for EmbassyTimeSource {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn is_elapsed(&self, since: Self::Instant, timeout_ms: u64) -> bool {
        Instant::now().duration_since(since) >= Duration::from_millis(timeout_ms)
    }
}

/// Power up the `DFPlayer` and start the siren. Failures are logged, the alarm works without sound.
async fn ring(uart: &mut BufferedUart, pwr: &mut Output<'static>) {
    info!("Powering on the dfplayer");
    pwr.set_high();
    Timer::after(Duration::from_secs(1)).await;

    let feedback_enable = false; // fails to acknowledge when enabled
    let timeout_ms = 1_000;
    let reset_duration_override_ms = Some(1_000);

    let mut dfp = match DfPlayer::new(
        uart,
        feedback_enable,
        timeout_ms,
        EmbassyTimeSource,
        Delay,
        reset_duration_override_ms,
    )
    .await
    {
        Ok(dfp) => dfp,
        Err(e) => {
            warn!(
                "DfPlayer initialization failed with error {:?}",
                Debug2Format(&e)
            );
            return;
        }
    };

    let _ = dfp.set_volume(SIREN_VOLUME).await;
    Timer::after(Duration::from_millis(100)).await;
    let _ = dfp.set_equalizer(Equalizer::Classic).await;
    Timer::after(Duration::from_millis(100)).await;
    let _ = dfp.set_playback_source(PlayBackSource::SDCard).await;
    Timer::after(Duration::from_millis(100)).await;
    if let Err(e) = dfp.play(SIREN_TRACK).await {
        warn!("Failed to start the siren: {:?}", Debug2Format(&e));
    }
}

#[embassy_executor::task]
pub async fn sound(r: DfPlayerResources) {
    info!("Sound task started");

    let mut config = Config::default();
    config.baudrate = 9600;

    static TX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    static RX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut uart = BufferedUart::new(
        r.uart,
        r.tx_pin,
        r.rx_pin,
        Irqs,
        TX_BUFFER.init([0; 256]),
        RX_BUFFER.init([0; 256]),
        config,
    );

    let mut pwr = Output::new(r.power_pin, Level::Low);

    loop {
        match SOUND_SIGNAL.wait().await {
            SoundCommand::Ring => ring(&mut uart, &mut pwr).await,
            SoundCommand::Silence => {
                info!("Powering off the dfplayer");
                pwr.set_low();
            }
        }
    }
}
