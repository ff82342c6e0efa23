//! # Pico perimeter alarm firmware
//! Wires the alarm core to the hardware of the Pico W: the ultrasonic sensor, the acknowledge button, the OLED
//! display, the `DFPlayer` for the siren and the `WiFi` chip for the hub connection.

// we are in an environment with constrained resources, so we do not use the standard library and we define a different entry point.
#![no_std]
#![no_main]

use defmt::info;
use embassy_executor::Spawner;
use embassy_rp::{Peri, peripherals};
use {defmt_rtt as _, panic_probe as _};

mod task;

// group the peripherals into resources, each task gets the group it needs
assign_resources::assign_resources! {
    sensor: SensorResources {
        trigger_pin: PIN_2,
        echo_pin: PIN_3,
    },
    ack_button: AckButtonResources {
        button_pin: PIN_20,
    },
    wifi: WifiResources {
        pwr_pin: PIN_23,
        cs_pin: PIN_25,
        pio_sm: PIO0,
        dio_pin: PIN_24,
        clk_pin: PIN_29,
        dma_ch: DMA_CH0,
    },
    display: DisplayResources {
        scl: PIN_13,
        sda: PIN_12,
        i2c0: I2C0,
    },
    dfplayer: DfPlayerResources {
        uart: UART1,
        tx_pin: PIN_4,
        rx_pin: PIN_5,
        power_pin: PIN_8, // not a part of the dfplayer, a mosfet switches its power because it draws too much current when idle
    },
    status: StatusResources {
        watchdog: WATCHDOG,
    },
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Program start");

    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    spawner.must_spawn(task::alarm_cycle::alarm_cycle(r.sensor, r.status));
    spawner.must_spawn(task::buttons::ack_button(r.ack_button));
    spawner.must_spawn(task::display::display(r.display));
    spawner.must_spawn(task::sound::sound(r.dfplayer));
    spawner.must_spawn(task::cloud::cloud(spawner, r.wifi));
}
