//! Interrupt bindings shared by the tasks. The peripherals themselves are grouped in `main.rs`.
use embassy_rp::bind_interrupts;
use embassy_rp::i2c::InterruptHandler as I2cInterruptHandler;
use embassy_rp::peripherals::{I2C0, PIO0, UART1};
use embassy_rp::pio::InterruptHandler;
use embassy_rp::uart::BufferedInterruptHandler;

// bind the interrupts, on a global scope, the wifi, display and sound tasks all need them
bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
    I2C0_IRQ => I2cInterruptHandler<I2C0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});
