//! # Perimeter alarm core
//! The hardware independent part of the perimeter alarm: sampling the ranging sensor, the alarm state machine,
//! the acknowledge flag shared with the button, decoding of remote twin documents and direct methods,
//! and the decision what to report to the hub and when.
//!
//! The firmware in `main.rs` wires these pieces to the RP2040 peripherals and the network. Everything in here
//! also builds on the host, which is where the tests run.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ack;
pub mod alarm;
pub mod config;
pub mod error;
pub mod hub;
pub mod monitor;
pub mod range;
pub mod remote;
pub mod telemetry;
