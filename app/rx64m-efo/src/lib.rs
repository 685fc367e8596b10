// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EFO waveform capture board.
//!
//! A comparator watches the signal against a threshold set by the D/A
//! converter. When it trips, the external IRQ starts a capture of both A/D
//! channels at the sample timer rate, and the main loop ships the result to
//! the host over the main serial port.
//!
//! The startup code owns the clocks and the vector table; it builds an
//! [`Efo`] from the [`board`] parts, starts the [`board::timers`], and then
//! loops on [`board::TICKS`]`.sync()` followed by [`Efo::poll`], forever.

#![cfg_attr(not(test), no_std)]

pub mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub mod board;
mod capture;
mod hw;
mod protocol;

pub use capture::{Capture, MAX_SAMPLES};
pub use hw::{Dac, IrqTrigger, Led, Port, Sampler, Trigger};
pub use protocol::{Command, Efo, SendTask, WAVE, ZERO_VOLT};
