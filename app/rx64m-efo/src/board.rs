// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static state and interrupt handlers for the EFO board.
//!
//! The startup code calls [`serial`], [`timers`] and [`trigger`] once the
//! clocks are running. The sample clock handler it passes to [`timers`]
//! runs [`Capture::tick`] on [`CAPTURE`] with whatever drives the A/D
//! converter.

use crate::capture::Capture;
use crate::config::*;
use crate::hw::IrqTrigger;
use drv_rx64m_regs::cmt;
use drv_rx64m_regs::sci::{self, RegisterBlock};
use drv_rx_cmt::{Cmt, Ticks};
use drv_rx_sci::{Buffers, Config, SciIo};
use drv_rx_sys_api::{Handler, PinOption, Sys};
use regmap::Reg;

pub static CAPTURE: Capture = Capture::new();

/// System tick count; the main loop runs one pass per tick.
pub static TICKS: Ticks = Ticks::new();

pub static DEBUG_BUFFERS: Buffers<DEBUG_RECV_FIFO, DEBUG_SEND_FIFO> =
    Buffers::new();
pub static MAIN_BUFFERS: Buffers<MAIN_RECV_FIFO, MAIN_SEND_FIFO> =
    Buffers::new();

pub type DebugPort<'a, S> = SciIo<'a, S, DEBUG_RECV_FIFO, DEBUG_SEND_FIFO>;
pub type MainPort<'a, S> = SciIo<'a, S, MAIN_RECV_FIFO, MAIN_SEND_FIFO>;

const fn sci_config(n: u8) -> Config {
    match Config::channel(n, PCLKB, PinOption::First) {
        Some(c) => c,
        None => panic!("no such SCI channel"),
    }
}

const fn sci_regs(n: u8) -> *const RegisterBlock {
    match sci::channel(n) {
        Some(r) => r,
        None => panic!("no such SCI channel"),
    }
}

const fn cmt_config(n: u8) -> drv_rx_cmt::Config {
    match drv_rx_cmt::Config::channel(n, PCLKB) {
        Some(c) => c,
        None => panic!("no such CMT channel"),
    }
}

const fn cmt_regs(n: u8) -> (*const cmt::RegisterBlock, *const Reg<u16>) {
    match cmt::channel(n) {
        Some((regs, cmstr, _)) => (regs, cmstr),
        None => panic!("no such CMT channel"),
    }
}

const DEBUG: Config = sci_config(DEBUG_SCI);
const MAIN: Config = sci_config(MAIN_SCI);
const DEBUG_REGS: *const RegisterBlock = sci_regs(DEBUG_SCI);
const MAIN_REGS: *const RegisterBlock = sci_regs(MAIN_SCI);
const TICK: drv_rx_cmt::Config = cmt_config(TICK_CMT);
const SAMPLE: drv_rx_cmt::Config = cmt_config(CAPTURE_CMT);
const TICK_REGS: (*const cmt::RegisterBlock, *const Reg<u16>) =
    cmt_regs(TICK_CMT);
const SAMPLE_REGS: (*const cmt::RegisterBlock, *const Reg<u16>) =
    cmt_regs(CAPTURE_CMT);

fn debug_rxi() {
    DEBUG_BUFFERS.on_receive(unsafe { &*DEBUG_REGS });
}

fn debug_txi() {
    DEBUG_BUFFERS.on_transmit(unsafe { &*DEBUG_REGS });
}

fn main_rxi() {
    MAIN_BUFFERS.on_receive(unsafe { &*MAIN_REGS });
}

fn main_txi() {
    MAIN_BUFFERS.on_transmit(unsafe { &*MAIN_REGS });
}

fn on_trigger() {
    CAPTURE.on_trigger();
}

fn on_tick() {
    TICKS.on_match();
}

fn attach_serial(sys: &impl Sys) {
    sys.attach(DEBUG.rxi, debug_rxi);
    sys.attach(DEBUG.txi, debug_txi);
    sys.attach(MAIN.rxi, main_rxi);
    sys.attach(MAIN.txi, main_txi);
}

fn attach_timers(sys: &impl Sys, sample: Handler) {
    sys.attach(TICK.vector, on_tick);
    sys.attach(SAMPLE.vector, sample);
}

/// Starts the system tick and the sample clock, returning them in that
/// order. `sample` runs on every sample clock match.
///
/// # Safety
///
/// Call once; the timers own their channels.
pub unsafe fn timers<S: Sys>(
    sys: &S,
    sample: Handler,
) -> Result<(Cmt<'_, S>, Cmt<'_, S>), drv_rx_cmt::Error> {
    attach_timers(sys, sample);

    let (regs, cmstr) = TICK_REGS;
    let mut tick = Cmt::new(&*regs, &*cmstr, sys, TICK);
    tick.start(TICK_RATE, TICK_LEVEL)?;

    let (regs, cmstr) = SAMPLE_REGS;
    let mut capture = Cmt::new(&*regs, &*cmstr, sys, SAMPLE);
    capture.start(CAPTURE_RATE, CAPTURE_LEVEL)?;

    Ok((tick, capture))
}

/// Brings up the debug and host ports. The host port carries binary frames,
/// so it gets no CR/LF translation.
///
/// # Safety
///
/// Call once; the ports own their channels.
pub unsafe fn serial<S: Sys>(
    sys: &S,
) -> Result<(DebugPort<'_, S>, MainPort<'_, S>), drv_rx_sci::Error> {
    attach_serial(sys);

    let mut debug = SciIo::new(&*DEBUG_REGS, sys, &DEBUG_BUFFERS, DEBUG);
    debug.start(DEBUG_BAUD, DEBUG_LEVEL)?;

    let mut main = SciIo::new(&*MAIN_REGS, sys, &MAIN_BUFFERS, MAIN);
    main.start(MAIN_BAUD, MAIN_LEVEL)?;
    main.auto_crlf(false);

    Ok((debug, main))
}

/// The comparator input, wired to [`CAPTURE`].
pub fn trigger<S: Sys>(sys: &S) -> IrqTrigger<'_, S> {
    IrqTrigger::new(sys, TRIGGER_IRQ, TRIGGER_PINS, TRIGGER_LEVEL, on_trigger)
}
