// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RX RSPI master driver.
//!
//! A channel goes through three states:
//!
//! - `Disabled`: peripheral off, pins not routed. The state after
//!   construction and after [`Rspi::teardown`].
//! - `Configured`: rate, mode and frame length applied; momentary, inside
//!   [`Rspi::start`].
//! - `Enabled`: ready for exchanges.
//!
//! Transfers are either blocking ([`Rspi::exchange`] and friends, which spin
//! on the receive-full flag with no timeout), split into a start and a sync
//! half, or interrupt-driven through a [`Stream`] of two FIFOs.
//!
//! Nothing checks that the channel is enabled before a transfer. Exchanging
//! on a disabled channel waits forever for a flag that never comes; that's a
//! bug in the caller, and so is leaving the channel hung on unresponsive
//! hardware.

#![cfg_attr(not(test), no_std)]

mod divider;
mod stream;

pub use divider::{compute, Divider, OutOfRange};
pub use stream::Stream;

use core::convert::Infallible;
use drv_rx64m_regs::icu::vector;
use drv_rx64m_regs::rspi::{self, spcmd, spcr, spdcr, spsr, RegisterBlock};
use drv_rx_sys_api::{Peripheral, PinOption, Sys, SysError, Vector};
use embedded_hal::spi;
use ringbuf::*;

/// Clock polarity and phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// CPOL 0, CPHA 0 (mode 0)
    Type1,
    /// CPOL 0, CPHA 1 (mode 1)
    Type2,
    /// CPOL 1, CPHA 0 (mode 2)
    Type3,
    /// CPOL 1, CPHA 1 (mode 3)
    Type4,
}

impl Phase {
    /// `(CPOL, CPHA)`
    pub const fn bits(self) -> (u32, u32) {
        match self {
            Phase::Type1 => (0, 0),
            Phase::Type2 => (0, 1),
            Phase::Type3 => (1, 0),
            Phase::Type4 => (1, 1),
        }
    }
}

impl From<spi::Mode> for Phase {
    fn from(mode: spi::Mode) -> Self {
        use spi::{Phase as P, Polarity as C};
        match (mode.polarity, mode.phase) {
            (C::IdleLow, P::CaptureOnFirstTransition) => Phase::Type1,
            (C::IdleLow, P::CaptureOnSecondTransition) => Phase::Type2,
            (C::IdleHigh, P::CaptureOnFirstTransition) => Phase::Type3,
            (C::IdleHigh, P::CaptureOnSecondTransition) => Phase::Type4,
        }
    }
}

/// Frame length. The discriminants are the SPB encodings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum WordLength {
    W8 = 0b0111,
    W9 = 0b1000,
    W10 = 0b1001,
    W11 = 0b1010,
    W12 = 0b1011,
    W13 = 0b1100,
    W14 = 0b1101,
    W15 = 0b1110,
    W16 = 0b1111,
    W20 = 0b0000,
    W24 = 0b0001,
    W32 = 0b0011,
}

impl WordLength {
    pub const fn spb(self) -> u32 {
        self as u32
    }

    /// Bits per frame.
    pub const fn bits(self) -> u32 {
        match self {
            WordLength::W20 => 20,
            WordLength::W24 => 24,
            WordLength::W32 => 32,
            // W8..W16 encode as bits - 1.
            w => w as u32 + 1,
        }
    }
}

/// SPB for the SD card setup. Any of 0b0100..=0b0111 selects 8-bit frames;
/// this is the one that setup has always used.
const SPB_SD_CARD: u32 = 0b0100;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    Disabled,
    Configured,
    Enabled,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Requested rate is out of reach. The channel is running anyway, at
    /// the clamped (slowest) setting.
    SpeedOutOfRange { clamped: Divider },
    /// The chosen pin option doesn't exist for this channel. Nothing was
    /// enabled.
    Pins(SysError),
    /// Receive overrun seen by the non-blocking interface.
    Overrun,
}

impl From<OutOfRange> for Error {
    fn from(e: OutOfRange) -> Self {
        Error::SpeedOutOfRange { clamped: e.clamped }
    }
}

/// What a channel is bound to. Fixed per physical channel, so usually a
/// const.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub peripheral: Peripheral,
    pub pins: PinOption,
    /// Clock feeding the peripheral (PCLKA on RX64M), in Hz.
    pub pclk: u32,
    /// Receive-full interrupt (SPRI).
    pub receive_vector: Vector,
}

impl Config {
    pub const fn rspi0(pclk: u32, pins: PinOption) -> Self {
        Self {
            peripheral: Peripheral::Rspi0,
            pins,
            pclk,
            receive_vector: Vector(vector::SPRI0),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Start(u32, Divider),
    Clamped(u32),
    SdCard(u32, Divider),
    NoPins(SysError),
    Teardown(bool),
    Overrun,
}

ringbuf!(Trace, 16, Trace::None);

pub struct Rspi<'a, S: Sys> {
    regs: &'a RegisterBlock,
    sys: &'a S,
    config: Config,
    level: u8,
    state: State,
}

impl<'a, S: Sys> Rspi<'a, S> {
    /// Binds a driver to a channel. Nothing is touched until `start`.
    pub fn new(regs: &'a RegisterBlock, sys: &'a S, config: Config) -> Self {
        Self {
            regs,
            sys,
            config,
            level: 0,
            state: State::Disabled,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Fastest rate the channel can be configured for.
    pub fn max_speed(&self) -> u32 {
        self.config.pclk / 2
    }

    /// Configures and enables the channel as master.
    ///
    /// `level` is the receive interrupt priority; 0 means polled operation.
    /// With a nonzero level the caller must already have attached a
    /// handler that calls [`Stream::on_receive`].
    ///
    /// If `speed` can't be reached the channel is still enabled, at the
    /// slowest rate, and the error says so.
    pub fn start(
        &mut self,
        speed: u32,
        phase: Phase,
        width: WordLength,
        level: u8,
    ) -> Result<Divider, Error> {
        let Config {
            peripheral, pins, ..
        } = self.config;
        self.level = level;

        self.regs.spcr.write(0);
        self.state = State::Disabled;

        if let Err(e) = self.sys.enable_pins(peripheral, pins) {
            ringbuf_entry!(Trace::NoPins(e));
            return Err(Error::Pins(e));
        }

        let divider = divider::compute(speed, self.config.pclk);
        let d = divider.unwrap_or_else(|e| e.clamped);

        self.sys.power(peripheral, true);

        let (cpol, cpha) = phase.bits();
        self.apply(
            d,
            &[
                (spcmd::BRDV, d.brdv.into()),
                (spcmd::SPB, width.spb()),
                (spcmd::CPOL, cpol),
                (spcmd::CPHA, cpha),
            ],
        );

        match divider {
            Ok(d) => ringbuf_entry!(Trace::Start(speed, d)),
            Err(_) => ringbuf_entry!(Trace::Clamped(speed)),
        }
        divider.map_err(Error::from)
    }

    /// Configures the channel for an SD card: 8-bit frames, mode 0, polled.
    ///
    /// Unlike `start` this powers the module before routing its pins.
    pub fn start_sd_card(&mut self, speed: u32) -> Result<Divider, Error> {
        let Config {
            peripheral, pins, ..
        } = self.config;
        self.level = 0;

        self.regs.spcr.write(0);
        self.state = State::Disabled;

        let divider = divider::compute(speed, self.config.pclk);
        let d = divider.unwrap_or_else(|e| e.clamped);

        self.sys.power(peripheral, true);
        if let Err(e) = self.sys.enable_pins(peripheral, pins) {
            ringbuf_entry!(Trace::NoPins(e));
            self.sys.power(peripheral, false);
            return Err(Error::Pins(e));
        }

        self.apply(
            d,
            &[(spcmd::BRDV, d.brdv.into()), (spcmd::SPB, SPB_SD_CARD)],
        );

        match divider {
            Ok(d) => ringbuf_entry!(Trace::SdCard(speed, d)),
            Err(_) => ringbuf_entry!(Trace::Clamped(speed)),
        }
        divider.map_err(Error::from)
    }

    /// Common tail of the two start paths: program the rate and command,
    /// set master mode, enable last.
    fn apply(&mut self, d: Divider, command: &[(regmap::Field, u32)]) {
        let r = self.regs;

        r.spbr.write(d.spbr);
        // Fixed idle levels, no loopback; no command sequencing; longword
        // access to SPDR.
        r.sppcr.write(0);
        r.spscr.write(0);
        r.spdcr.write_fields(&[(spdcr::SPLW, 1)]);
        r.spcmd[0].write_fields(command);
        self.state = State::Configured;

        r.spcr.set_bit(spcr::SPMS);
        r.spcr.set_bit(spcr::MSTR);
        if self.level > 0 {
            self.sys.set_interrupt(self.config.receive_vector, self.level);
            r.spcr.set_bit(spcr::SPRIE);
        }
        r.spcr.set_bit(spcr::SPE);
        self.state = State::Enabled;
    }

    /// Sends one byte and returns the byte clocked in with it.
    pub fn exchange(&mut self, byte: u8) -> u8 {
        self.exchange32(byte.into()) as u8
    }

    /// Sends one frame of up to 32 bits and returns the frame clocked in.
    pub fn exchange32(&mut self, word: u32) -> u32 {
        self.start_transfer(word);
        self.sync_transfer()
    }

    /// First half of a split exchange: loads the frame and returns without
    /// waiting, so the caller can do something useful during the transfer.
    pub fn start_transfer(&mut self, word: u32) {
        self.regs.spdr.write(word);
    }

    /// Polls for the frame started by [`Rspi::start_transfer`].
    pub fn read_transfer(&mut self) -> nb::Result<u32, Infallible> {
        if self.regs.spsr.is_set(spsr::SPRF) {
            Ok(self.regs.spdr.read())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Second half of a split exchange: waits for and returns the received
    /// frame.
    pub fn sync_transfer(&mut self) -> u32 {
        nb::block!(self.read_transfer()).unwrap_or_else(|e| match e {})
    }

    pub fn send(&mut self, data: &[u8]) {
        for &b in data {
            self.exchange(b);
        }
    }

    /// Fills `buf`, clocking out 0xff for each byte.
    pub fn receive(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.exchange(0xff);
        }
    }

    /// Disables the channel and releases its pins, and unless `power_down`
    /// is false also stops the module. Safe to repeat.
    pub fn teardown(&mut self, power_down: bool) {
        self.regs.spcr.write(0);
        if self.level > 0 {
            self.sys.set_interrupt(self.config.receive_vector, 0);
            self.level = 0;
        }
        self.sys.disable_pins(self.config.peripheral);
        if power_down {
            self.sys.power(self.config.peripheral, false);
        }
        self.state = State::Disabled;
        ringbuf_entry!(Trace::Teardown(power_down));
    }

    /// Primes an idle stream with its next queued byte. The receive
    /// interrupt keeps it going from there until the queue runs dry.
    pub fn kick<const RX: usize, const TX: usize>(
        &self,
        stream: &Stream<RX, TX>,
    ) {
        // The handler sets idle and stops feeding in one go, so we must not
        // be interrupted between checking idle and taking it over.
        critical_section::with(|_| {
            if stream.is_idle() && stream.tx.length() > 0 {
                stream.set_busy();
                self.regs.spdr.write(stream.tx.get().into());
            }
        });
    }

    /// Queues as much of `data` as the stream has room for, starts it if
    /// it was idle, and returns how many bytes were taken.
    pub fn write_stream<const RX: usize, const TX: usize>(
        &self,
        stream: &Stream<RX, TX>,
        data: &[u8],
    ) -> usize {
        // Keep one slot free so a full queue doesn't read as empty.
        let room = TX - 1 - stream.tx.length();
        let n = data.len().min(room);
        for &b in &data[..n] {
            stream.tx.put(b);
        }
        self.kick(stream);
        n
    }
}

impl<S: Sys> spi::FullDuplex<u8> for Rspi<'_, S> {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u8, Error> {
        let sr = &self.regs.spsr;
        if sr.is_set(spsr::OVRF) {
            sr.clear_bit(spsr::OVRF);
            ringbuf_entry!(Trace::Overrun);
            return Err(nb::Error::Other(Error::Overrun));
        }
        self.read_transfer()
            .map(|w| w as u8)
            .map_err(|e| e.map(|e| match e {}))
    }

    fn send(&mut self, byte: u8) -> nb::Result<(), Error> {
        if self.regs.spsr.is_set(spsr::SPTEF) {
            self.start_transfer(byte.into());
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<S: Sys> embedded_hal::blocking::spi::transfer::Default<u8>
    for Rspi<'_, S>
{
}

impl<S: Sys> embedded_hal::blocking::spi::write::Default<u8> for Rspi<'_, S> {}

/// Binds `RSPI0`.
///
/// # Safety
///
/// The caller must make this the only driver instance for the channel.
pub unsafe fn rspi0<S: Sys>(
    sys: &S,
    pclk: u32,
    pins: PinOption,
) -> Rspi<'_, S> {
    Rspi::new(&*rspi::RSPI0, sys, Config::rspi0(pclk, pins))
}
