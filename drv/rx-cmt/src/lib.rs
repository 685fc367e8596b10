// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RX compare match timer driver.
//!
//! A channel counts PCLK / 8, 32, 128 or 512 up to its compare value and
//! raises CMI on the match, so all it gives us is a periodic interrupt. The
//! firmware uses one channel for the system tick and one as the sample
//! clock.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicU32, Ordering};
use drv_rx64m_regs::cmt::{self, cmcr, RegisterBlock};
use drv_rx64m_regs::icu::vector;
use drv_rx_sys_api::{Peripheral, Sys, Vector};
use regmap::{Field, Reg};
use ringbuf::*;

/// Clock select and compare value for one rate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Divider {
    pub cks: u8,
    pub cmcor: u16,
}

impl Divider {
    /// Rate this setting actually runs at, in Hz.
    pub const fn rate(self, pclk: u32) -> u32 {
        pclk / prescale(self.cks) / (self.cmcor as u32 + 1)
    }
}

const fn prescale(cks: u8) -> u32 {
    8 << (2 * cks)
}

/// Picks the finest clock select whose counter can reach `rate`, with the
/// compare value rounded to nearest. `None` if `rate` is zero, faster than
/// PCLK / 8, or too slow for PCLK / 512.
pub fn compute(rate: u32, pclk: u32) -> Option<Divider> {
    if rate == 0 {
        return None;
    }
    (0..4u8).find_map(|cks| {
        let count = (pclk / prescale(cks) + rate / 2) / rate;
        let cmcor = u16::try_from(count.checked_sub(1)?).ok()?;
        Some(Divider { cks, cmcor })
    })
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// No clock select reaches the rate. Nothing was touched.
    RateOutOfRange,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Start(Peripheral, u32, Divider),
    BadRate(Peripheral, u32),
    Stop(Peripheral),
}

ringbuf!(Trace, 8, Trace::None);

/// What a channel is bound to.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub peripheral: Peripheral,
    /// PCLKB in Hz.
    pub pclk: u32,
    pub vector: Vector,
    /// The channel's bit in its pair's start register.
    pub start: Field,
}

impl Config {
    pub const fn channel(n: u8, pclk: u32) -> Option<Self> {
        let (peripheral, v) = match n {
            0 => (Peripheral::Cmt0, vector::CMI0),
            1 => (Peripheral::Cmt1, vector::CMI1),
            2 => (Peripheral::Cmt2, vector::CMI2),
            3 => (Peripheral::Cmt3, vector::CMI3),
            _ => return None,
        };
        let start = match cmt::channel(n) {
            Some((_, _, bit)) => bit,
            None => return None,
        };
        Some(Self {
            peripheral,
            pclk,
            vector: Vector(v),
            start,
        })
    }
}

/// Match count shared between a channel's handler and the main loop.
pub struct Ticks {
    count: AtomicU32,
}

impl Ticks {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Body of the CMI handler.
    pub fn on_match(&self) {
        // Single writer, so load/store is enough.
        let n = self.count.load(Ordering::Relaxed);
        self.count.store(n.wrapping_add(1), Ordering::Release);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Waits for the next match.
    pub fn sync(&self) {
        let n = self.count();
        while self.count() == n {
            core::hint::spin_loop();
        }
    }
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Cmt<'a, S: Sys> {
    regs: &'a RegisterBlock,
    cmstr: &'a Reg<u16>,
    sys: &'a S,
    config: Config,
    level: u8,
}

impl<'a, S: Sys> Cmt<'a, S> {
    /// Binds a driver to a channel and its pair's start register.
    pub fn new(
        regs: &'a RegisterBlock,
        cmstr: &'a Reg<u16>,
        sys: &'a S,
        config: Config,
    ) -> Self {
        Self {
            regs,
            cmstr,
            sys,
            config,
            level: 0,
        }
    }

    /// Powers the channel and starts it matching at `rate` Hz.
    ///
    /// `level` is the CMI priority; with 0 the interrupt stays off. The
    /// caller attaches the handler beforehand.
    pub fn start(&mut self, rate: u32, level: u8) -> Result<Divider, Error> {
        let Config {
            peripheral,
            pclk,
            vector,
            start,
        } = self.config;

        let Some(d) = compute(rate, pclk) else {
            ringbuf_entry!(Trace::BadRate(peripheral, rate));
            return Err(Error::RateOutOfRange);
        };

        self.sys.power(peripheral, true);
        self.cmstr.clear_bit(start);

        let r = self.regs;
        r.cmcr.write_fields(&[
            (cmcr::RESERVED, 1),
            (cmcr::CMIE, u32::from(level > 0)),
            (cmcr::CKS, d.cks.into()),
        ]);
        r.cmcnt.write(0);
        r.cmcor.write(d.cmcor);

        self.level = level;
        if level > 0 {
            self.sys.set_interrupt(vector, level);
        }
        self.cmstr.set_bit(start);

        ringbuf_entry!(Trace::Start(peripheral, rate, d));
        Ok(d)
    }

    pub fn is_running(&self) -> bool {
        self.cmstr.is_set(self.config.start)
    }

    /// Stops the count, masks the interrupt and powers the channel down.
    /// The other channel of the pair keeps running.
    pub fn stop(&mut self) {
        self.cmstr.clear_bit(self.config.start);
        if self.level > 0 {
            self.sys.set_interrupt(self.config.vector, 0);
            self.level = 0;
        }
        self.sys.power(self.config.peripheral, false);
        ringbuf_entry!(Trace::Stop(self.config.peripheral));
    }
}

/// Binds CMT channel `n`, or returns `None` if the part has no such channel.
///
/// # Safety
///
/// The caller must make this the only driver instance for the channel.
pub unsafe fn cmt<S: Sys>(n: u8, sys: &S, pclk: u32) -> Option<Cmt<'_, S>> {
    let (regs, cmstr, _) = cmt::channel(n)?;
    let config = Config::channel(n, pclk)?;
    Some(Cmt::new(&*regs, &*cmstr, sys, config))
}
