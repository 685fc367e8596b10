// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-channel waveform capture.
//!
//! A request asks for `n` samples and gets `n + 1`: the first sample after
//! the trigger is taken before the input settles and is never sent. The
//! sample timer interrupt runs [`Capture::tick`], the trigger pin interrupt
//! runs [`Capture::on_trigger`], and the main loop watches
//! [`Capture::busy`] to know when the buffers can be read.

use crate::config::SAMPLES;
use crate::hw::Sampler;
use core::sync::atomic::{AtomicU16, Ordering};

/// Most samples one request can ask for.
pub const MAX_SAMPLES: u16 = SAMPLES;

const SLOTS: usize = MAX_SAMPLES as usize + 1;

#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicU16 = AtomicU16::new(0);

pub struct Capture {
    /// Samples still to take.
    num: AtomicU16,
    /// Slot the next sample lands in.
    pos: AtomicU16,
    ch0: [AtomicU16; SLOTS],
    ch1: [AtomicU16; SLOTS],
    /// Samples to request when the trigger fires; 0 leaves it inert.
    count: AtomicU16,
    triggers: AtomicU16,
}

impl Capture {
    pub const fn new() -> Self {
        Self {
            num: ZERO,
            pos: ZERO,
            ch0: [ZERO; SLOTS],
            ch1: [ZERO; SLOTS],
            count: ZERO,
            triggers: ZERO,
        }
    }

    /// Starts capturing `n` samples (clamped to [`MAX_SAMPLES`]) plus the
    /// leading one. A request for 0 is ignored.
    pub fn request(&self, n: u16) {
        let n = n.min(MAX_SAMPLES);
        if n == 0 {
            return;
        }
        self.pos.store(0, Ordering::Relaxed);
        self.num.store(n + 1, Ordering::Release);
    }

    /// True while samples remain to be taken.
    pub fn busy(&self) -> bool {
        self.num.load(Ordering::Acquire) > 0
    }

    /// Body of the sample timer interrupt.
    pub fn tick(&self, adc: &impl Sampler) {
        let num = self.num.load(Ordering::Acquire);
        if num == 0 {
            return;
        }
        let [a, b] = adc.sample();
        let pos = self.pos.load(Ordering::Relaxed);
        if let (Some(c0), Some(c1)) =
            (self.ch0.get(pos as usize), self.ch1.get(pos as usize))
        {
            c0.store(a, Ordering::Relaxed);
            c1.store(b, Ordering::Relaxed);
        }
        self.pos.store(pos.wrapping_add(1), Ordering::Relaxed);
        // Last, so `busy` only drops once the sample is in place.
        self.num.store(num - 1, Ordering::Release);
    }

    /// Sets how many samples the next trigger captures.
    pub fn arm(&self, count: u16) {
        self.count.store(count, Ordering::Relaxed);
    }

    /// Body of the trigger pin interrupt.
    pub fn on_trigger(&self) {
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 {
            self.request(count);
        }
        let n = self.triggers.load(Ordering::Relaxed);
        self.triggers.store(n.wrapping_add(1), Ordering::Release);
    }

    /// Triggers seen so far, wrapping.
    pub fn triggers(&self) -> u16 {
        self.triggers.load(Ordering::Acquire)
    }

    /// Sample `i` of both channels. Slot 0 is the settling sample.
    pub fn sample(&self, i: usize) -> (u16, u16) {
        match (self.ch0.get(i), self.ch1.get(i)) {
            (Some(a), Some(b)) => {
                (a.load(Ordering::Relaxed), b.load(Ordering::Relaxed))
            }
            _ => (0, 0),
        }
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fake::CountingAdc;

    fn capture() -> &'static Capture {
        Box::leak(Box::new(Capture::new()))
    }

    fn run(c: &Capture, adc: &CountingAdc) -> usize {
        let mut ticks = 0;
        while c.busy() {
            c.tick(adc);
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn request_takes_one_extra_sample() {
        let (c, adc) = (capture(), CountingAdc::default());
        c.request(3);
        assert!(c.busy());
        assert_eq!(run(c, &adc), 4);

        for i in 0..4 {
            assert_eq!(c.sample(i), (i as u16, 1000 + i as u16));
        }
        assert_eq!(c.sample(4), (0, 0));

        // Idle ticks take nothing.
        c.tick(&adc);
        assert_eq!(adc.taken(), 4);
    }

    #[test]
    fn zero_request_is_ignored() {
        let c = capture();
        c.request(0);
        assert!(!c.busy());
    }

    #[test]
    fn oversized_request_is_clamped() {
        let (c, adc) = (capture(), CountingAdc::default());
        c.request(u16::MAX);
        assert_eq!(run(c, &adc), SLOTS);
        assert_eq!(c.sample(SLOTS - 1).0, MAX_SAMPLES);
    }

    #[test]
    fn new_request_restarts_at_slot_zero() {
        let (c, adc) = (capture(), CountingAdc::default());
        c.request(5);
        c.tick(&adc);
        c.tick(&adc);
        c.request(1);
        assert_eq!(run(c, &adc), 2);
        assert_eq!(c.sample(0).0, 2);
        assert_eq!(c.sample(1).0, 3);
    }

    #[test]
    fn trigger_requests_armed_count() {
        let (c, adc) = (capture(), CountingAdc::default());

        c.on_trigger();
        assert_eq!(c.triggers(), 1);
        assert!(!c.busy());

        c.arm(2);
        c.on_trigger();
        assert_eq!(c.triggers(), 2);
        assert_eq!(run(c, &adc), 3);
    }
}
