// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt-driven transfers.
//!
//! The receive-full interrupt is the only interrupt we need: each frame
//! received is also the end of the frame sent, so the handler stores what
//! came in and loads the next queued byte in one go. When the transmit
//! queue runs dry the stream goes idle, and the main loop has to
//! [`kick`](crate::Rspi::kick) it to start again.
//!
//! The handler is the producer of `rx` and the consumer of `tx`; the main
//! loop is the other side of each.

use core::sync::atomic::{AtomicBool, Ordering};
use drv_rx64m_regs::rspi::RegisterBlock;
use fifo::Fifo;

pub struct Stream<const RX: usize, const TX: usize> {
    pub rx: Fifo<RX>,
    pub tx: Fifo<TX>,
    idle: AtomicBool,
}

impl<const RX: usize, const TX: usize> Stream<RX, TX> {
    pub const fn new() -> Self {
        Self {
            rx: Fifo::new(),
            tx: Fifo::new(),
            idle: AtomicBool::new(true),
        }
    }

    /// True when no frame is in flight.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    pub(crate) fn set_busy(&self) {
        self.idle.store(false, Ordering::Release);
    }

    /// Body of the receive-full interrupt handler.
    pub fn on_receive(&self, regs: &RegisterBlock) {
        self.rx.put(regs.spdr.read() as u8);
        if self.tx.length() > 0 {
            regs.spdr.write(self.tx.get().into());
        } else {
            self.idle.store(true, Ordering::Release);
        }
    }

    /// Moves received bytes into `buf`, returning how many.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.length());
        for b in &mut buf[..n] {
            *b = self.rx.get();
        }
        n
    }
}

impl<const RX: usize, const TX: usize> Default for Stream<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}
