// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The board parts the application talks to.

use drv_rx64m_regs::icu::vector;
use drv_rx_sci::SciIo;
use drv_rx_sys_api::{Edge, Handler, Peripheral, PinOption, Sys, SysError, Vector};

/// Two-channel A/D converter (the LTC2348 on this board).
///
/// Called from both the sample timer interrupt and the main loop, so
/// implementations must cope with being preempted by themselves.
pub trait Sampler {
    /// Converts and returns both channels.
    fn sample(&self) -> [u16; 2];
}

/// Trigger threshold D/A output.
pub trait Dac {
    /// Sets channel 0. Code 32768 is 0 V.
    fn out0(&mut self, code: u16);
}

/// Comparator input that starts a capture.
pub trait Trigger {
    /// Configures the edge and enables the interrupt.
    fn arm(&mut self, edge: Edge) -> Result<(), SysError>;
}

pub trait Led {
    fn set(&mut self, on: bool);
}

/// Byte stream to the host.
pub trait Port: core::fmt::Write {
    fn recv_length(&self) -> usize;
    fn getch(&mut self) -> u8;
    fn putch(&mut self, c: u8);
}

impl<S: Sys, const RX: usize, const TX: usize> Port for SciIo<'_, S, RX, TX> {
    fn recv_length(&self) -> usize {
        SciIo::recv_length(self)
    }

    fn getch(&mut self) -> u8 {
        SciIo::getch(self)
    }

    fn putch(&mut self, c: u8) {
        SciIo::putch(self, c)
    }
}

/// An external IRQ line used as the trigger.
pub struct IrqTrigger<'a, S: Sys> {
    sys: &'a S,
    irq: u8,
    pins: PinOption,
    level: u8,
    handler: Handler,
}

impl<'a, S: Sys> IrqTrigger<'a, S> {
    pub fn new(
        sys: &'a S,
        irq: u8,
        pins: PinOption,
        level: u8,
        handler: Handler,
    ) -> Self {
        Self {
            sys,
            irq,
            pins,
            level,
            handler,
        }
    }

    pub fn vector(&self) -> Vector {
        Vector(vector::IRQ0 + self.irq)
    }
}

impl<S: Sys> Trigger for IrqTrigger<'_, S> {
    fn arm(&mut self, edge: Edge) -> Result<(), SysError> {
        let v = self.vector();
        // Masked while the edge changes; a stale request is dropped.
        self.sys.set_interrupt(v, 0);
        self.sys.enable_pins(Peripheral::Irq(self.irq), self.pins)?;
        self.sys.set_irq_edge(self.irq, edge)?;
        self.sys.attach(v, self.handler);
        self.sys.set_interrupt(v, self.level);
        Ok(())
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use core::cell::Cell;
    use std::collections::VecDeque;

    /// Channel 0 counts up from 0 and channel 1 from 1000, one step per
    /// conversion.
    #[derive(Default)]
    pub struct CountingAdc {
        next: Cell<u16>,
    }

    impl CountingAdc {
        pub fn taken(&self) -> u16 {
            self.next.get()
        }
    }

    impl Sampler for CountingAdc {
        fn sample(&self) -> [u16; 2] {
            let n = self.next.get();
            self.next.set(n + 1);
            [n, 1000 + n]
        }
    }

    #[derive(Default)]
    pub struct FakeDac {
        pub codes: Vec<u16>,
    }

    impl Dac for FakeDac {
        fn out0(&mut self, code: u16) {
            self.codes.push(code);
        }
    }

    #[derive(Default)]
    pub struct FakeTrigger {
        pub edges: Vec<Edge>,
        pub fail: Option<SysError>,
    }

    impl Trigger for FakeTrigger {
        fn arm(&mut self, edge: Edge) -> Result<(), SysError> {
            match self.fail {
                Some(e) => Err(e),
                None => {
                    self.edges.push(edge);
                    Ok(())
                }
            }
        }
    }

    #[derive(Default)]
    pub struct FakeLed {
        pub on: bool,
    }

    impl Led for FakeLed {
        fn set(&mut self, on: bool) {
            self.on = on;
        }
    }

    /// Host side of the serial link.
    #[derive(Default)]
    pub struct FakePort {
        pub rx: VecDeque<u8>,
        pub tx: Vec<u8>,
    }

    impl FakePort {
        pub fn feed(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes);
        }

        pub fn take(&mut self) -> Vec<u8> {
            core::mem::take(&mut self.tx)
        }
    }

    impl core::fmt::Write for FakePort {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.tx.extend_from_slice(s.as_bytes());
            Ok(())
        }
    }

    impl Port for FakePort {
        fn recv_length(&self) -> usize {
            self.rx.len()
        }

        fn getch(&mut self) -> u8 {
            self.rx.pop_front().unwrap_or(0)
        }

        fn putch(&mut self, c: u8) {
            self.tx.push(c);
        }
    }
}
