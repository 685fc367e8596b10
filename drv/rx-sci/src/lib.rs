// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RX SCI asynchronous serial driver.
//!
//! With an interrupt level of 0 the channel is polled: `putch` spins on the
//! transmit-empty flag and `getch` on receive-full. With a nonzero level the
//! receive and transmit-empty interrupts move bytes between the data
//! registers and a pair of FIFOs in [`Buffers`], which the firmware keeps in
//! a static and feeds from its vector handlers.

#![cfg_attr(not(test), no_std)]

mod baud;

pub use baud::{compute as baud_divider, BaudDivider};

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use drv_rx64m_regs::icu::vector;
use drv_rx64m_regs::sci::{self, scr, semr, smr, ssr, RegisterBlock};
use drv_rx_sys_api::{Peripheral, PinOption, Sys, SysError, Vector};
use fifo::Fifo;
use ringbuf::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// No divider setting reaches the baud rate. Nothing was touched.
    BaudOutOfRange,
    /// The chosen pin option doesn't exist for this channel.
    Pins(SysError),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Start(Peripheral, u32, BaudDivider),
    BadBaud(Peripheral, u32),
    NoPins(Peripheral, SysError),
    RxError(u8),
    Stop(Peripheral),
}

ringbuf!(Trace, 16, Trace::None);

/// What a channel is bound to.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub peripheral: Peripheral,
    pub pins: PinOption,
    /// PCLKB in Hz.
    pub pclk: u32,
    pub rxi: Vector,
    pub txi: Vector,
}

impl Config {
    pub const fn new(
        peripheral: Peripheral,
        pins: PinOption,
        pclk: u32,
        rxi: u8,
        txi: u8,
    ) -> Self {
        Self {
            peripheral,
            pins,
            pclk,
            rxi: Vector(rxi),
            txi: Vector(txi),
        }
    }

    /// Binding for channel `n`, if the part has it.
    pub const fn channel(n: u8, pclk: u32, pins: PinOption) -> Option<Self> {
        use vector::*;
        let (p, rxi, txi) = match n {
            0 => (Peripheral::Sci0, RXI0, TXI0),
            1 => (Peripheral::Sci1, RXI1, TXI1),
            2 => (Peripheral::Sci2, RXI2, TXI2),
            3 => (Peripheral::Sci3, RXI3, TXI3),
            4 => (Peripheral::Sci4, RXI4, TXI4),
            5 => (Peripheral::Sci5, RXI5, TXI5),
            6 => (Peripheral::Sci6, RXI6, TXI6),
            7 => (Peripheral::Sci7, RXI7, TXI7),
            12 => (Peripheral::Sci12, RXI12, TXI12),
            _ => return None,
        };
        Some(Self::new(p, pins, pclk, rxi, txi))
    }

    pub const fn sci0(pclk: u32, pins: PinOption) -> Self {
        Self::new(Peripheral::Sci0, pins, pclk, vector::RXI0, vector::TXI0)
    }
}

/// Queues shared between a channel's interrupt handlers and the main loop.
///
/// The receive handler produces into `recv`; the transmit handler consumes
/// `send`. When `send` runs dry the transmitter stalls with its interrupt
/// masked, and the next `putch` restarts it.
pub struct Buffers<const RX: usize, const TX: usize> {
    pub recv: Fifo<RX>,
    pub send: Fifo<TX>,
    stalled: AtomicBool,
    errors: AtomicU32,
}

impl<const RX: usize, const TX: usize> Buffers<RX, TX> {
    /// `putch` waits while the send queue holds this many bytes. Must be at
    /// least 1, or it would wait forever on an empty queue.
    pub const HIGH_WATER: usize = {
        assert!(TX * 7 / 8 > 0, "send queue needs at least 2 slots");
        TX * 7 / 8
    };

    pub const fn new() -> Self {
        let _ = Self::HIGH_WATER;
        Self {
            recv: Fifo::new(),
            send: Fifo::new(),
            stalled: AtomicBool::new(true),
            errors: AtomicU32::new(0),
        }
    }

    /// Body of the RXI handler.
    pub fn on_receive(&self, regs: &RegisterBlock) {
        self.recv.put(regs.rdr.read());
    }

    /// Body of the TXI handler.
    pub fn on_transmit(&self, regs: &RegisterBlock) {
        if self.send.length() > 0 {
            regs.tdr.write(self.send.get());
        } else {
            self.stalled.store(true, Ordering::Release);
            regs.scr.clear_bit(scr::TIE);
        }
    }

    /// Body of the receive error handler: counts and clears any of the
    /// overrun, framing and parity flags.
    pub fn on_error(&self, regs: &RegisterBlock) {
        let flags = regs.ssr.read() & ssr::ERRORS;
        if flags != 0 {
            // Single writer, so load/store is enough.
            let n = self.errors.load(Ordering::Relaxed);
            self.errors.store(n.wrapping_add(1), Ordering::Relaxed);
            regs.ssr.modify(|v| v & !ssr::ERRORS);
            ringbuf_entry!(Trace::RxError(flags));
        }
    }

    /// Receive errors seen since construction.
    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.recv.clear();
        self.send.clear();
        self.stalled.store(true, Ordering::Release);
    }
}

impl<const RX: usize, const TX: usize> Default for Buffers<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SciIo<'a, S: Sys, const RX: usize, const TX: usize> {
    regs: &'a RegisterBlock,
    sys: &'a S,
    buffers: &'a Buffers<RX, TX>,
    config: Config,
    level: u8,
    crlf: bool,
}

impl<'a, S: Sys, const RX: usize, const TX: usize> SciIo<'a, S, RX, TX> {
    pub fn new(
        regs: &'a RegisterBlock,
        sys: &'a S,
        buffers: &'a Buffers<RX, TX>,
        config: Config,
    ) -> Self {
        Self {
            regs,
            sys,
            buffers,
            config,
            level: 0,
            crlf: true,
        }
    }

    /// Whether `putch(b'\n')` sends CR first. On by default.
    pub fn auto_crlf(&mut self, on: bool) {
        self.crlf = on;
    }

    /// Powers the channel and starts it at `baud`, 8N1.
    ///
    /// `level` is the priority for the receive and transmit interrupts; 0
    /// means polled operation. With a nonzero level the caller must already
    /// have attached handlers that call into the [`Buffers`].
    pub fn start(&mut self, baud: u32, level: u8) -> Result<BaudDivider, Error> {
        let Config {
            peripheral,
            pins,
            pclk,
            ..
        } = self.config;

        let d = match baud::compute(baud, pclk) {
            Some(d) => d,
            None => {
                ringbuf_entry!(Trace::BadBaud(peripheral, baud));
                return Err(Error::BaudOutOfRange);
            }
        };

        self.sys.power(peripheral, true);
        let r = self.regs;
        r.scr.write(0);

        if let Err(e) = self.sys.enable_pins(peripheral, pins) {
            ringbuf_entry!(Trace::NoPins(peripheral, e));
            self.sys.power(peripheral, false);
            return Err(Error::Pins(e));
        }

        r.smr.write_fields(&[(smr::CKS, d.cks.into())]);
        r.semr.write_fields(&[(semr::ABCS, d.abcs.into())]);
        r.brr.write(d.brr);

        self.buffers.reset();
        self.level = level;
        if level > 0 {
            self.sys.set_interrupt(self.config.rxi, level);
            self.sys.set_interrupt(self.config.txi, level);
            r.scr.write_fields(&[(scr::RE, 1), (scr::TE, 1), (scr::RIE, 1)]);
        } else {
            r.scr.write_fields(&[(scr::RE, 1), (scr::TE, 1)]);
        }

        ringbuf_entry!(Trace::Start(peripheral, baud, d));
        Ok(d)
    }

    /// Sends one byte, waiting for room if the queue is nearly full.
    pub fn putch(&mut self, c: u8) {
        if self.crlf && c == b'\n' {
            self.put_raw(b'\r');
        }
        self.put_raw(c);
    }

    fn put_raw(&mut self, c: u8) {
        let r = self.regs;
        if self.level == 0 {
            while !r.ssr.is_set(ssr::TDRE) {}
            r.tdr.write(c);
            return;
        }

        let b = self.buffers;
        while b.send.length() >= Buffers::<RX, TX>::HIGH_WATER {}
        b.send.put(c);

        // A stall is only declared by the handler with TIE cleared; taking
        // it over has to happen without the handler running in between.
        critical_section::with(|_| {
            if b.stalled.load(Ordering::Acquire) {
                b.stalled.store(false, Ordering::Release);
                r.tdr.write(b.send.get());
                r.scr.set_bit(scr::TIE);
            }
        });
    }

    pub fn puts(&mut self, s: &str) {
        for c in s.bytes() {
            self.putch(c);
        }
    }

    /// Non-blocking read of one received byte.
    pub fn try_getch(&mut self) -> Option<u8> {
        if self.level == 0 {
            let r = self.regs;
            if r.ssr.is_set(ssr::RDRF) {
                r.ssr.clear_bit(ssr::RDRF);
                Some(r.rdr.read())
            } else {
                None
            }
        } else if self.buffers.recv.length() > 0 {
            Some(self.buffers.recv.get())
        } else {
            None
        }
    }

    /// Waits for and returns one received byte.
    pub fn getch(&mut self) -> u8 {
        loop {
            if let Some(c) = self.try_getch() {
                return c;
            }
        }
    }

    /// Bytes waiting to be read. Polled channels hold at most one.
    pub fn recv_length(&self) -> usize {
        if self.level == 0 {
            self.regs.ssr.is_set(ssr::RDRF).into()
        } else {
            self.buffers.recv.length()
        }
    }

    /// Stops the channel, masks its interrupts, releases the pins and
    /// powers it down.
    pub fn destroy(&mut self) {
        let p = self.config.peripheral;
        self.regs.scr.write(0);
        self.sys.set_interrupt(self.config.rxi, 0);
        self.sys.set_interrupt(self.config.txi, 0);
        self.sys.disable_pins(p);
        self.sys.power(p, false);
        self.level = 0;
        ringbuf_entry!(Trace::Stop(p));
    }
}

impl<S: Sys, const RX: usize, const TX: usize> embedded_hal::serial::Read<u8>
    for SciIo<'_, S, RX, TX>
{
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        self.try_getch().ok_or(nb::Error::WouldBlock)
    }
}

impl<S: Sys, const RX: usize, const TX: usize> embedded_hal::serial::Write<u8>
    for SciIo<'_, S, RX, TX>
{
    type Error = Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        self.putch(byte);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Infallible> {
        let done = if self.level == 0 {
            self.regs.ssr.is_set(ssr::TEND)
        } else {
            self.buffers.is_stalled()
        };
        if done {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<S: Sys, const RX: usize, const TX: usize> core::fmt::Write
    for SciIo<'_, S, RX, TX>
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.puts(s);
        Ok(())
    }
}

/// Binds SCI channel `n`, or returns `None` if the part has no such
/// channel.
///
/// # Safety
///
/// The caller must make this the only driver instance for the channel.
pub unsafe fn sci<'a, S: Sys, const RX: usize, const TX: usize>(
    n: u8,
    sys: &'a S,
    buffers: &'a Buffers<RX, TX>,
    pclk: u32,
    pins: PinOption,
) -> Option<SciIo<'a, S, RX, TX>> {
    let regs = sci::channel(n)?;
    let config = Config::channel(n, pclk, pins)?;
    Some(SciIo::new(&*regs, sys, buffers, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write as _;
    use drv_rx_sys_api::fake::{Call, FakeSys};

    const PCLK: u32 = 60_000_000;
    const RXI0: Vector = Vector(vector::RXI0);
    const TXI0: Vector = Vector(vector::TXI0);

    type Io<'a> = SciIo<'a, FakeSys, 16, 16>;

    fn regs() -> &'static RegisterBlock {
        Box::leak(Box::new(unsafe { core::mem::zeroed::<RegisterBlock>() }))
    }

    fn buffers() -> &'static Buffers<16, 16> {
        Box::leak(Box::new(Buffers::new()))
    }

    fn set_rdr(regs: &RegisterBlock, c: u8) {
        unsafe { regs.rdr.as_ptr().write_volatile(c) };
    }

    fn sent(b: &Buffers<16, 16>) -> Vec<u8> {
        core::iter::from_fn(|| (b.send.length() > 0).then(|| b.send.get()))
            .collect()
    }

    #[test]
    fn start_sequence() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));

        let d = io.start(9600, 0).unwrap();

        assert_eq!(d.brr, 194);
        assert_eq!(
            sys.calls(),
            [
                Call::Power(Peripheral::Sci0, true),
                Call::EnablePins(Peripheral::Sci0, PinOption::First),
            ]
        );
        assert_eq!(regs.brr.read(), 194);
        assert_eq!(regs.smr.get(smr::CKS), 0);
        assert!(!regs.semr.is_set(semr::ABCS));
        // RE | TE
        assert_eq!(regs.scr.read(), 0x30);
    }

    #[test]
    fn interrupt_start_enables_both_vectors() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));

        io.start(115_200, 3).unwrap();

        let calls = sys.calls();
        assert!(calls.contains(&Call::SetInterrupt(RXI0, 3)));
        assert!(calls.contains(&Call::SetInterrupt(TXI0, 3)));
        // RE | TE | RIE
        assert_eq!(regs.scr.read(), 0x70);
        assert!(bufs.is_stalled());
    }

    #[test]
    fn bad_baud_touches_nothing() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));

        assert_eq!(io.start(10, 0), Err(Error::BaudOutOfRange));
        assert!(sys.calls().is_empty());
    }

    #[test]
    fn missing_pins_power_back_down() {
        let regs = regs();
        let sys = FakeSys {
            unmapped: vec![(Peripheral::Sci0, PinOption::Third)],
            ..FakeSys::default()
        };
        let mut io =
            Io::new(regs, &sys, buffers(), Config::sci0(PCLK, PinOption::Third));

        assert_eq!(
            io.start(9600, 0),
            Err(Error::Pins(SysError::NoPinMapping))
        );
        assert_eq!(sys.calls().last(), Some(&Call::Power(Peripheral::Sci0, false)));
        assert_eq!(regs.scr.read(), 0);
    }

    #[test]
    fn polled_io() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));
        io.start(9600, 0).unwrap();

        regs.ssr.set_bit(ssr::TDRE);
        io.putch(b'x');
        assert_eq!(regs.tdr.read(), b'x');

        assert_eq!(io.recv_length(), 0);
        assert_eq!(io.try_getch(), None);
        set_rdr(regs, b'y');
        regs.ssr.set_bit(ssr::RDRF);
        assert_eq!(io.recv_length(), 1);
        assert_eq!(io.getch(), b'y');
        assert!(!regs.ssr.is_set(ssr::RDRF));
    }

    #[test]
    fn first_byte_restarts_stalled_transmitter() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));
        io.start(115_200, 3).unwrap();

        io.puts("ab");
        // 'a' went straight to TDR; 'b' waits for the interrupt.
        assert_eq!(regs.tdr.read(), b'a');
        assert!(regs.scr.is_set(scr::TIE));
        assert!(!bufs.is_stalled());
        assert_eq!(bufs.send.length(), 1);

        bufs.on_transmit(regs);
        assert_eq!(regs.tdr.read(), b'b');
        bufs.on_transmit(regs);
        assert!(bufs.is_stalled());
        assert!(!regs.scr.is_set(scr::TIE));

        io.putch(b'c');
        assert_eq!(regs.tdr.read(), b'c');
        assert!(regs.scr.is_set(scr::TIE));
    }

    #[test]
    fn high_water_mark() {
        assert_eq!(Buffers::<4, 2>::HIGH_WATER, 1);
        assert_eq!(Buffers::<4, 16>::HIGH_WATER, 14);
        assert_eq!(Buffers::<4, 4096>::HIGH_WATER, 3584);
    }

    #[test]
    fn newline_gets_carriage_return() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));
        io.start(115_200, 3).unwrap();

        write!(io, "a\n").unwrap();
        assert_eq!(regs.tdr.read(), b'a');
        assert_eq!(sent(bufs), b"\r\n");

        io.auto_crlf(false);
        io.putch(b'\n');
        assert_eq!(sent(bufs), b"\n");
    }

    #[test]
    fn interrupt_receive() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));
        io.start(115_200, 3).unwrap();

        for c in b"hi" {
            set_rdr(regs, *c);
            bufs.on_receive(regs);
        }
        assert_eq!(io.recv_length(), 2);
        assert_eq!(io.getch(), b'h');
        assert_eq!(embedded_hal::serial::Read::read(&mut io), Ok(b'i'));
        assert_eq!(
            embedded_hal::serial::Read::read(&mut io),
            Err(nb::Error::WouldBlock)
        );
    }

    #[test]
    fn receive_errors_are_counted_and_cleared() {
        let (regs, bufs) = (regs(), buffers());

        bufs.on_error(regs);
        assert_eq!(bufs.errors(), 0);

        regs.ssr.set_bit(ssr::TDRE);
        regs.ssr.set_bit(ssr::ORER);
        regs.ssr.set_bit(ssr::FER);
        bufs.on_error(regs);
        assert_eq!(bufs.errors(), 1);
        assert_eq!(regs.ssr.read() & ssr::ERRORS, 0);
        assert!(regs.ssr.is_set(ssr::TDRE));
    }

    #[test]
    fn destroy_releases_everything() {
        let (regs, sys, bufs) = (regs(), FakeSys::new(), buffers());
        let mut io = Io::new(regs, &sys, bufs, Config::sci0(PCLK, PinOption::First));
        io.start(115_200, 3).unwrap();
        sys.clear();

        io.destroy();

        assert_eq!(regs.scr.read(), 0);
        assert_eq!(
            sys.calls(),
            [
                Call::SetInterrupt(RXI0, 0),
                Call::SetInterrupt(TXI0, 0),
                Call::DisablePins(Peripheral::Sci0),
                Call::Power(Peripheral::Sci0, false),
            ]
        );
    }

    #[test]
    fn channel_bindings() {
        let c = Config::channel(12, PCLK, PinOption::First).unwrap();
        assert_eq!(c.peripheral, Peripheral::Sci12);
        assert_eq!(c.rxi, Vector(vector::RXI12));
        assert_eq!(c.txi, Vector(vector::TXI12));

        let c = Config::channel(2, PCLK, PinOption::Second).unwrap();
        assert_eq!(c.peripheral, Peripheral::Sci2);
        assert_eq!(c.pins, PinOption::Second);
        assert_eq!(c.rxi, Vector(vector::RXI2));

        assert!(Config::channel(9, PCLK, PinOption::First).is_none());
    }
}
