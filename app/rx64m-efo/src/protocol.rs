// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host command protocol and the main loop body.
//!
//! The host sends single-byte commands. `START` is followed by a 16-bit
//! big-endian sample count and a 16-bit big-endian trigger threshold; a
//! count of 0 asks for one immediate conversion instead of a triggered
//! capture. Results go back as wave frames:
//!
//! ```text
//! 0x01, channel, (hi, lo)*
//! ```
//!
//! one per channel, channel 1 first. The `T` and `t` test commands answer in
//! ASCII instead.

use crate::capture::{Capture, MAX_SAMPLES};
use crate::hw::{Dac, Led, Port, Sampler, Trigger};
use core::fmt::Write as _;
use drv_rx_sys_api::{Edge, SysError};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use ringbuf::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum Command {
    Start = 0x01,
    End = 0x03,
    ModeSelect = 0x11,
    ModeSense = 0x12,
    Version = 0x21,
    /// Full-length capture, dumped as text.
    AsciiTest = b'T' as isize,
    /// One sample, dumped as text.
    AsciiSingle = b't' as isize,
}

/// Leading byte of a wave frame.
pub const WAVE: u8 = 0x01;

/// DAC code for a 0 V threshold.
pub const ZERO_VOLT: u16 = 32768;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Parse {
    Command,
    Length,
    Volt,
}

/// Reply the main loop owes the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SendTask {
    Ready,
    Single,
    Multi,
    Ascii,
    Ascii2,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Command(Command),
    Armed { length: u16, volt: u16 },
    ArmFailed(SysError),
    Cancelled,
    Sent(SendTask),
}

ringbuf!(Trace, 16, Trace::None);

/// Status LED period in main loop passes, and the pass it comes on at.
const BLINK_PERIOD: u8 = 50;
const BLINK_ON: u8 = 35;

pub struct Efo<'a, P, D, T, A, L> {
    port: P,
    dac: D,
    trigger: T,
    led: L,
    adc: &'a A,
    capture: &'a Capture,
    parse: Parse,
    length: u16,
    volt: u16,
    send: SendTask,
    seen_triggers: u16,
    blink: u8,
}

impl<'a, P, D, T, A, L> Efo<'a, P, D, T, A, L>
where
    P: Port,
    D: Dac,
    T: Trigger,
    A: Sampler,
    L: Led,
{
    pub fn new(
        port: P,
        dac: D,
        trigger: T,
        led: L,
        adc: &'a A,
        capture: &'a Capture,
    ) -> Self {
        Self {
            port,
            dac,
            trigger,
            led,
            adc,
            capture,
            parse: Parse::Command,
            length: 0,
            volt: 0,
            send: SendTask::Ready,
            seen_triggers: 0,
            blink: 0,
        }
    }

    /// Takes an initial full capture and sets a 0 V threshold.
    pub fn start(&mut self) {
        self.capture.request(MAX_SAMPLES);
        self.dac.out0(ZERO_VOLT);
        self.seen_triggers = self.capture.triggers();
    }

    pub fn send_task(&self) -> SendTask {
        self.send
    }

    pub fn port(&mut self) -> &mut P {
        &mut self.port
    }

    /// One pass of the main loop, run once per system tick.
    pub fn poll(&mut self) {
        self.receive();
        self.reply();
        self.blink();
    }

    fn receive(&mut self) {
        match self.parse {
            Parse::Command => {
                if self.port.recv_length() >= 1 {
                    let b = self.port.getch();
                    // Unknown bytes are dropped.
                    if let Some(cmd) = Command::from_u8(b) {
                        self.command(cmd);
                    }
                }
            }
            Parse::Length => {
                if let Some(n) = self.read_u16() {
                    self.length = n;
                    self.parse = Parse::Volt;
                }
            }
            Parse::Volt => {
                if let Some(v) = self.read_u16() {
                    self.volt = v;
                    self.parse = Parse::Command;
                    self.arm();
                }
            }
        }
    }

    fn read_u16(&mut self) -> Option<u16> {
        if self.port.recv_length() < 2 {
            return None;
        }
        let hi = self.port.getch();
        let lo = self.port.getch();
        Some(u16::from_be_bytes([hi, lo]))
    }

    fn command(&mut self, cmd: Command) {
        ringbuf_entry!(Trace::Command(cmd));
        match cmd {
            Command::Start => self.parse = Parse::Length,
            Command::AsciiTest => {
                self.capture.request(MAX_SAMPLES);
                self.send = SendTask::Ascii;
            }
            Command::AsciiSingle => {
                self.capture.request(1);
                self.send = SendTask::Ascii2;
            }
            Command::End => {
                if self.send == SendTask::Multi {
                    ringbuf_entry!(Trace::Cancelled);
                    self.send = SendTask::Ready;
                }
            }
            // Accepted and ignored.
            Command::ModeSelect | Command::ModeSense | Command::Version => (),
        }
    }

    /// Applies a complete START: threshold, edge and capture length.
    fn arm(&mut self) {
        let (length, volt) = (self.length, self.volt);
        self.dac.out0(volt);
        let edge = if volt >= ZERO_VOLT {
            Edge::Rising
        } else {
            Edge::Falling
        };
        self.capture.arm(length);
        match self.trigger.arm(edge) {
            Ok(()) => ringbuf_entry!(Trace::Armed { length, volt }),
            // Nothing will fire; a multi capture waits until END.
            Err(e) => ringbuf_entry!(Trace::ArmFailed(e)),
        }
        self.seen_triggers = self.capture.triggers();
        self.send = if length == 0 {
            SendTask::Single
        } else {
            SendTask::Multi
        };
    }

    fn reply(&mut self) {
        match self.send {
            SendTask::Ready => return,
            _ if self.capture.busy() => return,
            SendTask::Single => {
                let [a, b] = self.adc.sample();
                self.wave(1, core::iter::once(a));
                self.wave(2, core::iter::once(b));
            }
            SendTask::Multi => {
                if self.capture.triggers() == self.seen_triggers {
                    return;
                }
                let n = usize::from(self.length.min(MAX_SAMPLES));
                let c = self.capture;
                self.wave(1, (1..=n).map(|i| c.sample(i).0));
                self.wave(2, (1..=n).map(|i| c.sample(i).1));
            }
            SendTask::Ascii => {
                for i in 1..=usize::from(MAX_SAMPLES) {
                    let (a, b) = self.capture.sample(i);
                    // Our ports don't fail writes.
                    let _ = write!(self.port, "{i},{a},{b}\r\n");
                }
            }
            SendTask::Ascii2 => {
                let (a, b) = self.capture.sample(1);
                let _ = write!(self.port, "{a},{b}\r\n");
            }
        }
        ringbuf_entry!(Trace::Sent(self.send));
        self.send = SendTask::Ready;
    }

    fn wave(&mut self, channel: u8, samples: impl Iterator<Item = u16>) {
        self.port.putch(WAVE);
        self.port.putch(channel);
        for s in samples {
            let [hi, lo] = s.to_be_bytes();
            self.port.putch(hi);
            self.port.putch(lo);
        }
    }

    fn blink(&mut self) {
        self.blink += 1;
        if self.blink >= BLINK_PERIOD {
            self.blink = 0;
        }
        self.led.set(self.blink >= BLINK_ON);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fake::*;

    type TestEfo = Efo<
        'static,
        FakePort,
        FakeDac,
        FakeTrigger,
        CountingAdc,
        FakeLed,
    >;

    fn efo() -> TestEfo {
        let adc = Box::leak(Box::new(CountingAdc::default()));
        let capture = Box::leak(Box::new(Capture::new()));
        Efo::new(
            FakePort::default(),
            FakeDac::default(),
            FakeTrigger::default(),
            FakeLed::default(),
            adc,
            capture,
        )
    }

    /// Plays the sample timer until the capture completes.
    fn finish_capture(e: &TestEfo) {
        while e.capture.busy() {
            e.capture.tick(e.adc);
        }
    }

    fn poll_n(e: &mut TestEfo, n: usize) {
        for _ in 0..n {
            e.poll();
        }
    }

    #[test]
    fn start_takes_full_capture_at_zero_volts() {
        let mut e = efo();
        e.start();
        assert!(e.capture.busy());
        assert_eq!(e.dac.codes, [ZERO_VOLT]);
        finish_capture(&e);
        assert_eq!(e.adc.taken(), MAX_SAMPLES + 1);
    }

    #[test]
    fn start_command_waits_for_whole_fields() {
        let mut e = efo();
        e.port.feed(&[0x01, 0x00]);
        poll_n(&mut e, 3);
        assert_eq!(e.parse, Parse::Length);

        e.port.feed(&[0x03, 0x80]);
        poll_n(&mut e, 2);
        assert_eq!(e.parse, Parse::Volt);
        assert_eq!(e.length, 3);

        e.port.feed(&[0x00]);
        e.poll();
        assert_eq!(e.parse, Parse::Command);
        assert_eq!(e.volt, 0x8000);
        assert_eq!(e.dac.codes, [0x8000]);
        assert_eq!(e.trigger.edges, [Edge::Rising]);
        assert_eq!(e.send_task(), SendTask::Multi);
    }

    #[test]
    fn threshold_below_zero_volts_triggers_on_falling_edge() {
        let mut e = efo();
        e.port.feed(&[0x01, 0x00, 0x00, 0x7f, 0xff]);
        poll_n(&mut e, 3);
        assert_eq!(e.dac.codes, [0x7fff]);
        assert_eq!(e.trigger.edges, [Edge::Falling]);
        assert_eq!(e.send_task(), SendTask::Ready);
    }

    #[test]
    fn single_conversion_reply() {
        let mut e = efo();
        e.port.feed(&[0x01, 0x00, 0x00, 0x80, 0x00]);
        poll_n(&mut e, 2);
        assert!(e.port.tx.is_empty());

        // Third pass parses VOLT and replies in the same pass.
        e.poll();
        assert_eq!(
            e.port.take(),
            [0x01, 0x01, 0x00, 0x00, 0x01, 0x02, 0x03, 0xe8]
        );
        assert_eq!(e.send_task(), SendTask::Ready);
    }

    #[test]
    fn single_conversion_waits_for_capture() {
        let mut e = efo();
        e.start();
        e.port.feed(&[0x01, 0x00, 0x00, 0x80, 0x00]);
        poll_n(&mut e, 5);
        assert_eq!(e.send_task(), SendTask::Single);
        assert!(e.port.tx.is_empty());

        finish_capture(&e);
        e.poll();
        assert_eq!(e.port.take().len(), 8);
    }

    #[test]
    fn multi_capture_waits_for_trigger_then_samples() {
        let mut e = efo();
        e.port.feed(&[0x01, 0x00, 0x03, 0x90, 0x00]);
        poll_n(&mut e, 5);
        assert_eq!(e.send_task(), SendTask::Multi);
        assert!(e.port.tx.is_empty());

        e.capture.on_trigger();
        e.poll();
        assert!(e.port.tx.is_empty(), "capture still running");

        finish_capture(&e);
        e.poll();
        // Slot 0 is skipped: samples 1..=3 are 1, 2, 3 and 1001..1003.
        assert_eq!(
            e.port.take(),
            [
                0x01, 0x01, 0, 1, 0, 2, 0, 3, //
                0x01, 0x02, 0x03, 0xe9, 0x03, 0xea, 0x03, 0xeb,
            ]
        );
        assert_eq!(e.send_task(), SendTask::Ready);
    }

    #[test]
    fn end_cancels_only_multi() {
        let mut e = efo();
        e.port.feed(&[0x01, 0x00, 0x10, 0x80, 0x00]);
        poll_n(&mut e, 3);
        assert_eq!(e.send_task(), SendTask::Multi);
        e.port.feed(&[0x03]);
        e.poll();
        assert_eq!(e.send_task(), SendTask::Ready);

        e.start();
        e.port.feed(&[0x01, 0x00, 0x00, 0x80, 0x00, 0x03]);
        poll_n(&mut e, 4);
        assert_eq!(e.send_task(), SendTask::Single);
    }

    #[test]
    fn ascii_dump() {
        let mut e = efo();
        e.port.feed(b"T");
        e.poll();
        assert_eq!(e.send_task(), SendTask::Ascii);
        finish_capture(&e);
        e.poll();

        let text = String::from_utf8(e.port.take()).unwrap();
        let lines: Vec<_> = text.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), usize::from(MAX_SAMPLES));
        assert_eq!(lines[0], "1,1,1001");
        assert_eq!(lines[1], "2,2,1002");
    }

    #[test]
    fn ascii_single_sample() {
        let mut e = efo();
        e.port.feed(b"t");
        e.poll();
        assert_eq!(e.send_task(), SendTask::Ascii2);
        finish_capture(&e);
        e.poll();
        assert_eq!(e.port.take(), b"1,1001\r\n");
    }

    #[test]
    fn unknown_and_ignored_commands() {
        let mut e = efo();
        e.port.feed(&[0x00, 0x11, 0x12, 0x21, 0xff]);
        poll_n(&mut e, 5);
        assert_eq!(e.parse, Parse::Command);
        assert_eq!(e.send_task(), SendTask::Ready);
        assert!(e.port.tx.is_empty());
        assert!(e.port.rx.is_empty());
    }

    #[test]
    fn failed_arm_still_waits_for_capture() {
        let mut e = efo();
        e.trigger.fail = Some(SysError::NoPinMapping);
        e.port.feed(&[0x01, 0x00, 0x02, 0x80, 0x00]);
        poll_n(&mut e, 3);
        assert_eq!(e.send_task(), SendTask::Multi);
        assert_eq!(e.capture.triggers(), 0);
    }

    #[test]
    fn command_names() {
        assert_eq!(Command::from_u8(0x01), Some(Command::Start));
        assert_eq!(Command::from_u8(b'T'), Some(Command::AsciiTest));
        assert_eq!(Command::from_u8(b't'), Some(Command::AsciiSingle));
        assert_eq!(Command::from_u8(0x02), None);
    }

    #[test]
    fn led_on_for_last_fifteen_of_fifty() {
        let mut e = efo();
        let mut on = 0;
        for _ in 0..100 {
            e.poll();
            on += usize::from(e.led.on);
        }
        assert_eq!(on, 30);
        poll_n(&mut e, 34);
        assert!(!e.led.on);
        e.poll();
        assert!(e.led.on);
    }
}
