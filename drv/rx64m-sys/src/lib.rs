// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RX64M implementation of [`Sys`].
//!
//! This is the one place that knows the module-stop bit of each peripheral,
//! the pin function tables, and the write-protect dance both of those
//! require. It also owns the RAM table of interrupt handlers: the firmware's
//! vector stubs call [`dispatch`] with their vector number.

#![cfg_attr(not(test), no_std)]

mod pins;

use core::cell::Cell;
use critical_section::Mutex;
use drv_rx64m_regs::{icu, mpc, port, system};
use drv_rx_sys_api::{
    Edge, Handler, Peripheral, PinOption, Sys, SysError, Vector,
};
use regmap::{Field, Reg};
use ringbuf::*;
use scopeguard::defer;

pub use pins::{lookup, Function, Pin};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Power(Peripheral, bool),
    Pins(Peripheral, PinOption),
    NoPins(Peripheral, PinOption),
    PinsOff(Peripheral),
    Interrupt(u8, u8),
    IrqEdge(u8, Edge),
}

ringbuf!(Trace, 16, Trace::None);

static HANDLERS: [Mutex<Cell<Option<Handler>>>; 256] =
    [const { Mutex::new(Cell::new(None)) }; 256];

/// Runs the handler attached to `vector`, if any. Called from the vector
/// stubs, with interrupts masked by the CPU on entry.
pub fn dispatch(vector: u8) {
    let handler =
        critical_section::with(|cs| HANDLERS[vector as usize].borrow(cs).get());
    if let Some(h) = handler {
        h();
    }
}

/// Which MSTPCR a stop bit lives in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mstpcr {
    A,
    B,
}

/// Module stop bit for `p`, plus the other peripheral sharing that bit if
/// there is one.
fn mstp_bit(p: Peripheral) -> Option<(Mstpcr, Field, Option<Peripheral>)> {
    use system::{mstpcra, mstpcrb};
    use Peripheral::*;

    Some(match p {
        Sci0 => (Mstpcr::B, mstpcrb::SCI0, None),
        Sci1 => (Mstpcr::B, mstpcrb::SCI1, None),
        Sci2 => (Mstpcr::B, mstpcrb::SCI2, None),
        Sci3 => (Mstpcr::B, mstpcrb::SCI3, None),
        Sci4 => (Mstpcr::B, mstpcrb::SCI4, None),
        Sci5 => (Mstpcr::B, mstpcrb::SCI5, None),
        Sci6 => (Mstpcr::B, mstpcrb::SCI6, None),
        Sci7 => (Mstpcr::B, mstpcrb::SCI7, None),
        Sci12 => (Mstpcr::B, mstpcrb::SCI12, None),
        Rspi0 => (Mstpcr::B, mstpcrb::RSPI0, None),
        Cmt0 => (Mstpcr::A, mstpcra::CMT0_1, Some(Cmt1)),
        Cmt1 => (Mstpcr::A, mstpcra::CMT0_1, Some(Cmt0)),
        Cmt2 => (Mstpcr::A, mstpcra::CMT2_3, Some(Cmt3)),
        Cmt3 => (Mstpcr::A, mstpcra::CMT2_3, Some(Cmt2)),
        Tpu0 => (Mstpcr::A, mstpcra::TPU0, None),
        Da => (Mstpcr::A, mstpcra::DA, None),
        Irq(_) => return None,
    })
}

/// Bit in the `powered` mask. Only peripherals with a stop bit have one.
fn power_index(p: Peripheral) -> u32 {
    use Peripheral::*;

    match p {
        Sci0 => 0,
        Sci1 => 1,
        Sci2 => 2,
        Sci3 => 3,
        Sci4 => 4,
        Sci5 => 5,
        Sci6 => 6,
        Sci7 => 7,
        Sci12 => 8,
        Rspi0 => 9,
        Cmt0 => 10,
        Cmt1 => 11,
        Cmt2 => 12,
        Cmt3 => 13,
        Tpu0 => 14,
        Da => 15,
        Irq(n) => 16 + u32::from(n & 0xf),
    }
}

pub struct Rx64mSys<'a> {
    mstp: &'a system::Mstp,
    prcr: &'a Reg<u16>,
    mpc: &'a mpc::RegisterBlock,
    port: &'a port::RegisterBlock,
    icu: &'a icu::RegisterBlock,
    powered: Cell<u32>,
}

impl Rx64mSys<'static> {
    /// Binds to the chip's system blocks.
    ///
    /// # Safety
    ///
    /// There must be only one of these in the image; two would race on the
    /// write-protect registers.
    pub unsafe fn new() -> Self {
        Self::from_blocks(
            &*system::MSTP,
            &*system::PRCR,
            &*mpc::MPC,
            &*port::PORT,
            &*icu::ICU,
        )
    }
}

impl<'a> Rx64mSys<'a> {
    pub fn from_blocks(
        mstp: &'a system::Mstp,
        prcr: &'a Reg<u16>,
        mpc: &'a mpc::RegisterBlock,
        port: &'a port::RegisterBlock,
        icu: &'a icu::RegisterBlock,
    ) -> Self {
        Self {
            mstp,
            prcr,
            mpc,
            port,
            icu,
            powered: Cell::new(0),
        }
    }

    fn is_powered(&self, p: Peripheral) -> bool {
        self.powered.get() & (1 << power_index(p)) != 0
    }

    /// Runs `body` with module-stop registers writable.
    fn with_mstp_unlocked<R>(&self, body: impl FnOnce() -> R) -> R {
        self.prcr.write(system::prcr::KEY | system::prcr::PRC1.bits(1) as u16);
        defer! {
            self.prcr.write(system::prcr::KEY);
        }
        body()
    }

    /// Runs `body` with the pin function registers writable.
    fn with_pfs_unlocked<R>(&self, body: impl FnOnce() -> R) -> R {
        self.mpc.pwpr.clear_bit(mpc::pwpr::B0WI);
        self.mpc.pwpr.set_bit(mpc::pwpr::PFSWE);
        defer! {
            self.mpc.pwpr.clear_bit(mpc::pwpr::PFSWE);
            self.mpc.pwpr.set_bit(mpc::pwpr::B0WI);
        }
        body()
    }

    fn pfs(&self, pin: &Pin) -> &Reg<u8> {
        &self.mpc.pfs[mpc::pfs_index(pin.port, pin.bit)]
    }

    fn set_peripheral_mode(&self, pin: &Pin, on: bool) {
        let bit = Field::bit(pin.bit);
        let pmr = &self.port.pmr[pin.port as usize];
        if on {
            pmr.set_bit(bit);
        } else {
            pmr.clear_bit(bit);
        }
    }
}

impl Sys for Rx64mSys<'_> {
    fn enable_pins(
        &self,
        peripheral: Peripheral,
        option: PinOption,
    ) -> Result<(), SysError> {
        let Some(pins) = pins::lookup(peripheral, option) else {
            ringbuf_entry!(Trace::NoPins(peripheral, option));
            return Err(SysError::NoPinMapping);
        };

        self.with_pfs_unlocked(|| {
            for pin in pins {
                // The function may only change while the pin is in GPIO
                // mode.
                self.set_peripheral_mode(pin, false);
                match pin.function {
                    Function::Psel(sel) => {
                        self.pfs(pin).write_fields(&[(mpc::pfs::PSEL, sel.into())]);
                        self.set_peripheral_mode(pin, true);
                    }
                    Function::Irq => {
                        self.pfs(pin).write_fields(&[(mpc::pfs::ISEL, 1)]);
                    }
                    Function::Analog => {
                        self.pfs(pin).write_fields(&[(mpc::pfs::ASEL, 1)]);
                    }
                }
            }
        });
        ringbuf_entry!(Trace::Pins(peripheral, option));
        Ok(())
    }

    fn disable_pins(&self, peripheral: Peripheral) {
        self.with_pfs_unlocked(|| {
            for option in [PinOption::First, PinOption::Second, PinOption::Third]
            {
                // Only release pins that are actually routed to us; another
                // option's pins may belong to someone else by now.
                for pin in pins::lookup(peripheral, option).unwrap_or(&[]) {
                    let expected = match pin.function {
                        Function::Psel(sel) => mpc::pfs::PSEL.bits(sel.into()),
                        Function::Irq => mpc::pfs::ISEL.bits(1),
                        Function::Analog => mpc::pfs::ASEL.bits(1),
                    };
                    if u32::from(self.pfs(pin).read()) == expected {
                        self.set_peripheral_mode(pin, false);
                        self.pfs(pin).write(0);
                    }
                }
            }
        });
        ringbuf_entry!(Trace::PinsOff(peripheral));
    }

    fn power(&self, peripheral: Peripheral, on: bool) {
        let Some((which, field, partner)) = mstp_bit(peripheral) else {
            return;
        };

        let mask = 1 << power_index(peripheral);
        let powered = self.powered.get();
        self.powered.set(if on { powered | mask } else { powered & !mask });

        // A shared stop bit stays clear while either user wants it.
        let stop = !on && !partner.is_some_and(|p| self.is_powered(p));

        let reg = match which {
            Mstpcr::A => &self.mstp.mstpcra,
            Mstpcr::B => &self.mstp.mstpcrb,
        };
        self.with_mstp_unlocked(|| reg.set(field, stop as u32));
        ringbuf_entry!(Trace::Power(peripheral, on));
    }

    fn set_interrupt(&self, vector: Vector, level: u8) {
        let v = vector.0 as usize;
        let (ier, bit) = icu::ier_position(vector.0);
        let bit = Field::bit(bit);

        critical_section::with(|_| {
            self.icu.ier[ier].clear_bit(bit);
            if level > 0 {
                self.icu.ipr[v].set(icu::ipr::IPR, level.into());
                self.icu.ir[v].write(0);
                self.icu.ier[ier].set_bit(bit);
            }
        });
        ringbuf_entry!(Trace::Interrupt(vector.0, level));
    }

    fn attach(&self, vector: Vector, handler: Handler) {
        critical_section::with(|cs| {
            HANDLERS[vector.0 as usize].borrow(cs).set(Some(handler))
        });
    }

    fn set_irq_edge(&self, irq: u8, edge: Edge) -> Result<(), SysError> {
        let cr = self.icu.irqcr.get(irq as usize).ok_or(SysError::NotAnIrq)?;
        let md = match edge {
            Edge::Low => 0b00,
            Edge::Falling => 0b01,
            Edge::Rising => 0b10,
            Edge::Both => 0b11,
        };
        cr.set(icu::irqcr::IRQMD, md);
        // Changing the mode can latch a spurious request.
        self.icu.ir[(icu::vector::IRQ0 + irq) as usize].write(0);
        ringbuf_entry!(Trace::IrqEdge(irq, edge));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_rx64m_regs::port::{P2, PC, PF};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn leak<T>() -> &'static T {
        // All-zero is a valid bit pattern for a block of volatile cells.
        Box::leak(Box::new(unsafe { core::mem::zeroed::<T>() }))
    }

    fn make_sys() -> Rx64mSys<'static> {
        Rx64mSys::from_blocks(leak(), leak(), leak(), leak(), leak())
    }

    #[test]
    fn power_toggles_stop_bit_and_relocks() {
        let sys = make_sys();
        sys.mstp.mstpcrb.write(u32::MAX);

        sys.power(Peripheral::Rspi0, true);
        assert!(!sys.mstp.mstpcrb.is_set(system::mstpcrb::RSPI0));
        assert!(sys.mstp.mstpcrb.is_set(system::mstpcrb::SCI0));
        assert_eq!(sys.prcr.read(), system::prcr::KEY);

        sys.power(Peripheral::Rspi0, false);
        assert!(sys.mstp.mstpcrb.is_set(system::mstpcrb::RSPI0));
    }

    #[test]
    fn shared_stop_bit_waits_for_both() {
        let sys = make_sys();

        sys.power(Peripheral::Cmt0, true);
        sys.power(Peripheral::Cmt1, true);
        sys.power(Peripheral::Cmt0, false);
        assert!(!sys.mstp.mstpcra.is_set(system::mstpcra::CMT0_1));
        sys.power(Peripheral::Cmt1, false);
        assert!(sys.mstp.mstpcra.is_set(system::mstpcra::CMT0_1));
    }

    #[test]
    fn irq_lines_have_no_stop_bit() {
        let sys = make_sys();
        sys.power(Peripheral::Irq(4), true);
        assert_eq!(sys.mstp.mstpcra.read(), 0);
        assert_eq!(sys.mstp.mstpcrb.read(), 0);
        assert_eq!(sys.prcr.read(), 0);
    }

    #[test]
    fn pins_routed_and_released() {
        let sys = make_sys();

        sys.enable_pins(Peripheral::Sci0, PinOption::First).unwrap();
        let txd = sys.mpc.pfs[mpc::pfs_index(P2, 0)].read();
        assert_eq!(txd, 0b01010);
        assert_eq!(sys.port.pmr[P2 as usize].read(), 0b11);
        // Write protection is back on.
        assert_eq!(sys.mpc.pwpr.read(), 0x80);

        sys.disable_pins(Peripheral::Sci0);
        assert_eq!(sys.mpc.pfs[mpc::pfs_index(P2, 1)].read(), 0);
        assert_eq!(sys.port.pmr[P2 as usize].read(), 0);
    }

    #[test]
    fn rspi_second_option_and_unknown_option() {
        let sys = make_sys();

        assert_eq!(
            sys.enable_pins(Peripheral::Rspi0, PinOption::Third),
            Err(SysError::NoPinMapping)
        );
        sys.enable_pins(Peripheral::Rspi0, PinOption::First).unwrap();
        assert_eq!(sys.port.pmr[PC as usize].read(), 0b1110_0000);
    }

    #[test]
    fn irq_pin_uses_isel_without_peripheral_mode() {
        let sys = make_sys();

        sys.enable_pins(Peripheral::Irq(4), PinOption::Second).unwrap();
        assert_eq!(sys.mpc.pfs[mpc::pfs_index(PF, 5)].read(), 0x40);
        assert_eq!(sys.port.pmr[PF as usize].read(), 0);
    }

    #[test]
    fn interrupt_enable_and_disable() {
        let sys = make_sys();
        let v = Vector(icu::vector::RXI12);
        sys.icu.ir[v.0 as usize].write(1);

        sys.set_interrupt(v, 3);
        assert_eq!(sys.icu.ipr[v.0 as usize].read(), 3);
        assert_eq!(sys.icu.ir[v.0 as usize].read(), 0);
        assert_eq!(sys.icu.ier[14].read(), 1 << 4);

        sys.set_interrupt(v, 0);
        assert_eq!(sys.icu.ier[14].read(), 0);
    }

    #[test]
    fn irq_edge() {
        let sys = make_sys();
        sys.set_irq_edge(4, Edge::Rising).unwrap();
        assert_eq!(sys.icu.irqcr[4].read(), 0b1000);
        sys.set_irq_edge(4, Edge::Falling).unwrap();
        assert_eq!(sys.icu.irqcr[4].read(), 0b0100);
        assert_eq!(sys.set_irq_edge(16, Edge::Low), Err(SysError::NotAnIrq));
    }

    static FIRED: AtomicU32 = AtomicU32::new(0);

    fn count_fired() {
        FIRED.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn attached_handler_runs_on_dispatch() {
        let sys = make_sys();
        // A vector nothing else in these tests uses.
        let v = 200;

        dispatch(v);
        assert_eq!(FIRED.load(Ordering::Relaxed), 0);
        sys.attach(Vector(v), count_fired);
        dispatch(v);
        dispatch(v);
        assert_eq!(FIRED.load(Ordering::Relaxed), 2);
    }
}
