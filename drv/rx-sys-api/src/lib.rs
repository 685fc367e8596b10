// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the RX system control bits that peripheral drivers lean on:
//! module power (MSTP), pin function routing (MPC) and the interrupt
//! controller (ICU).
//!
//! Drivers are handed something implementing [`Sys`] when they are
//! constructed rather than poking those blocks themselves, so that only one
//! place in a firmware image knows about write protection and pin tables.

#![cfg_attr(target_os = "none", no_std)]

/// Peripheral modules whose power and pins are managed through [`Sys`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Peripheral {
    Sci0,
    Sci1,
    Sci2,
    Sci3,
    Sci4,
    Sci5,
    Sci6,
    Sci7,
    Sci12,
    Rspi0,
    Cmt0,
    Cmt1,
    Cmt2,
    Cmt3,
    Tpu0,
    /// D/A converter
    Da,
    /// External interrupt pins; these have no module stop bit.
    Irq(u8),
}

/// Which of a peripheral's alternative pin assignments to use.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PinOption {
    #[default]
    First,
    Second,
    Third,
}

/// Interrupt vector number, as in the ICU's IR/IER/IPR indexing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Vector(pub u8);

/// Detection mode for an external IRQ pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    Low,
    Falling,
    Rising,
    Both,
}

/// An interrupt handler. Handlers get no arguments; they find their state in
/// statics.
pub type Handler = fn();

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SysError {
    /// The peripheral has no pin assignment for the requested option.
    NoPinMapping,
    /// The vector is not an external IRQ line.
    NotAnIrq,
}

pub trait Sys {
    /// Routes the peripheral's signals to its pins for `option`.
    fn enable_pins(
        &self,
        peripheral: Peripheral,
        option: PinOption,
    ) -> Result<(), SysError>;

    /// Returns the peripheral's pins to general-purpose I/O. Harmless if they
    /// were never enabled.
    fn disable_pins(&self, peripheral: Peripheral);

    /// Takes the module out of (or puts it into) module-stop state.
    fn power(&self, peripheral: Peripheral, on: bool);

    /// Sets the priority of `vector` to `level` and enables it; level 0
    /// disables it. Any request pending from before is discarded.
    fn set_interrupt(&self, vector: Vector, level: u8);

    /// Installs `handler` as the routine run for `vector`.
    fn attach(&self, vector: Vector, handler: Handler);

    /// Sets the detection mode of external interrupt line `irq`.
    fn set_irq_edge(&self, irq: u8, edge: Edge) -> Result<(), SysError>;
}

// Recording fake for driver tests on the host.

#[cfg(not(target_os = "none"))]
pub mod fake {
    use super::*;
    use core::cell::RefCell;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub enum Call {
        EnablePins(Peripheral, PinOption),
        DisablePins(Peripheral),
        Power(Peripheral, bool),
        SetInterrupt(Vector, u8),
        Attach(Vector),
        SetIrqEdge(u8, Edge),
    }

    /// Logs every call in order. `enable_pins` fails for any option listed
    /// in `unmapped`.
    #[derive(Default)]
    pub struct FakeSys {
        pub calls: RefCell<Vec<Call>>,
        pub unmapped: Vec<(Peripheral, PinOption)>,
        pub handlers: RefCell<Vec<(Vector, Handler)>>,
    }

    impl FakeSys {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn clear(&self) {
            self.calls.borrow_mut().clear();
        }

        /// Runs the handler most recently attached to `vector`, as the
        /// interrupt would.
        pub fn fire(&self, vector: Vector) {
            let h = self
                .handlers
                .borrow()
                .iter()
                .rev()
                .find(|(v, _)| *v == vector)
                .map(|(_, h)| *h);
            if let Some(h) = h {
                h();
            }
        }

        fn log(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Sys for FakeSys {
        fn enable_pins(
            &self,
            peripheral: Peripheral,
            option: PinOption,
        ) -> Result<(), SysError> {
            self.log(Call::EnablePins(peripheral, option));
            if self.unmapped.contains(&(peripheral, option)) {
                Err(SysError::NoPinMapping)
            } else {
                Ok(())
            }
        }

        fn disable_pins(&self, peripheral: Peripheral) {
            self.log(Call::DisablePins(peripheral));
        }

        fn power(&self, peripheral: Peripheral, on: bool) {
            self.log(Call::Power(peripheral, on));
        }

        fn set_interrupt(&self, vector: Vector, level: u8) {
            self.log(Call::SetInterrupt(vector, level));
        }

        fn attach(&self, vector: Vector, handler: Handler) {
            self.log(Call::Attach(vector));
            self.handlers.borrow_mut().push((vector, handler));
        }

        fn set_irq_edge(&self, irq: u8, edge: Edge) -> Result<(), SysError> {
            self.log(Call::SetIrqEdge(irq, edge));
            if irq < 16 {
                Ok(())
            } else {
                Err(SysError::NotAnIrq)
            }
        }
    }
}
