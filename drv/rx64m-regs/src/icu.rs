// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt controller (ICUA).

use regmap::{register_block, Field, Reg};

register_block! {
    pub struct RegisterBlock {
        /// Interrupt request flags, one register per vector
        0x000 => pub ir: [Reg<u8>; 256],
        0x100 => pub dtcer: [Reg<u8>; 256],
        /// Interrupt enables, one bit per vector
        0x200 => pub ier: [Reg<u8>; 32],
        0x220 => _reserved0: [u8; 0xe0],
        /// Priority levels, one register per vector
        0x300 => pub ipr: [Reg<u8>; 256],
        0x400 => _reserved1: [u8; 0x100],
        0x500 => pub irqcr: [Reg<u8>; 16],
    }
}

pub const ICU: *const RegisterBlock = 0x0008_7000 as *const _;

pub mod ir {
    use super::Field;

    pub const IR: Field = Field::bit(0);
}

pub mod ipr {
    use super::Field;

    pub const IPR: Field = Field::new(0, 4);
}

pub mod irqcr {
    use super::Field;

    /// 00 low level, 01 falling, 10 rising, 11 both edges
    pub const IRQMD: Field = Field::new(2, 2);
}

/// IER register index and bit for a vector.
pub const fn ier_position(vector: u8) -> (usize, u8) {
    ((vector / 8) as usize, vector % 8)
}

/// Vector numbers.
pub mod vector {
    pub const CMI0: u8 = 28;
    pub const CMI1: u8 = 29;
    pub const CMI2: u8 = 30;
    pub const CMI3: u8 = 31;

    pub const SPRI0: u8 = 38;
    pub const SPTI0: u8 = 39;

    pub const RXI0: u8 = 58;
    pub const TXI0: u8 = 59;
    pub const RXI1: u8 = 60;
    pub const TXI1: u8 = 61;
    pub const RXI2: u8 = 62;
    pub const TXI2: u8 = 63;

    /// IRQ0; IRQn is `IRQ0 + n`
    pub const IRQ0: u8 = 64;

    pub const RXI3: u8 = 80;
    pub const TXI3: u8 = 81;
    pub const RXI4: u8 = 82;
    pub const TXI4: u8 = 83;
    pub const RXI5: u8 = 84;
    pub const TXI5: u8 = 85;
    pub const RXI6: u8 = 86;
    pub const TXI6: u8 = 87;
    pub const RXI7: u8 = 98;
    pub const TXI7: u8 = 99;

    pub const GROUPBL0: u8 = 110;

    pub const RXI12: u8 = 116;
    pub const TXI12: u8 = 117;
}
