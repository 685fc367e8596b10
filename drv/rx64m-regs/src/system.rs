// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module stop control and register write protection.

use regmap::{register_block, Field, Reg};

register_block! {
    pub struct Mstp {
        0x00 => pub mstpcra: Reg<u32>,
        0x04 => pub mstpcrb: Reg<u32>,
        0x08 => pub mstpcrc: Reg<u32>,
        0x0c => pub mstpcrd: Reg<u32>,
    }
}

pub const MSTP: *const Mstp = 0x0008_0010 as *const _;

/// Protect register. Writes only land if the upper byte is [`prcr::KEY`].
pub const PRCR: *const Reg<u16> = 0x0008_03fe as *const _;

pub mod prcr {
    use super::Field;

    pub const KEY: u16 = 0xa500;
    /// Clock generation
    pub const PRC0: Field = Field::bit(0);
    /// Operating modes, low power (including module stop)
    pub const PRC1: Field = Field::bit(1);
    pub const PRC3: Field = Field::bit(3);
}

/// Module stop bits in MSTPCRA. A set bit stops the module.
pub mod mstpcra {
    use super::Field;

    pub const TPU0: Field = Field::bit(13);
    pub const CMT2_3: Field = Field::bit(14);
    pub const CMT0_1: Field = Field::bit(15);
    pub const DA: Field = Field::bit(19);
}

pub mod mstpcrb {
    use super::Field;

    pub const SCI12: Field = Field::bit(4);
    pub const RSPI0: Field = Field::bit(17);
    pub const SCI7: Field = Field::bit(24);
    pub const SCI6: Field = Field::bit(25);
    pub const SCI5: Field = Field::bit(26);
    pub const SCI4: Field = Field::bit(27);
    pub const SCI3: Field = Field::bit(28);
    pub const SCI2: Field = Field::bit(29);
    pub const SCI1: Field = Field::bit(30);
    pub const SCI0: Field = Field::bit(31);
}
