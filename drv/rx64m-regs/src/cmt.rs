// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compare match timers. Channels come in pairs that share a start
//! register (CMSTR0 for CMT0/1, CMSTR1 for CMT2/3).

use regmap::{register_block, Field, Reg};

register_block! {
    pub struct RegisterBlock {
        0x00 => pub cmcr: Reg<u16>,
        0x02 => pub cmcnt: Reg<u16>,
        0x04 => pub cmcor: Reg<u16>,
    }
}

pub const CMT0: *const RegisterBlock = 0x0008_8002 as *const _;
pub const CMT1: *const RegisterBlock = 0x0008_8008 as *const _;
pub const CMT2: *const RegisterBlock = 0x0008_8012 as *const _;
pub const CMT3: *const RegisterBlock = 0x0008_8018 as *const _;

pub const CMSTR0: *const Reg<u16> = 0x0008_8000 as *const _;
pub const CMSTR1: *const Reg<u16> = 0x0008_8010 as *const _;

/// Block, start register and start bit for channel `n`.
pub const fn channel(
    n: u8,
) -> Option<(*const RegisterBlock, *const Reg<u16>, Field)> {
    match n {
        0 => Some((CMT0, CMSTR0, Field::bit(0))),
        1 => Some((CMT1, CMSTR0, Field::bit(1))),
        2 => Some((CMT2, CMSTR1, Field::bit(0))),
        3 => Some((CMT3, CMSTR1, Field::bit(1))),
        _ => None,
    }
}

/// Compare match timer control register.
pub mod cmcr {
    use super::Field;

    /// PCLK / 8, 32, 128, 512
    pub const CKS: Field = Field::new(0, 2);
    pub const CMIE: Field = Field::bit(6);
    /// Reserved; reads as 1 and must be written as 1.
    pub const RESERVED: Field = Field::bit(7);
}
