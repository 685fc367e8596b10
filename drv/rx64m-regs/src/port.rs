// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! I/O ports. Every register array is indexed by port number; bit n of an
//! entry is pin n of that port.

use regmap::{register_block, Reg, RO};

register_block! {
    pub struct RegisterBlock {
        /// Direction, 1 = output
        0x00 => pub pdr: [Reg<u8>; 32],
        0x20 => pub podr: [Reg<u8>; 32],
        0x40 => pub pidr: [Reg<u8, RO>; 32],
        /// Mode, 1 = peripheral function
        0x60 => pub pmr: [Reg<u8>; 32],
        0x80 => _reserved0: [u8; 0x40],
        /// Input pull-up
        0xc0 => pub pcr: [Reg<u8>; 32],
    }
}

pub const PORT: *const RegisterBlock = 0x0008_c000 as *const _;

pub const P0: u8 = 0;
pub const P1: u8 = 1;
pub const P2: u8 = 2;
pub const P3: u8 = 3;
pub const P4: u8 = 4;
pub const P5: u8 = 5;
pub const P9: u8 = 9;
pub const PA: u8 = 10;
pub const PB: u8 = 11;
pub const PC: u8 = 12;
pub const PD: u8 = 13;
pub const PE: u8 = 14;
pub const PF: u8 = 15;
pub const PJ: u8 = 18;
