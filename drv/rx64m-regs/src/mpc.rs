// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multi-function pin controller.

use regmap::{register_block, Field, Reg};

register_block! {
    pub struct RegisterBlock {
        0x00 => _reserved0: [u8; 0x1f],
        0x1f => pub pwpr: Reg<u8>,
        0x20 => _reserved1: [u8; 0x20],
        /// Pin function selects, indexed by [`pfs_index`]
        0x40 => pub pfs: [Reg<u8>; 256],
    }
}

pub const MPC: *const RegisterBlock = 0x0008_c100 as *const _;

pub const fn pfs_index(port: u8, bit: u8) -> usize {
    port as usize * 8 + bit as usize
}

/// Write-protect register. PFS writes need B0WI clear, then PFSWE set.
pub mod pwpr {
    use super::Field;

    pub const PFSWE: Field = Field::bit(6);
    pub const B0WI: Field = Field::bit(7);
}

pub mod pfs {
    use super::Field;

    pub const PSEL: Field = Field::new(0, 6);
    /// Use the pin as an IRQ input
    pub const ISEL: Field = Field::bit(6);
    /// Use the pin as an analog input/output
    pub const ASEL: Field = Field::bit(7);
}
