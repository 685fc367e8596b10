// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serial Peripheral Interface (RSPI).

use regmap::{register_block, Field, Reg, RO};

register_block! {
    pub struct RegisterBlock {
        0x00 => pub spcr: Reg<u8>,
        0x01 => pub sslp: Reg<u8>,
        0x02 => pub sppcr: Reg<u8>,
        0x03 => pub spsr: Reg<u8>,
        0x04 => pub spdr: Reg<u32>,
        0x08 => pub spscr: Reg<u8>,
        0x09 => pub spssr: Reg<u8, RO>,
        0x0a => pub spbr: Reg<u8>,
        0x0b => pub spdcr: Reg<u8>,
        0x0c => pub spckd: Reg<u8>,
        0x0d => pub sslnd: Reg<u8>,
        0x0e => pub spnd: Reg<u8>,
        0x0f => pub spcr2: Reg<u8>,
        0x10 => pub spcmd: [Reg<u16>; 8],
        0x20 => pub spdcr2: Reg<u8>,
    }
}

pub const RSPI0: *const RegisterBlock = 0x000d_0100 as *const _;

/// Control register.
pub mod spcr {
    use super::Field;

    /// Clock-synchronous (3-wire) operation
    pub const SPMS: Field = Field::bit(0);
    pub const TXMD: Field = Field::bit(1);
    pub const MODFEN: Field = Field::bit(2);
    /// Master mode
    pub const MSTR: Field = Field::bit(3);
    pub const SPEIE: Field = Field::bit(4);
    pub const SPTIE: Field = Field::bit(5);
    /// Function enable
    pub const SPE: Field = Field::bit(6);
    pub const SPRIE: Field = Field::bit(7);
}

/// Status register.
pub mod spsr {
    use super::Field;

    pub const OVRF: Field = Field::bit(0);
    pub const IDLNF: Field = Field::bit(1);
    pub const MODF: Field = Field::bit(2);
    pub const PERF: Field = Field::bit(3);
    pub const UDRF: Field = Field::bit(4);
    pub const SPTEF: Field = Field::bit(5);
    /// Receive buffer full
    pub const SPRF: Field = Field::bit(7);
}

/// Data control register.
pub mod spdcr {
    use super::Field;

    pub const SPFC: Field = Field::new(0, 2);
    pub const SPRDTD: Field = Field::bit(4);
    /// Longword access to SPDR
    pub const SPLW: Field = Field::bit(5);
}

/// Command registers 0-7.
pub mod spcmd {
    use super::Field;

    pub const CPHA: Field = Field::bit(0);
    pub const CPOL: Field = Field::bit(1);
    /// Bit-rate division: SPBR-derived rate divided by 2^BRDV
    pub const BRDV: Field = Field::new(2, 2);
    pub const SSLA: Field = Field::new(4, 3);
    pub const SSLKP: Field = Field::bit(7);
    /// Data length; see the driver for the encoding
    pub const SPB: Field = Field::new(8, 4);
    pub const LSBF: Field = Field::bit(12);
    pub const SPNDEN: Field = Field::bit(13);
    pub const SLNDEN: Field = Field::bit(14);
    pub const SCKDEN: Field = Field::bit(15);
}
