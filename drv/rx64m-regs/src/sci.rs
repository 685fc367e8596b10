// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serial Communications Interface (SCIg / SCIh).

use regmap::{register_block, Field, Reg, RO};

register_block! {
    pub struct RegisterBlock {
        0x00 => pub smr: Reg<u8>,
        0x01 => pub brr: Reg<u8>,
        0x02 => pub scr: Reg<u8>,
        0x03 => pub tdr: Reg<u8>,
        0x04 => pub ssr: Reg<u8>,
        0x05 => pub rdr: Reg<u8, RO>,
        0x06 => pub scmr: Reg<u8>,
        0x07 => pub semr: Reg<u8>,
        0x08 => pub snfr: Reg<u8>,
        0x09 => pub simr1: Reg<u8>,
        0x0a => pub simr2: Reg<u8>,
        0x0b => pub simr3: Reg<u8>,
        0x0c => pub sisr: Reg<u8, RO>,
        0x0d => pub spmr: Reg<u8>,
    }
}

pub const SCI0: *const RegisterBlock = 0x0008_a000 as *const _;
pub const SCI1: *const RegisterBlock = 0x0008_a020 as *const _;
pub const SCI2: *const RegisterBlock = 0x0008_a040 as *const _;
pub const SCI3: *const RegisterBlock = 0x0008_a060 as *const _;
pub const SCI4: *const RegisterBlock = 0x0008_a080 as *const _;
pub const SCI5: *const RegisterBlock = 0x0008_a0a0 as *const _;
pub const SCI6: *const RegisterBlock = 0x0008_a0c0 as *const _;
pub const SCI7: *const RegisterBlock = 0x0008_a0e0 as *const _;
pub const SCI12: *const RegisterBlock = 0x0008_b300 as *const _;

/// Block for channel `n`, if the part has it.
pub const fn channel(n: u8) -> Option<*const RegisterBlock> {
    match n {
        0 => Some(SCI0),
        1 => Some(SCI1),
        2 => Some(SCI2),
        3 => Some(SCI3),
        4 => Some(SCI4),
        5 => Some(SCI5),
        6 => Some(SCI6),
        7 => Some(SCI7),
        12 => Some(SCI12),
        _ => None,
    }
}

/// Serial mode register (asynchronous mode bits).
pub mod smr {
    use super::Field;

    /// PCLK / 4^CKS
    pub const CKS: Field = Field::new(0, 2);
    pub const MP: Field = Field::bit(2);
    pub const STOP: Field = Field::bit(3);
    pub const PM: Field = Field::bit(4);
    pub const PE: Field = Field::bit(5);
    pub const CHR: Field = Field::bit(6);
    pub const CM: Field = Field::bit(7);
}

/// Serial control register.
pub mod scr {
    use super::Field;

    pub const CKE: Field = Field::new(0, 2);
    pub const TEIE: Field = Field::bit(2);
    pub const MPIE: Field = Field::bit(3);
    pub const RE: Field = Field::bit(4);
    pub const TE: Field = Field::bit(5);
    pub const RIE: Field = Field::bit(6);
    pub const TIE: Field = Field::bit(7);
}

/// Serial status register. Error flags are cleared by writing 0 after
/// reading them as 1.
pub mod ssr {
    use super::Field;

    pub const MPBT: Field = Field::bit(0);
    pub const MPB: Field = Field::bit(1);
    pub const TEND: Field = Field::bit(2);
    pub const PER: Field = Field::bit(3);
    pub const FER: Field = Field::bit(4);
    pub const ORER: Field = Field::bit(5);
    pub const RDRF: Field = Field::bit(6);
    pub const TDRE: Field = Field::bit(7);

    /// All three receive error flags.
    pub const ERRORS: u8 = (1 << 3) | (1 << 4) | (1 << 5);
}

/// Serial extended mode register.
pub mod semr {
    use super::Field;

    pub const ACS0: Field = Field::bit(0);
    pub const BRME: Field = Field::bit(2);
    /// Base clock of 8 cycles per bit instead of 16
    pub const ABCS: Field = Field::bit(4);
    pub const NFEN: Field = Field::bit(5);
    pub const BGDM: Field = Field::bit(6);
    pub const RXDESEL: Field = Field::bit(7);
}
