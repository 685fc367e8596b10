// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pin assignments for each peripheral and option.

use drv_rx64m_regs::port::*;
use drv_rx_sys_api::{Peripheral, PinOption};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Function {
    /// Peripheral function selected through PSEL, pin in peripheral mode.
    Psel(u8),
    /// External interrupt input.
    Irq,
    /// Analog input or output.
    Analog,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pin {
    pub port: u8,
    pub bit: u8,
    pub function: Function,
}

const fn psel(port: u8, bit: u8, sel: u8) -> Pin {
    Pin {
        port,
        bit,
        function: Function::Psel(sel),
    }
}

const fn irq(port: u8, bit: u8) -> Pin {
    Pin {
        port,
        bit,
        function: Function::Irq,
    }
}

const fn analog(port: u8, bit: u8) -> Pin {
    Pin {
        port,
        bit,
        function: Function::Analog,
    }
}

// PSEL codes from the MPC chapter of the hardware manual.
const SCI: u8 = 0b01010;
const SCI12: u8 = 0b01100;
const RSPI: u8 = 0b01101;

/// Returns the pins that carry `peripheral` under `option`, or `None` if the
/// part doesn't offer that assignment.
pub fn lookup(peripheral: Peripheral, option: PinOption) -> Option<&'static [Pin]> {
    use Peripheral::*;
    use PinOption::*;

    // Inline const blocks so each table is a promoted `'static`.
    let pins: &'static [Pin] = match (peripheral, option) {
        // TXD first, then RXD (then SCK where routed).
        (Sci0, First) => &const { [psel(P2, 0, SCI), psel(P2, 1, SCI)] },
        (Sci1, First) => &const { [psel(PF, 0, SCI), psel(PF, 2, SCI)] },
        (Sci2, First) => &const { [psel(P1, 3, SCI), psel(P1, 2, SCI)] },
        (Sci2, Second) => {
            &const { [psel(P5, 0, SCI), psel(P5, 2, SCI), psel(P5, 1, SCI)] }
        }
        (Sci3, First) => &const { [psel(P2, 3, SCI), psel(P2, 5, SCI)] },
        (Sci4, First) => &const { [psel(PB, 1, SCI), psel(PB, 0, SCI)] },
        (Sci5, First) => &const { [psel(PA, 4, SCI), psel(PA, 2, SCI)] },
        (Sci6, First) => &const { [psel(P0, 0, SCI), psel(P0, 1, SCI)] },
        (Sci7, First) => &const { [psel(P9, 0, SCI), psel(P9, 2, SCI)] },
        (Sci12, First) => {
            &const { [psel(PE, 1, SCI12), psel(PE, 2, SCI12)] }
        }

        // RSPCKA, MOSIA, MISOA
        (Rspi0, First) => &const {
            [psel(PC, 5, RSPI), psel(PC, 6, RSPI), psel(PC, 7, RSPI)]
        },
        (Rspi0, Second) => &const {
            [psel(PA, 5, RSPI), psel(PA, 6, RSPI), psel(PA, 7, RSPI)]
        },

        (Irq(4), First) => &const { [irq(P1, 4)] },
        (Irq(4), Second) => &const { [irq(PF, 5)] },
        (Irq(6), First) => &const { [irq(P1, 6)] },

        // DA0, DA1
        (Da, First) => &const { [analog(P0, 3), analog(P0, 5)] },

        _ => return None,
    };
    Some(pins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_rx_sys_api::{Peripheral::*, PinOption::*};

    #[test]
    fn every_mapped_assignment() {
        let table: &[(Peripheral, PinOption, &[(u8, u8)])] = &[
            (Sci0, First, &[(P2, 0), (P2, 1)]),
            (Sci1, First, &[(PF, 0), (PF, 2)]),
            (Sci2, First, &[(P1, 3), (P1, 2)]),
            (Sci2, Second, &[(P5, 0), (P5, 2), (P5, 1)]),
            (Sci3, First, &[(P2, 3), (P2, 5)]),
            (Sci4, First, &[(PB, 1), (PB, 0)]),
            (Sci5, First, &[(PA, 4), (PA, 2)]),
            (Sci6, First, &[(P0, 0), (P0, 1)]),
            (Sci7, First, &[(P9, 0), (P9, 2)]),
            (Sci12, First, &[(PE, 1), (PE, 2)]),
            (Rspi0, First, &[(PC, 5), (PC, 6), (PC, 7)]),
            (Rspi0, Second, &[(PA, 5), (PA, 6), (PA, 7)]),
            (Irq(4), First, &[(P1, 4)]),
            (Irq(4), Second, &[(PF, 5)]),
            (Irq(6), First, &[(P1, 6)]),
            (Da, First, &[(P0, 3), (P0, 5)]),
        ];

        for &(peripheral, option, expected) in table {
            let pins = lookup(peripheral, option)
                .unwrap_or_else(|| panic!("{peripheral:?} {option:?}"));
            let at: Vec<_> = pins.iter().map(|p| (p.port, p.bit)).collect();
            assert_eq!(at, expected, "{peripheral:?} {option:?}");

            let function = pins[0].function;
            assert!(pins.iter().all(|p| p.function == function));
            match peripheral {
                Sci12 => assert_eq!(function, Function::Psel(SCI12)),
                Rspi0 => assert_eq!(function, Function::Psel(RSPI)),
                Irq(_) => assert_eq!(function, Function::Irq),
                Da => assert_eq!(function, Function::Analog),
                _ => assert_eq!(function, Function::Psel(SCI)),
            }
        }
    }

    #[test]
    fn unmapped_assignments() {
        assert_eq!(lookup(Sci0, Second), None);
        assert_eq!(lookup(Rspi0, Third), None);
        assert_eq!(lookup(Irq(5), First), None);
        assert_eq!(lookup(Cmt0, First), None);
    }
}
