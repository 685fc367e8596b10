// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asynchronous-mode baud rate settings.

/// SMR.CKS, SEMR.ABCS and BRR for one baud rate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BaudDivider {
    /// PCLK prescale, 4^cks.
    pub cks: u8,
    /// 8 base clocks per bit instead of 16.
    pub abcs: bool,
    pub brr: u8,
}

impl BaudDivider {
    /// The rate these settings produce from `pclk`.
    pub const fn rate(self, pclk: u32) -> u32 {
        let per_bit = if self.abcs { 16 } else { 32 };
        pclk / ((per_bit << (2 * self.cks as u32)) * (self.brr as u32 + 1))
    }
}

/// Finds the settings for `baud`, preferring the finer 8-clock base where
/// the divisor allows. `None` if the rate is zero, too fast for `pclk`, or
/// too slow even with the largest prescale.
pub fn compute(baud: u32, pclk: u32) -> Option<BaudDivider> {
    let mut div = pclk.checked_div(baud)? / 16;
    let mut cks = 0;
    while div > 512 {
        div >>= 2;
        cks += 1;
        if cks > 3 {
            return None;
        }
    }
    if div == 0 {
        return None;
    }

    let abcs = div <= 256;
    if !abcs {
        div = (div + 1) / 2;
    }
    Some(BaudDivider {
        cks,
        abcs,
        // 1..=256 here
        brr: (div - 1) as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_rates() {
        let d = compute(115_200, 50_000_000).unwrap();
        assert_eq!(
            d,
            BaudDivider {
                cks: 0,
                abcs: true,
                brr: 26
            }
        );
        assert_eq!(d.rate(50_000_000), 115_740);

        let d = compute(9600, 60_000_000).unwrap();
        assert_eq!(
            d,
            BaudDivider {
                cks: 0,
                abcs: false,
                brr: 194
            }
        );
        assert_eq!(d.rate(60_000_000), 9615);
    }

    #[test]
    fn slow_rate_uses_prescale() {
        let d = compute(300, 100_000_000).unwrap();
        assert_eq!(
            d,
            BaudDivider {
                cks: 3,
                abcs: false,
                brr: 162
            }
        );
        assert_eq!(d.rate(100_000_000), 299);
    }

    #[test]
    fn out_of_range() {
        assert_eq!(compute(0, 50_000_000), None);
        assert_eq!(compute(10, 100_000_000), None);
        assert_eq!(compute(4_000_000, 50_000_000), None);
    }
}
