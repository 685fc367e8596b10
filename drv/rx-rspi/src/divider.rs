// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bit-rate divider search.
//!
//! The RSPI bit rate is `PCLK / (2 * (SPBR + 1) * 2^BRDV)`, with SPBR an
//! 8-bit base divisor and BRDV a 2-bit prescale. We look for the smallest
//! prescale that brings the ratio `PCLK / rate` into the base divisor's
//! range, then round the halved ratio up so the result never runs faster
//! than the rounded-down ratio asks for.

/// A `(BRDV, SPBR)` pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Divider {
    /// Prescale exponent, 0..=3.
    pub brdv: u8,
    /// Base divisor.
    pub spbr: u8,
}

impl Divider {
    /// The slowest rate the peripheral can produce.
    pub const SLOWEST: Self = Self {
        brdv: 3,
        spbr: 255,
    };

    /// Total clock division this pair applies to PCLK.
    pub const fn ratio(self) -> u32 {
        (2 * (self.spbr as u32 + 1)) << self.brdv
    }

    /// The bit rate this pair produces from `pclk`.
    pub const fn bit_rate(self, pclk: u32) -> u32 {
        pclk / self.ratio()
    }
}

/// Requested rate can't be reached; `clamped` is the closest (slowest)
/// setting, which callers apply anyway.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutOfRange {
    pub clamped: Divider,
}

/// Largest ratio the base divisor handles before the prescale has to step
/// in.
const BASE_LIMIT: u32 = 512;
const MAX_BRDV: u8 = 3;

/// Finds the divider for `rate` given peripheral clock `pclk`.
///
/// A zero `rate` is unreachable and clamps like any other too-slow request.
pub fn compute(rate: u32, pclk: u32) -> Result<Divider, OutOfRange> {
    let clamp = OutOfRange {
        clamped: Divider::SLOWEST,
    };

    let mut br = pclk.checked_div(rate).ok_or(clamp)?;
    let mut brdv = 0;
    while br > BASE_LIMIT {
        br >>= 1;
        brdv += 1;
        if brdv > MAX_BRDV {
            return Err(clamp);
        }
    }

    // Halve, rounding up.
    br = if br & 1 != 0 { (br >> 1) + 1 } else { br >> 1 };
    if br != 0 {
        br -= 1;
    }

    // br <= 256 before the decrement, so this fits.
    Ok(Divider {
        brdv,
        spbr: br as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn forty_mhz_to_one_mhz() {
        let d = compute(1_000_000, 40_000_000).unwrap();
        assert_eq!(d, Divider { brdv: 0, spbr: 19 });
        assert_eq!(d.bit_rate(40_000_000), 1_000_000);
    }

    #[test]
    fn odd_ratio_rounds_up() {
        // 100 MHz / 3 MHz = 33, halved up to 17, so SPBR 16 and 2.94 MHz.
        let d = compute(3_000_000, 100_000_000).unwrap();
        assert_eq!(d, Divider { brdv: 0, spbr: 16 });
        assert!(d.bit_rate(100_000_000) <= 3_000_000);
    }

    #[test]
    fn prescale_engages_above_512() {
        // 100 MHz / 100 kHz = 1000 -> 500 with BRDV 1 -> SPBR 249.
        let d = compute(100_000, 100_000_000).unwrap();
        assert_eq!(d, Divider { brdv: 1, spbr: 249 });
        assert_eq!(d.bit_rate(100_000_000), 100_000);
    }

    #[test]
    fn top_of_range_still_fits() {
        // 4103 >> 3 = 512 lands exactly on the limit.
        assert_eq!(compute(1000, 4_103_000), Ok(Divider::SLOWEST));
    }

    #[test]
    fn just_past_range_clamps() {
        // 4104 >> 3 = 513 needs a fourth halving.
        assert_eq!(
            compute(1000, 4_104_000),
            Err(OutOfRange {
                clamped: Divider::SLOWEST
            })
        );
    }

    #[test]
    fn faster_than_pclk() {
        // Ratio 0: SPBR stays 0 and we get PCLK / 2.
        let d = compute(200_000_000, 100_000_000).unwrap();
        assert_eq!(d, Divider { brdv: 0, spbr: 0 });
        assert_eq!(d.bit_rate(100_000_000), 50_000_000);
    }

    #[test]
    fn zero_rate_clamps() {
        assert_eq!(
            compute(0, 100_000_000),
            Err(OutOfRange {
                clamped: Divider::SLOWEST
            })
        );
    }

    proptest! {
        #[test]
        fn divider_brackets_requested_ratio(
            pclk in 1_000_000u32..=200_000_000,
            rate in 1u32..=100_000_000,
        ) {
            prop_assume!(rate <= pclk);
            let ratio = pclk / rate;
            match compute(rate, pclk) {
                Ok(d) => {
                    prop_assert!(d.brdv <= 3);
                    let step = 1u32 << d.brdv;
                    // Bits shifted out during prescaling are all we can
                    // lose; the round-up costs at most one more step.
                    prop_assert!(d.ratio() + step > ratio);
                    prop_assert!(d.ratio() <= ratio + step);
                    prop_assert!(ratio < 4104);
                }
                Err(e) => {
                    prop_assert_eq!(e.clamped, Divider::SLOWEST);
                    prop_assert!(ratio >= 4104);
                }
            }
        }
    }
}
