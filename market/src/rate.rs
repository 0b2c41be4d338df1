use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Number of integer units per whole rate unit (1e-8 resolution).
pub const RATE_SCALE: u64 = 100_000_000;

const BPS_DENOMINATOR: u128 = 10_000;

/// Fixed-point trade rate, stored as integer units of `1 / RATE_SCALE`.
///
/// All comparisons and the target computation happen on integers so that
/// identical feeds always produce identical transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u64);

impl Rate {
    pub const ZERO: Rate = Rate(0);

    /// Sentinel "unbounded high" rate. Nothing compares greater than it.
    pub const UNBOUNDED: Rate = Rate(u64::MAX);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    /// Converts a feed rate into fixed-point units, rounding to nearest.
    pub fn from_f64(rate: f64) -> Result<Self, MarketError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(MarketError::InvalidRate(rate));
        }

        let scaled = (rate * RATE_SCALE as f64).round();
        if scaled >= u64::MAX as f64 {
            return Err(MarketError::InvalidRate(rate));
        }

        Ok(Self(scaled as u64))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `self * (1 + bps / 10_000)`, truncated. `None` if the result overflows.
    pub fn with_markup_bps(self, markup_bps: u32) -> Option<Rate> {
        let marked = u128::from(self.0) * (BPS_DENOMINATOR + u128::from(markup_bps)) / BPS_DENOMINATOR;
        u64::try_from(marked).ok().map(Rate)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Rate::UNBOUNDED {
            return f.write_str("unbounded");
        }
        write!(
            f,
            "{}.{:08}",
            self.0 / RATE_SCALE,
            self.0 % RATE_SCALE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_whole_and_fractional_rates() {
        assert_eq!(Rate::from_f64(110.0).unwrap().units(), 11_000_000_000);
        assert_eq!(Rate::from_f64(0.00000001).unwrap().units(), 1);
        assert_eq!(Rate::from_f64(0.0).unwrap(), Rate::ZERO);
    }

    #[test]
    fn rejects_unrepresentable_rates() {
        assert!(Rate::from_f64(-1.0).is_err());
        assert!(Rate::from_f64(f64::NAN).is_err());
        assert!(Rate::from_f64(f64::INFINITY).is_err());
        assert!(Rate::from_f64(1e300).is_err());
    }

    #[test]
    fn markup_uses_integer_arithmetic() {
        let entry = Rate::from_f64(110.0).unwrap();
        let target = entry.with_markup_bps(300).unwrap();

        assert_eq!(target.units(), 11_330_000_000);
        assert!(target > entry);
    }

    #[test]
    fn markup_overflow_is_reported() {
        assert_eq!(Rate::UNBOUNDED.with_markup_bps(300), None);
    }

    #[test]
    fn sentinel_dominates_every_rate() {
        let big = Rate::from_f64(1e10).unwrap();
        assert!(Rate::UNBOUNDED > big);
        assert_eq!(Rate::UNBOUNDED.to_string(), "unbounded");
    }

    #[test]
    fn display_keeps_eight_decimals() {
        assert_eq!(Rate::from_units(11_330_000_000).to_string(), "113.30000000");
        assert_eq!(Rate::from_units(5).to_string(), "0.00000005");
    }
}
