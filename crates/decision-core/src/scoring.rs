//! Small numeric helpers shared by the scoring stages.
//!
//! Every stage expresses its output on a 0.0 to 1.0 scale, so most of these
//! map an unbounded measurement onto the unit interval.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Clamp to [0, 1]. NaN maps to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Linear ramp: 0 at `start`, 1 at `start + span`, clamped.
pub fn ramp(value: f64, start: f64, span: f64) -> f64 {
    if span <= 0.0 {
        return if value >= start { 1.0 } else { 0.0 };
    }
    clamp_unit((value - start) / span)
}

/// Saturating map of a non-negative quantity onto [0, 1) via tanh.
pub fn squash(value: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return 0.0;
    }
    clamp_unit((value.abs() / scale).tanh())
}

/// Mean of the `k` largest values. Reorders `data`.
pub fn top_k_mean(data: &mut [f64], k: usize) -> f64 {
    if data.is_empty() || k == 0 {
        return 0.0;
    }
    data.sort_by(|a, b| b.total_cmp(a));
    let take = k.min(data.len());
    mean(&data[..take])
}

/// Convert a validated float price to a cent-rounded decimal
pub fn to_price(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp() {
        assert_eq!(ramp(1.0, 1.1, 0.5), 0.0);
        assert!((ramp(1.45, 1.1, 0.5) - 0.7).abs() < 1e-9);
        assert_eq!(ramp(5.0, 1.1, 0.5), 1.0);
    }

    #[test]
    fn test_squash() {
        assert!((squash(-40000.0, 50000.0) - 0.8f64.tanh()).abs() < 1e-12);
        assert_eq!(squash(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_top_k_mean() {
        let mut data = vec![0.1, 0.9, 0.5, 0.7];
        assert!((top_k_mean(&mut data, 3) - 0.7).abs() < 1e-9);
        let mut short = vec![0.4];
        assert!((top_k_mean(&mut short, 3) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_to_price() {
        assert_eq!(to_price(45945.5), Some(Decimal::new(4594550, 2)));
        assert_eq!(to_price(f64::NAN), None);
    }

    #[test]
    fn test_clamp_unit_nan() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
    }
}
