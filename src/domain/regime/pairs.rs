//! Pairs spread z-score.

use crate::domain::indicator::{mean, sample_std};

pub const DEFAULT_PAIRS_WINDOW: usize = 30;

/// |z| above this is an entry signal.
pub const ENTRY_THRESHOLD: f64 = 2.0;

/// Z-score of the latest log-price spread `ln a - ln b` against the last
/// `window` spreads. Unequal series are right-aligned to their common suffix.
///
/// `None` when the aligned series are shorter than `window`, `window < 2`,
/// any price in the window is non-positive, or the spread has no dispersion.
pub fn pairs_zscore(a: &[f64], b: &[f64], window: usize) -> Option<f64> {
    let len = a.len().min(b.len());
    if window < 2 || len < window {
        return None;
    }
    let a = &a[a.len() - window..];
    let b = &b[b.len() - window..];
    if a.iter().chain(b).any(|p| !(p.is_finite() && *p > 0.0)) {
        return None;
    }

    let spread: Vec<f64> = a.iter().zip(b).map(|(x, y)| x.ln() - y.ln()).collect();
    let m = mean(&spread)?;
    let sd = sample_std(&spread)?;
    if sd == 0.0 || !sd.is_finite() {
        return None;
    }
    let last = *spread.last()?;
    Some((last - m) / sd)
}

pub fn is_entry_signal(z: f64) -> bool {
    z.abs() > ENTRY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identical_series_have_no_dispersion() {
        let a = vec![100.0; 40];
        assert!(pairs_zscore(&a, &a, 30).is_none());
    }

    #[test]
    fn short_or_invalid_inputs() {
        assert!(pairs_zscore(&[1.0; 10], &[1.0; 10], 30).is_none());
        assert!(pairs_zscore(&[1.0, 2.0], &[1.0, 2.0], 1).is_none());
        let mut a: Vec<f64> = (1..=5).map(f64::from).collect();
        a[2] = 0.0;
        assert!(pairs_zscore(&a, &[1.0, 2.0, 3.0, 4.0, 5.0], 5).is_none());
    }

    #[test]
    fn diverging_last_point_is_an_entry() {
        // b constant; spread is ln a - ln 10. Four flat points then a jump.
        let a = [10.0, 10.0, 10.0, 10.0, 10.0 * 1f64.exp()];
        let b = [10.0; 5];
        let z = pairs_zscore(&a, &b, 5).unwrap();
        // spread [0,0,0,0,1]: mean 0.2, sample std sqrt(0.2)
        assert_relative_eq!(z, 0.8 / 0.2f64.sqrt(), epsilon = 1e-9);
        assert!(!is_entry_signal(z));
        assert!(is_entry_signal(-2.5));
    }

    #[test]
    fn unequal_lengths_are_right_aligned() {
        let a = [999.0, 1.0, 2.0, 3.0];
        let b = [1.0, 1.0, 1.0];
        let aligned = pairs_zscore(&a[1..], &b, 3).unwrap();
        assert_relative_eq!(pairs_zscore(&a, &b, 3).unwrap(), aligned);
    }
}
