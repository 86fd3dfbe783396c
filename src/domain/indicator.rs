//! Price-series statistics used by the oracles and training sessions.

/// Simple moving average of the last `period` values ending at `end`
/// (inclusive). `None` until `period` values are available.
pub fn sma_at(values: &[f64], period: usize, end: usize) -> Option<f64> {
    if period == 0 || end >= values.len() || end + 1 < period {
        return None;
    }
    let window = &values[end + 1 - period..=end];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Simple period-over-period returns; non-finite results are dropped.
pub fn pct_changes(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .filter(|r| r.is_finite())
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator). `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Population standard deviation (n denominator).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Volatility of simple returns: sample std of period-over-period changes.
pub fn pct_change_std(prices: &[f64]) -> Option<f64> {
    sample_std(&pct_changes(prices))
}

/// RSI using simple rolling means of gains and losses (not Wilder's
/// smoothing). One entry per price; `None` during warmup and where the
/// window saw no movement at all.
///
/// Warmup: the first `window` prices (the first change is undefined).
pub fn rolling_rsi(prices: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if window == 0 || prices.len() <= window {
        return out;
    }

    let mut gains = vec![0.0; prices.len()];
    let mut losses = vec![0.0; prices.len()];
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else if change < 0.0 {
            losses[i] = -change;
        }
    }

    for i in window..prices.len() {
        let start = i + 1 - window;
        let avg_gain = gains[start..=i].iter().sum::<f64>() / window as f64;
        let avg_loss = losses[start..=i].iter().sum::<f64>() / window as f64;
        out[i] = if avg_loss == 0.0 {
            if avg_gain == 0.0 { None } else { Some(100.0) }
        } else {
            Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_basic() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(sma_at(&v, 3, 4).unwrap(), 4.0);
        assert_relative_eq!(sma_at(&v, 5, 4).unwrap(), 3.0);
        assert!(sma_at(&v, 3, 1).is_none());
        assert!(sma_at(&v, 0, 4).is_none());
        assert!(sma_at(&v, 2, 5).is_none());
    }

    #[test]
    fn pct_changes_drop_division_by_zero() {
        let r = pct_changes(&[0.0, 1.0, 2.0]);
        assert_eq!(r.len(), 1);
        assert_relative_eq!(r[0], 1.0);
    }

    #[test]
    fn std_variants() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(population_std(&v).unwrap(), 2.0);
        assert_relative_eq!(sample_std(&v).unwrap(), (32.0f64 / 7.0).sqrt());
        assert!(sample_std(&[1.0]).is_none());
        assert!(population_std(&[]).is_none());
    }

    #[test]
    fn rsi_warmup_and_extremes() {
        let rising: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let rsi = rolling_rsi(&rising, 3);
        assert_eq!(rsi.len(), 10);
        assert!(rsi[..3].iter().all(Option::is_none));
        assert_relative_eq!(rsi[3].unwrap(), 100.0);

        let falling: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        assert_relative_eq!(rolling_rsi(&falling, 3)[9].unwrap(), 0.0);

        let flat = vec![50.0; 10];
        assert!(rolling_rsi(&flat, 3)[9].is_none());
    }

    #[test]
    fn rsi_balanced_moves() {
        // +1, -1 alternating: equal average gain and loss over an even window
        let prices = [10.0, 11.0, 10.0, 11.0, 10.0];
        let rsi = rolling_rsi(&prices, 2);
        assert_relative_eq!(rsi[4].unwrap(), 50.0);
    }

    #[test]
    fn rsi_short_series() {
        assert!(rolling_rsi(&[1.0, 2.0], 14).iter().all(Option::is_none));
        assert!(rolling_rsi(&[], 14).is_empty());
    }
}
