//! Nearest-neighbour pattern forecast.

use crate::domain::indicator::{mean, population_std};

pub const DEFAULT_PATTERN_WINDOW: usize = 5;

fn normalize(window: &[f64]) -> Option<Vec<f64>> {
    let m = mean(window)?;
    let sd = population_std(window)?;
    if sd == 0.0 || !sd.is_finite() {
        return None;
    }
    Some(window.iter().map(|v| (v - m) / sd).collect())
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Finds the earlier window whose z-normalized shape is closest to the most
/// recent `window` prices and returns the simple return that followed it.
///
/// Returns 0.0 with fewer than `2 * window` prices, a flat recent window, or
/// no usable historical window. The earliest window wins ties.
pub fn pattern_forecast(prices: &[f64], window: usize) -> f64 {
    if window == 0 || prices.len() < window * 2 {
        return 0.0;
    }
    let Some(recent) = normalize(&prices[prices.len() - window..]) else {
        return 0.0;
    };

    let mut best: Option<(usize, f64)> = None;
    for i in 0..prices.len() - window * 2 {
        let Some(past) = normalize(&prices[i..i + window]) else {
            continue;
        };
        let dist = distance(&recent, &past);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }

    match best {
        Some((i, _)) => {
            let before = prices[i + window - 1];
            let after = prices[i + window];
            let r = (after - before) / before;
            if r.is_finite() { r } else { 0.0 }
        }
        None => 0.0,
    }
}
