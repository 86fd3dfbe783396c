//! Three-state, one-dimensional Gaussian hidden Markov model.
//!
//! Fitting is Baum-Welch with forward/backward passes carried out in log
//! space. Initialization is deterministic: observations are sorted and split
//! into three equal chunks whose moments seed the emissions.

use std::f64::consts::PI;

use crate::domain::error::FitError;

pub const STATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 100,
            tolerance: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianHmm {
    pub start: [f64; STATES],
    pub transitions: [[f64; STATES]; STATES],
    pub means: [f64; STATES],
    pub variances: [f64; STATES],
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn log_normal(x: f64, mean: f64, var: f64) -> f64 {
    let d = x - mean;
    -0.5 * ((2.0 * PI * var).ln() + d * d / var)
}

fn moments(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var)
}

impl GaussianHmm {
    /// Quantile initialization. Needs at least `STATES` observations.
    fn initial(obs: &[f64], var_floor: f64) -> GaussianHmm {
        let mut sorted = obs.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let mut means = [0.0; STATES];
        let mut variances = [0.0; STATES];
        for k in 0..STATES {
            let chunk = &sorted[k * n / STATES..(k + 1) * n / STATES];
            let (m, v) = moments(chunk);
            means[k] = m;
            variances[k] = v.max(var_floor);
        }

        let mut transitions = [[0.05; STATES]; STATES];
        for (i, row) in transitions.iter_mut().enumerate() {
            row[i] = 0.9;
        }

        GaussianHmm {
            start: [1.0 / STATES as f64; STATES],
            transitions,
            means,
            variances,
        }
    }

    fn log_emissions(&self, obs: &[f64]) -> Vec<[f64; STATES]> {
        obs.iter()
            .map(|&x| {
                let mut row = [0.0; STATES];
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell = log_normal(x, self.means[j], self.variances[j]);
                }
                row
            })
            .collect()
    }

    fn log_transitions(&self) -> [[f64; STATES]; STATES] {
        let mut out = [[0.0; STATES]; STATES];
        for i in 0..STATES {
            for j in 0..STATES {
                out[i][j] = self.transitions[i][j].ln();
            }
        }
        out
    }

    fn is_finite(&self) -> bool {
        self.means.iter().all(|v| v.is_finite())
            && self.variances.iter().all(|v| v.is_finite() && *v > 0.0)
            && self.start.iter().all(|v| v.is_finite())
            && self.transitions.iter().flatten().all(|v| v.is_finite())
    }

    /// Fits a model to `obs`. Fails on degenerate input, on a non-finite
    /// log-likelihood, or when the log-likelihood has not settled within
    /// `options.tolerance` after `options.max_iterations` rounds.
    pub fn fit(obs: &[f64], options: FitOptions) -> Result<GaussianHmm, FitError> {
        if obs.len() < STATES {
            return Err(FitError::Degenerate {
                reason: format!("{} observations for {STATES} states", obs.len()),
            });
        }
        if obs.iter().any(|v| !v.is_finite()) {
            return Err(FitError::Degenerate {
                reason: "non-finite observation".into(),
            });
        }
        let (_, overall_var) = moments(obs);
        let all_equal = obs.iter().all(|v| *v == obs[0]);
        if all_equal || overall_var <= 0.0 || !overall_var.is_finite() {
            return Err(FitError::Degenerate {
                reason: "zero variance".into(),
            });
        }
        let var_floor = (overall_var * 1e-3).max(1e-12);

        let mut model = GaussianHmm::initial(obs, var_floor);
        let mut previous: Option<f64> = None;

        for iteration in 0..options.max_iterations {
            let step = model.expectation(obs);
            if !step.log_likelihood.is_finite() {
                return Err(FitError::NonFinite { iteration });
            }
            if let Some(prev) = previous {
                if (step.log_likelihood - prev).abs() < options.tolerance {
                    return Ok(model);
                }
            }
            previous = Some(step.log_likelihood);

            model = model.maximization(obs, &step, var_floor);
            if !model.is_finite() {
                return Err(FitError::NonFinite { iteration });
            }
        }

        Err(FitError::NonConvergence {
            iterations: options.max_iterations,
        })
    }

    fn expectation(&self, obs: &[f64]) -> Expectation {
        let t_len = obs.len();
        let log_b = self.log_emissions(obs);
        let log_a = self.log_transitions();

        let mut alpha = vec![[0.0; STATES]; t_len];
        for j in 0..STATES {
            alpha[0][j] = self.start[j].ln() + log_b[0][j];
        }
        for t in 1..t_len {
            for j in 0..STATES {
                let terms: [f64; STATES] = std::array::from_fn(|i| alpha[t - 1][i] + log_a[i][j]);
                alpha[t][j] = log_sum_exp(&terms) + log_b[t][j];
            }
        }
        let log_likelihood = log_sum_exp(&alpha[t_len - 1]);

        let mut beta = vec![[0.0; STATES]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..STATES {
                let terms: [f64; STATES] =
                    std::array::from_fn(|j| log_a[i][j] + log_b[t + 1][j] + beta[t + 1][j]);
                beta[t][i] = log_sum_exp(&terms);
            }
        }

        let gamma: Vec<[f64; STATES]> = (0..t_len)
            .map(|t| std::array::from_fn(|j| (alpha[t][j] + beta[t][j] - log_likelihood).exp()))
            .collect();

        let mut xi = [[0.0; STATES]; STATES];
        for t in 0..t_len - 1 {
            for i in 0..STATES {
                for j in 0..STATES {
                    xi[i][j] += (alpha[t][i] + log_a[i][j] + log_b[t + 1][j] + beta[t + 1][j]
                        - log_likelihood)
                        .exp();
                }
            }
        }

        Expectation {
            gamma,
            xi,
            log_likelihood,
        }
    }

    fn maximization(&self, obs: &[f64], step: &Expectation, var_floor: f64) -> GaussianHmm {
        let mut next = self.clone();

        let start_sum: f64 = step.gamma[0].iter().sum();
        if start_sum > 0.0 {
            for j in 0..STATES {
                next.start[j] = step.gamma[0][j] / start_sum;
            }
        }

        for i in 0..STATES {
            let row_sum: f64 = step.xi[i].iter().sum();
            if row_sum > 0.0 {
                for j in 0..STATES {
                    next.transitions[i][j] = step.xi[i][j] / row_sum;
                }
            }
        }

        for j in 0..STATES {
            let weight: f64 = step.gamma.iter().map(|g| g[j]).sum();
            if weight <= f64::MIN_POSITIVE {
                continue;
            }
            let mean = step
                .gamma
                .iter()
                .zip(obs)
                .map(|(g, x)| g[j] * x)
                .sum::<f64>()
                / weight;
            let var = step
                .gamma
                .iter()
                .zip(obs)
                .map(|(g, x)| g[j] * (x - mean) * (x - mean))
                .sum::<f64>()
                / weight;
            next.means[j] = mean;
            next.variances[j] = var.max(var_floor);
        }

        next
    }

    /// Most likely state sequence. Ties go to the lowest state index.
    pub fn viterbi(&self, obs: &[f64]) -> Vec<usize> {
        if obs.is_empty() {
            return Vec::new();
        }
        let log_b = self.log_emissions(obs);
        let log_a = self.log_transitions();
        let t_len = obs.len();

        let mut delta = vec![[f64::NEG_INFINITY; STATES]; t_len];
        let mut psi = vec![[0usize; STATES]; t_len];
        for j in 0..STATES {
            delta[0][j] = self.start[j].ln() + log_b[0][j];
        }

        for t in 1..t_len {
            for j in 0..STATES {
                let mut best = f64::NEG_INFINITY;
                let mut best_state = 0;
                for i in 0..STATES {
                    let v = delta[t - 1][i] + log_a[i][j];
                    if v > best {
                        best = v;
                        best_state = i;
                    }
                }
                delta[t][j] = best + log_b[t][j];
                psi[t][j] = best_state;
            }
        }

        let mut last = 0;
        for j in 1..STATES {
            if delta[t_len - 1][j] > delta[t_len - 1][last] {
                last = j;
            }
        }

        let mut path = vec![0; t_len];
        path[t_len - 1] = last;
        for t in (0..t_len - 1).rev() {
            path[t] = psi[t + 1][path[t + 1]];
        }
        path
    }

    /// State indices ordered by ascending emission variance.
    pub fn states_by_variance(&self) -> [usize; STATES] {
        let mut order: [usize; STATES] = std::array::from_fn(|i| i);
        order.sort_by(|a, b| self.variances[*a].total_cmp(&self.variances[*b]));
        order
    }
}

struct Expectation {
    gamma: Vec<[f64; STATES]>,
    xi: [[f64; STATES]; STATES],
    log_likelihood: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hand_model() -> GaussianHmm {
        GaussianHmm {
            start: [1.0 / 3.0; STATES],
            transitions: [[0.8, 0.1, 0.1], [0.1, 0.8, 0.1], [0.1, 0.1, 0.8]],
            means: [-5.0, 0.0, 5.0],
            variances: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn log_sum_exp_handles_all_negative_infinity() {
        assert_eq!(
            log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            f64::NEG_INFINITY
        );
        assert_relative_eq!(log_sum_exp(&[0.0, 0.0]), 2f64.ln());
    }

    #[test]
    fn viterbi_follows_obvious_emissions() {
        let path = hand_model().viterbi(&[-5.1, -4.9, 0.2, 0.1, 5.3, 4.8]);
        assert_eq!(path, vec![0, 0, 1, 1, 2, 2]);
        assert!(hand_model().viterbi(&[]).is_empty());
    }

    #[test]
    fn constant_input_is_degenerate() {
        let err = GaussianHmm::fit(&[0.01; 20], FitOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::Degenerate { .. }));
    }

    #[test]
    fn too_few_observations_is_degenerate() {
        let err = GaussianHmm::fit(&[0.1, 0.2], FitOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::Degenerate { .. }));
    }

    #[test]
    fn zero_iterations_never_converges() {
        let obs: Vec<f64> = (0..30).map(|i| ((i * 7 % 11) as f64 - 5.0) / 100.0).collect();
        let err = GaussianHmm::fit(
            &obs,
            FitOptions {
                max_iterations: 0,
                tolerance: 0.01,
            },
        )
        .unwrap_err();
        assert_eq!(err, FitError::NonConvergence { iterations: 0 });
    }

    #[test]
    fn quantile_initialization_is_ordered() {
        let obs: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let model = GaussianHmm::initial(&obs, 1e-12);
        assert_relative_eq!(model.means[0], 1.0);
        assert_relative_eq!(model.means[1], 4.0);
        assert_relative_eq!(model.means[2], 7.0);
        assert_relative_eq!(model.transitions[0][0], 0.9);
        assert_relative_eq!(model.transitions[0][1], 0.05);
    }

    #[test]
    fn fit_is_deterministic() {
        let obs: Vec<f64> = (0..60)
            .map(|i| ((i * 13 % 17) as f64 - 8.0) / if i < 30 { 1000.0 } else { 50.0 })
            .collect();
        let a = GaussianHmm::fit(&obs, FitOptions::default());
        let b = GaussianHmm::fit(&obs, FitOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn states_sorted_by_variance() {
        let mut model = hand_model();
        model.variances = [4.0, 1.0, 2.0];
        assert_eq!(model.states_by_variance(), [1, 2, 0]);
    }
}
