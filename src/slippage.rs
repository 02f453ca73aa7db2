//! Slippage estimation: ordinary least squares for the expected estimate, a
//! pinball-loss quantile regressor (0.9 quantile) for the conservative one,
//! falling back to a closed-form heuristic until enough observations have
//! accumulated.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::warn;

use crate::book::{Book, Side};

const FEATURE_COUNT: usize = 5;
const MAX_HISTORY: usize = 1000;
const MIN_TRAIN_SAMPLES: usize = 10;
const AUTO_TRAIN_THRESHOLD: usize = 50;
const QUANTILE: f64 = 0.9;
const IRLS_ITERATIONS: usize = 20;
const IRLS_EPSILON: f64 = 1e-6;

pub type Features = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Expected,
    Conservative,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlippageEstimate {
    pub expected_bps: f64,
    pub conservative_bps: f64,
    pub simulated_bps: Option<f64>,
    pub features: Features,
    pub fill_ratio: f64,
    pub available_liquidity: f64,
    pub is_trained: bool,
    pub training_samples: usize,
}

pub struct SlippageModel {
    history: VecDeque<(Features, f64)>,
    linear_coeffs: Option<DVector<f64>>,
    quantile_coeffs: Option<DVector<f64>>,
    is_trained: bool,
    training_samples: usize,
    last_mse: f64,
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SlippageModel {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(MAX_HISTORY),
            linear_coeffs: None,
            quantile_coeffs: None,
            is_trained: false,
            training_samples: 0,
            last_mse: f64::INFINITY,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    /// Push an observation; auto-trains once history reaches 50 samples and
    /// the model has never been trained (one-shot latch, see `retrain`).
    pub fn add_observation(&mut self, features: Features, actual_slippage_bps: f64) {
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((features, actual_slippage_bps));

        if self.history.len() >= AUTO_TRAIN_THRESHOLD && !self.is_trained {
            self.train();
        }
    }

    /// Force a (re)fit from the current history, regardless of the latch.
    pub fn retrain(&mut self) -> bool {
        self.train()
    }

    fn train(&mut self) -> bool {
        if self.history.len() < MIN_TRAIN_SAMPLES {
            warn!(samples = self.history.len(), "not enough data to train slippage model");
            return false;
        }

        let n = self.history.len();
        let mut x = DMatrix::zeros(n, FEATURE_COUNT + 1);
        let mut y = DVector::zeros(n);
        for (i, (features, target)) in self.history.iter().enumerate() {
            x[(i, 0)] = 1.0;
            for (j, f) in features.iter().enumerate() {
                x[(i, j + 1)] = *f;
            }
            y[i] = *target;
        }

        let linear = match fit_ols(&x, &y) {
            Some(beta) => beta,
            None => {
                warn!("slippage OLS fit failed");
                return false;
            }
        };

        self.quantile_coeffs = fit_quantile(&x, &y, QUANTILE, &linear);

        let residuals = &y - &x * &linear;
        let squared: Vec<f64> = residuals.iter().map(|r| r * r).collect();
        self.last_mse = (&squared[..]).mean();

        self.linear_coeffs = Some(linear);
        self.is_trained = true;
        self.training_samples = n;

        true
    }

    /// Predict slippage in bps for a single feature vector.
    pub fn predict(&self, features: &Features, mode: Confidence, is_buy: bool) -> f64 {
        if !self.is_trained {
            return heuristic(features, is_buy);
        }

        let linear = self
            .linear_coeffs
            .as_ref()
            .expect("linear_coeffs present once is_trained");
        let x = feature_row(features);

        match mode {
            Confidence::Expected => dot(&x, linear),
            Confidence::Conservative => {
                if let Some(quantile) = &self.quantile_coeffs {
                    dot(&x, quantile)
                } else {
                    let safety_factor = 1.0 + 2.0 * self.last_mse.sqrt();
                    dot(&x, linear) * safety_factor
                }
            }
        }
    }

    /// Derive features from the live book, predict both confidence levels,
    /// and blend in a direct orderbook simulation weighted by fill ratio.
    pub fn estimate_from_book(
        &self,
        book: &Book,
        quantity_usd: f64,
        price: f64,
        volatility: f64,
        side: Side,
    ) -> SlippageEstimate {
        let is_buy = side == Side::Buy;
        let mid = book.mid().unwrap_or(price);
        let spread_bps = book.spread().map(|s| if mid != 0.0 { s / mid * 10_000.0 } else { 0.0 }).unwrap_or(10.0);
        let imbalance = book.imbalance().unwrap_or(1.0);

        let quantity_base = if price > 0.0 { quantity_usd / price } else { 0.0 };
        let available_liquidity = book.depth_sum(side, 5);
        let relative_size = if available_liquidity > 0.0 {
            (quantity_base / available_liquidity).min(1.0)
        } else {
            1.0
        };

        let features: Features = [quantity_usd, relative_size, spread_bps, volatility, imbalance];

        let mut expected = self.predict(&features, Confidence::Expected, is_buy);
        let conservative = self.predict(&features, Confidence::Conservative, is_buy);

        let fill = book.vwap(quantity_base, side);
        let mut simulated_bps = None;
        let mut fill_ratio = 0.0;

        if let Some(vwap) = fill.vwap {
            if fill.filled > 0.0 && mid != 0.0 {
                let sim = if is_buy {
                    (vwap / mid - 1.0) * 10_000.0
                } else {
                    (1.0 - vwap / mid) * 10_000.0
                };
                simulated_bps = Some(sim);

                fill_ratio = if quantity_base > 0.0 { fill.filled / quantity_base } else { 0.0 };
                expected = sim * fill_ratio + expected * (1.0 - fill_ratio);
            }
        }

        SlippageEstimate {
            expected_bps: expected,
            conservative_bps: conservative,
            simulated_bps,
            features,
            fill_ratio,
            available_liquidity,
            is_trained: self.is_trained,
            training_samples: self.training_samples,
        }
    }
}

/// Closed-form estimate used before the model has accumulated enough
/// observations to train, and as the overlay fallback when quantile
/// regression hasn't converged.
fn heuristic(features: &Features, is_buy: bool) -> f64 {
    let [quantity_usd, _relative_size, spread_bps, volatility, imbalance] = *features;

    let mut slippage = 0.5 * spread_bps * (1.0 + 0.2 * (1.0 + quantity_usd / 100.0).ln());
    slippage *= 1.0 + 5.0 * volatility;

    let adverse = (is_buy && imbalance < 1.0) || (!is_buy && imbalance > 1.0);
    if adverse {
        slippage *= 1.0 + 0.5 * (1.0 - imbalance).abs();
    }

    slippage
}

fn feature_row(features: &Features) -> DVector<f64> {
    let mut row = DVector::zeros(FEATURE_COUNT + 1);
    row[0] = 1.0;
    for (i, f) in features.iter().enumerate() {
        row[i + 1] = *f;
    }
    row
}

fn dot(row: &DVector<f64>, coeffs: &DVector<f64>) -> f64 {
    row.dot(coeffs)
}

fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let xtx = x.transpose() * x;
    let xtx_inv = xtx.pseudo_inverse(1e-10).ok()?;
    Some(xtx_inv * x.transpose() * y)
}

/// Iteratively reweighted least squares for pinball loss at `tau`, seeded
/// from the OLS fit.
fn fit_quantile(x: &DMatrix<f64>, y: &DVector<f64>, tau: f64, beta0: &DVector<f64>) -> Option<DVector<f64>> {
    let mut beta = beta0.clone();

    for _ in 0..IRLS_ITERATIONS {
        let residuals = y - x * &beta;
        let weights = residuals.map(|r| {
            let w = if r >= 0.0 { tau } else { 1.0 - tau };
            w / (r.abs() + IRLS_EPSILON)
        });

        let w_diag = DMatrix::from_diagonal(&weights);
        let xtw = x.transpose() * &w_diag;
        let xtwx = &xtw * x;
        let xtwy = &xtw * y;

        beta = xtwx.pseudo_inverse(1e-10).ok()? * xtwy;
    }

    Some(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrained_model_uses_heuristic() {
        let model = SlippageModel::new();
        let features = [100.0, 0.1, 10.0, 0.02, 1.0];
        let expected = model.predict(&features, Confidence::Expected, true);
        assert!((expected - heuristic(&features, true)).abs() < 1e-9);
    }

    #[test]
    fn heuristic_is_bounded_for_reasonable_inputs() {
        let features = [1000.0, 0.5, 20.0, 0.05, 0.8];
        let value = heuristic(&features, true);
        assert!(value > 0.0);
        assert!(value < 1000.0);
    }

    #[test]
    fn adverse_imbalance_increases_buy_heuristic() {
        let calm = [100.0, 0.1, 10.0, 0.02, 1.0];
        let adverse = [100.0, 0.1, 10.0, 0.02, 0.5];
        assert!(heuristic(&adverse, true) > heuristic(&calm, true));
    }

    #[test]
    fn auto_trains_after_fifty_observations() {
        let mut model = SlippageModel::new();
        for i in 0..50 {
            let q = 100.0 + i as f64;
            model.add_observation([q, 0.1, 10.0, 0.02, 1.0], 5.0 + i as f64 * 0.01);
        }
        assert!(model.is_trained());
        assert_eq!(model.training_samples(), 50);
    }

    #[test]
    fn retrain_is_a_noop_below_minimum_samples() {
        let mut model = SlippageModel::new();
        model.add_observation([100.0, 0.1, 10.0, 0.02, 1.0], 5.0);
        assert!(!model.retrain());
        assert!(!model.is_trained());
    }
}
