//! Maker/taker proportion prediction via logistic regression, with a
//! closed-form heuristic fallback before the model is trained. `nalgebra`
//! plus a hand-rolled gradient-descent fit drive the logistic regression.

use std::collections::VecDeque;

use nalgebra::DVector;
use tracing::warn;

use crate::book::{Book, Side};

const FEATURE_COUNT: usize = 7;
const MAX_HISTORY: usize = 1000;
const MIN_TRAIN_SAMPLES: usize = 10;
const AUTO_TRAIN_THRESHOLD: usize = 50;
const GRADIENT_STEPS: usize = 500;
const LEARNING_RATE: f64 = 0.1;
const FALLBACK_MAKER_PERCENTAGE: f64 = 0.1;

pub type Features = [f64; FEATURE_COUNT];

#[derive(Debug, Clone)]
pub struct MakerTakerEstimate {
    pub maker_percentage: f64,
    pub taker_percentage: f64,
    pub features: Features,
    pub is_trained: bool,
    pub training_samples: usize,
}

pub struct MakerTakerModel {
    history: VecDeque<(Features, f64)>,
    coeffs: Option<DVector<f64>>,
    is_trained: bool,
    training_samples: usize,
    last_accuracy: f64,
}

impl Default for MakerTakerModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MakerTakerModel {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(MAX_HISTORY),
            coeffs: None,
            is_trained: false,
            training_samples: 0,
            last_accuracy: 0.0,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    pub fn last_accuracy(&self) -> f64 {
        self.last_accuracy
    }

    pub fn add_observation(&mut self, features: Features, maker_percentage: f64) {
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((features, maker_percentage));

        if self.history.len() >= AUTO_TRAIN_THRESHOLD && !self.is_trained {
            self.train();
        }
    }

    pub fn retrain(&mut self) -> bool {
        self.train()
    }

    fn train(&mut self) -> bool {
        if self.history.len() < MIN_TRAIN_SAMPLES {
            warn!(samples = self.history.len(), "not enough data to train maker/taker model");
            return false;
        }

        let n = self.history.len();
        let mut x = nalgebra::DMatrix::zeros(n, FEATURE_COUNT + 1);
        let mut y = DVector::zeros(n);
        for (i, (features, target)) in self.history.iter().enumerate() {
            x[(i, 0)] = 1.0;
            for (j, f) in features.iter().enumerate() {
                x[(i, j + 1)] = *f;
            }
            y[i] = if *target > 0.5 { 1.0 } else { 0.0 };
        }

        let beta = gradient_descent(&x, &y);

        let predictions = &x * &beta;
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(pred, actual)| {
                let predicted_label = if sigmoid(**pred) >= 0.5 { 1.0 } else { 0.0 };
                (predicted_label - **actual).abs() < f64::EPSILON
            })
            .count();
        self.last_accuracy = correct as f64 / n as f64;

        self.coeffs = Some(beta);
        self.is_trained = true;
        self.training_samples = n;

        true
    }

    /// Predict a maker fraction in `[0, 1]` for a single feature vector.
    /// Falls back to `0.1` on any non-finite intermediate.
    pub fn predict(&self, features: &Features, is_buy: bool, imbalance: f64) -> f64 {
        if !self.is_trained {
            return heuristic(features, is_buy, imbalance);
        }

        let coeffs = self.coeffs.as_ref().expect("coeffs present once is_trained");
        let mut row = DVector::zeros(FEATURE_COUNT + 1);
        row[0] = 1.0;
        for (i, f) in features.iter().enumerate() {
            row[i + 1] = *f;
        }

        let z = row.dot(coeffs);
        let p = sigmoid(z);
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            FALLBACK_MAKER_PERCENTAGE
        }
    }

    pub fn predict_from_book(
        &self,
        book: &Book,
        quantity_usd: f64,
        price: f64,
        volatility: f64,
        side: Side,
    ) -> MakerTakerEstimate {
        let is_buy = side == Side::Buy;
        let spread_bps = match (book.spread(), book.mid()) {
            (Some(spread), Some(mid)) if mid != 0.0 => spread / mid * 10_000.0,
            _ => 10.0,
        };
        let imbalance = book.imbalance().unwrap_or(1.0);
        let best_bid_qty = book.best_bid().map(|(_, q)| q).unwrap_or(0.0);
        let best_ask_qty = book.best_ask().map(|(_, q)| q).unwrap_or(0.0);

        let quantity_base = if price > 0.0 { quantity_usd / price } else { 0.0 };
        let available_liquidity = book.depth_sum(side, 5);
        let relative_size = if available_liquidity > 0.0 {
            (quantity_base / available_liquidity).min(1.0)
        } else {
            1.0
        };

        let features: Features = [
            quantity_usd,
            relative_size,
            spread_bps,
            volatility,
            imbalance,
            best_bid_qty,
            best_ask_qty,
        ];

        let maker_percentage = self.predict(&features, is_buy, imbalance);

        MakerTakerEstimate {
            maker_percentage,
            taker_percentage: 1.0 - maker_percentage,
            features,
            is_trained: self.is_trained,
            training_samples: self.training_samples,
        }
    }
}

/// Heuristic used before the model is trained: larger orders and wider
/// spreads favor taker execution; favorable imbalance favors maker.
fn heuristic(features: &Features, is_buy: bool, imbalance: f64) -> f64 {
    let [quantity_usd, _relative_size, spread_bps, _volatility, _imbalance, _bid_qty, _ask_qty] = *features;

    let base_maker_pct = 0.3 * (1.0 - (0.1 * (1.0 + quantity_usd / 1000.0).ln()).min(0.8));
    let spread_factor = (1.0 - spread_bps / 50.0).max(0.1);

    let favorable = (is_buy && imbalance > 1.5) || (!is_buy && imbalance < 0.5);
    let imbalance_factor = if favorable { 1.5 } else { 1.0 };

    (base_maker_pct * spread_factor * imbalance_factor).clamp(0.0, 1.0)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Batch gradient descent on the logistic log-loss, seeded at zero.
fn gradient_descent(x: &nalgebra::DMatrix<f64>, y: &DVector<f64>) -> DVector<f64> {
    let n = x.nrows() as f64;
    let mut beta = DVector::zeros(x.ncols());

    for _ in 0..GRADIENT_STEPS {
        let predictions = (x * &beta).map(sigmoid);
        let errors = predictions - y;
        let gradient = x.transpose() * errors / n;
        beta -= LEARNING_RATE * gradient;
    }

    beta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrained_model_uses_heuristic_and_stays_in_bounds() {
        let model = MakerTakerModel::new();
        let features = [100.0, 0.1, 10.0, 0.02, 1.0, 5.0, 5.0];
        let maker_pct = model.predict(&features, true, 1.0);
        assert!((0.0..=1.0).contains(&maker_pct));
    }

    #[test]
    fn favorable_imbalance_increases_maker_share() {
        let neutral = [100.0, 0.1, 10.0, 0.02, 1.0, 5.0, 5.0];
        let favorable = [100.0, 0.1, 10.0, 0.02, 2.0, 5.0, 5.0];
        assert!(
            heuristic(&favorable, true, 2.0) > heuristic(&neutral, true, 1.0)
        );
    }

    #[test]
    fn larger_spread_reduces_maker_share() {
        let tight = [100.0, 0.1, 5.0, 0.02, 1.0, 5.0, 5.0];
        let wide = [100.0, 0.1, 40.0, 0.02, 1.0, 5.0, 5.0];
        assert!(heuristic(&tight, true, 1.0) > heuristic(&wide, true, 1.0));
    }

    #[test]
    fn auto_trains_after_fifty_observations() {
        let mut model = MakerTakerModel::new();
        for i in 0..50 {
            let pct = if i % 2 == 0 { 0.8 } else { 0.1 };
            model.add_observation([100.0, 0.1, 10.0, 0.02, 1.0, 5.0, 5.0], pct);
        }
        assert!(model.is_trained());
        assert_eq!(model.training_samples(), 50);
    }

    #[test]
    fn trained_prediction_is_clamped_to_unit_interval() {
        let mut model = MakerTakerModel::new();
        for i in 0..20 {
            model.add_observation([100.0 + i as f64, 0.1, 10.0, 0.02, 1.0, 5.0, 5.0], 0.9);
        }
        model.retrain();
        let features = [1_000_000.0, 1.0, 0.0, 1.0, 10.0, 1000.0, 0.0];
        let maker_pct = model.predict(&features, true, 10.0);
        assert!((0.0..=1.0).contains(&maker_pct));
    }
}
