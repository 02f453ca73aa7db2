//! Almgren-Chriss market impact model: temporary + permanent price impact
//! as a function of order size relative to daily volume, with an optional
//! orderbook-imbalance multiplier.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImpactResult {
    pub temporary_bps: f64,
    pub permanent_bps: f64,
    pub total_bps: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImpactFromBookResult {
    pub temporary_bps: f64,
    pub permanent_bps: f64,
    pub total_bps: f64,
    pub imbalance: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ImpactModel {
    market_impact_factor: f64,
    #[allow(dead_code)]
    volatility_factor: f64,
    risk_aversion: f64,
}

impl Default for ImpactModel {
    fn default() -> Self {
        Self { market_impact_factor: 0.1, volatility_factor: 0.5, risk_aversion: 1.0 }
    }
}

impl ImpactModel {
    pub fn new(market_impact_factor: f64, volatility_factor: f64, risk_aversion: f64) -> Self {
        Self { market_impact_factor, volatility_factor, risk_aversion }
    }

    /// Temporary and permanent impact in absolute price units, plus
    /// `total_bps` relative to `price`. Returns a zeroed result on a
    /// non-finite intermediate (division by zero daily volume, etc).
    pub fn estimate(
        &self,
        quantity: f64,
        price: f64,
        daily_volume: f64,
        volatility: f64,
        is_buy: bool,
    ) -> ImpactResult {
        let relative_size = quantity / daily_volume;
        let sign = if is_buy { 1.0 } else { -1.0 };

        let temporary = price * self.market_impact_factor * volatility * relative_size.sqrt() * sign;
        let permanent = price * self.market_impact_factor * relative_size * sign;
        let total = temporary + permanent;

        if !temporary.is_finite() || !permanent.is_finite() || price == 0.0 {
            return ImpactResult { temporary_bps: 0.0, permanent_bps: 0.0, total_bps: 0.0 };
        }

        ImpactResult {
            temporary_bps: temporary / price * 10_000.0,
            permanent_bps: permanent / price * 10_000.0,
            total_bps: total / price * 10_000.0,
        }
    }

    /// As [`Self::estimate`], scaled by an imbalance-dependent multiplier:
    /// pressure in the direction of the trade increases impact by up to 20%.
    pub fn impact_from_book(
        &self,
        imbalance: f64,
        quantity: f64,
        price: f64,
        daily_volume: f64,
        volatility: f64,
        is_buy: bool,
    ) -> ImpactFromBookResult {
        let base = self.estimate(quantity, price, daily_volume, volatility, is_buy);

        let multiplier = if is_buy && imbalance > 1.0 {
            1.0 + 0.2 * (imbalance - 1.0)
        } else if !is_buy && imbalance < 1.0 {
            1.0 + 0.2 * (1.0 - imbalance)
        } else {
            1.0
        };

        ImpactFromBookResult {
            temporary_bps: base.temporary_bps * multiplier,
            permanent_bps: base.permanent_bps * multiplier,
            total_bps: base.total_bps * multiplier,
            imbalance,
            multiplier,
        }
    }

    /// Optimal execution horizon in hours; falls back to 0.5h (30 minutes)
    /// on an arithmetic failure (zero/negative price or daily volume).
    pub fn optimal_execution_time(
        &self,
        quantity: f64,
        price: f64,
        daily_volume: f64,
        volatility: f64,
    ) -> f64 {
        let relative_size = quantity / daily_volume;
        let radicand =
            self.risk_aversion * volatility.powi(2) * relative_size / (2.0 * self.market_impact_factor * price);

        if !radicand.is_finite() || radicand < 0.0 {
            return 0.5;
        }
        let optimal_time = radicand.sqrt();
        let hours = optimal_time * 24.0;
        if hours.is_finite() { hours } else { 0.5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_and_sell_impact_are_equal_magnitude_opposite_sign() {
        let model = ImpactModel::default();
        let buy = model.estimate(10.0, 50000.0, 1000.0, 0.02, true);
        let sell = model.estimate(10.0, 50000.0, 1000.0, 0.02, false);

        assert!((buy.temporary_bps + sell.temporary_bps).abs() < 1e-9);
        assert!((buy.permanent_bps + sell.permanent_bps).abs() < 1e-9);
        assert!((buy.total_bps + sell.total_bps).abs() < 1e-9);
        assert!(buy.temporary_bps > 0.0);
        assert!(sell.temporary_bps < 0.0);
    }

    #[test]
    fn buy_pressure_increases_impact_multiplier() {
        let model = ImpactModel::default();
        let result = model.impact_from_book(1.5, 10.0, 50000.0, 1000.0, 0.02, true);
        assert!((result.multiplier - 1.1).abs() < 1e-9);
    }

    #[test]
    fn balanced_book_has_unit_multiplier() {
        let model = ImpactModel::default();
        let result = model.impact_from_book(1.0, 10.0, 50000.0, 1000.0, 0.02, true);
        assert_eq!(result.multiplier, 1.0);
    }

    #[test]
    fn zero_daily_volume_falls_back_to_default_execution_time() {
        let model = ImpactModel::default();
        let t = model.optimal_execution_time(10.0, 50000.0, 0.0, 0.02);
        assert_eq!(t, 0.5);
    }
}
