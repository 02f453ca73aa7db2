//! Maker/taker fee schedule lookup and fee calculation.
//!
//! A two-level exchange -> tier table with a cascading fallback (unknown
//! exchange -> OKX, unknown tier -> VIP0, last resort a constant) and
//! `notional = quantity * price`.

use std::collections::HashMap;

use tracing::warn;

const LAST_RESORT_MAKER: f64 = 0.001;
const LAST_RESORT_TAKER: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeRates {
    pub maker: f64,
    pub taker: f64,
}

#[derive(Debug, Clone)]
pub struct FeeCalculation {
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub total_fee: f64,
    pub maker_rate: f64,
    pub taker_rate: f64,
    pub effective_rate_bps: f64,
    pub maker_percentage: f64,
    pub taker_percentage: f64,
    pub notional_value: f64,
}

/// Exchange -> fee tier -> rates, seeded with the OKX schedule and
/// extensible via [`FeeSchedule::with_structure`].
pub struct FeeSchedule {
    structure: HashMap<String, HashMap<String, FeeRates>>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeSchedule {
    pub fn new() -> Self {
        let mut okx = HashMap::new();
        okx.insert("VIP0".to_string(), FeeRates { maker: 0.0008, taker: 0.001 });
        okx.insert("VIP1".to_string(), FeeRates { maker: 0.0007, taker: 0.0009 });
        okx.insert("VIP2".to_string(), FeeRates { maker: 0.0006, taker: 0.0008 });
        okx.insert("VIP3".to_string(), FeeRates { maker: 0.0005, taker: 0.0007 });
        okx.insert("VIP4".to_string(), FeeRates { maker: 0.0003, taker: 0.0005 });
        okx.insert("VIP5".to_string(), FeeRates { maker: 0.0000, taker: 0.0003 });

        let mut structure = HashMap::new();
        structure.insert("OKX".to_string(), okx);

        Self { structure }
    }

    #[cfg(test)]
    pub fn with_structure(structure: HashMap<String, HashMap<String, FeeRates>>) -> Self {
        Self { structure }
    }

    /// Look up `(exchange, tier)`, falling back to OKX then VIP0, warning on
    /// each substitution.
    pub fn rates(&self, exchange: &str, tier: &str) -> FeeRates {
        let exchange_table = self.structure.get(exchange).unwrap_or_else(|| {
            warn!(exchange, "no fee structure found, falling back to OKX");
            self.structure
                .get("OKX")
                .expect("OKX fee structure is always seeded")
        });

        *exchange_table.get(tier).unwrap_or_else(|| {
            warn!(tier, "no fee tier found, falling back to VIP0");
            exchange_table.get("VIP0").unwrap_or(&FeeRates {
                maker: LAST_RESORT_MAKER,
                taker: LAST_RESORT_TAKER,
            })
        })
    }

    /// Calculate maker/taker fees for an order. `quantity` is the order size
    /// in the same unit as the system quotes notional in (matching the
    /// original's literal `quantity * price` regardless of whether
    /// `quantity` is USD- or base-asset-denominated at the call site).
    ///
    /// `maker_percentage` is `None` when the caller has no maker/taker split
    /// to offer; for `order_type = "market"` that defaults to 0 (pure
    /// taker). An explicit `Some(pct)` is honored regardless of order type.
    pub fn calculate(
        &self,
        exchange: &str,
        order_type: &str,
        quantity: f64,
        price: f64,
        fee_tier: &str,
        maker_percentage: Option<f64>,
    ) -> FeeCalculation {
        let rates = self.rates(exchange, fee_tier);
        if !order_type.eq_ignore_ascii_case("market") {
            warn!(order_type, "fee calculation for a non-market order type; only market is fully supported");
        }

        // Market orders take liquidity; absent an explicit split, treat the
        // whole notional as taker.
        let maker_percentage = maker_percentage.unwrap_or(0.0).clamp(0.0, 1.0);
        let taker_percentage = 1.0 - maker_percentage;

        let notional_value = quantity * price;

        let maker_fee = notional_value * rates.maker * maker_percentage;
        let taker_fee = notional_value * rates.taker * taker_percentage;
        let total_fee = maker_fee + taker_fee;

        let effective_rate_bps = if notional_value > 0.0 {
            total_fee / notional_value * 10_000.0
        } else {
            0.0
        };

        FeeCalculation {
            maker_fee,
            taker_fee,
            total_fee,
            maker_rate: rates.maker,
            taker_rate: rates.taker,
            effective_rate_bps,
            maker_percentage,
            taker_percentage,
            notional_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_order_fee_calculation_is_pure_taker_with_zero_maker_split() {
        let schedule = FeeSchedule::new();
        let calc = schedule.calculate("OKX", "market", 100.0, 50000.0, "VIP0", Some(0.0));

        assert_eq!(calc.notional_value, 5_000_000.0);
        assert!((calc.taker_fee - 5000.0).abs() < 1e-6);
        assert_eq!(calc.maker_fee, 0.0);
        assert!((calc.total_fee - 5000.0).abs() < 1e-6);
        assert!((calc.effective_rate_bps - 10.0).abs() < 1e-6);
    }

    // Explicit maker/taker split is honored even for "market" order_type.
    #[test]
    fn market_order_fee_calculation_honors_explicit_maker_split() {
        let schedule = FeeSchedule::new();
        let calc = schedule.calculate("OKX", "market", 100.0, 50000.0, "VIP0", Some(0.3));

        assert!((calc.maker_fee - 1200.0).abs() < 1e-6);
        assert!((calc.taker_fee - 3500.0).abs() < 1e-6);
        assert!((calc.total_fee - 4700.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_exchange_falls_back_to_okx() {
        let schedule = FeeSchedule::new();
        let rates = schedule.rates("UNKNOWN", "VIP0");
        assert_eq!(rates, FeeRates { maker: 0.0008, taker: 0.001 });
    }

    #[test]
    fn unknown_tier_falls_back_to_vip0() {
        let schedule = FeeSchedule::new();
        let rates = schedule.rates("OKX", "VIP99");
        assert_eq!(rates, FeeRates { maker: 0.0008, taker: 0.001 });
    }

    #[test]
    fn market_orders_default_to_pure_taker_when_no_split_given() {
        let schedule = FeeSchedule::new();
        let calc = schedule.calculate("OKX", "market", 10.0, 100.0, "VIP0", None);
        assert_eq!(calc.maker_percentage, 0.0);
        assert_eq!(calc.taker_percentage, 1.0);
    }

    #[test]
    fn maker_percentage_is_clamped() {
        let schedule = FeeSchedule::new();
        let calc = schedule.calculate("OKX", "limit", 10.0, 100.0, "VIP0", Some(1.5));
        assert_eq!(calc.maker_percentage, 1.0);
    }

    #[test]
    fn zero_notional_has_zero_effective_rate() {
        let schedule = FeeSchedule::new();
        let calc = schedule.calculate("OKX", "market", 0.0, 100.0, "VIP0", Some(0.0));
        assert_eq!(calc.effective_rate_bps, 0.0);
    }
}
