//! Wire schema: the ingest `Snapshot` and the published `SimResult`.
//!
//! Prices and quantities travel as decimal strings (`["50000.00", "1.5"]`,
//! matching the upstream feed) and are parsed into `rust_decimal::Decimal`
//! at the boundary; everything downstream (derived metrics, regression
//! features, bps figures) is plain `f64`, matching the floating-point
//! original.

use serde::{Deserialize, Serialize};

use crate::parameter::Parameters;

/// One `(price, quantity)` level as it arrives on the wire.
pub type WireLevel = (String, String);

/// A full (never incremental) L2 snapshot from the upstream feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub exchange: String,
    pub symbol: String,
    pub asks: Vec<WireLevel>,
    pub bids: Vec<WireLevel>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SlippageResult {
    pub expected_bps: f64,
    pub conservative_bps: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct FeesResult {
    pub maker: f64,
    pub taker: f64,
    pub total: f64,
    pub effective_rate_bps: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MarketImpactResult {
    pub temporary_bps: f64,
    pub permanent_bps: f64,
    pub total_bps: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct NetCostResult {
    pub expected_bps: f64,
    pub conservative_bps: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MakerTakerResult {
    pub maker_percentage: f64,
    pub taker_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct OrderbookSummary {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub mid: Option<f64>,
    pub spread_bps: Option<f64>,
    pub imbalance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct PerformanceSummary {
    pub internal_latency_ms: f64,
}

/// The published cost vector. Logically immutable — a new simulation
/// produces a whole new value that replaces the old one atomically.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SimResult {
    pub timestamp: String,
    pub slippage: SlippageResult,
    pub fees: FeesResult,
    pub market_impact: MarketImpactResult,
    pub net_cost: NetCostResult,
    pub maker_taker: MakerTakerResult,
    pub orderbook_summary: OrderbookSummary,
    pub performance: PerformanceSummary,
    pub parameters: Parameters,
}
