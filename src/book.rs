//! The L2 order book and its derived-metrics layer.
//!
//! Ladders are keyed by a fixed-point integer price (`price * 10^8`) rather
//! than a float, so equality is stable and `best_ask`/`best_bid` are
//! `O(log n)` via `BTreeMap` rather than a linear scan over a float-keyed
//! hash map.

use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;
use std::time::{Duration, Instant};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::BookError;
use crate::wire::Snapshot;

const PRICE_SCALE: i64 = 100_000_000; // 10^8
const DEFAULT_METRICS_TTL: Duration = Duration::from_millis(100);
const UPDATE_TIME_HISTORY: usize = 1000;

/// Side of the book a VWAP walk or depth sum applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Fixed-point price key (`price * 10^8`), ordered ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PriceKey(i64);

impl PriceKey {
    fn from_decimal(price: Decimal) -> Option<Self> {
        let scaled = (price * Decimal::from(PRICE_SCALE)).round();
        scaled.to_i64().map(PriceKey)
    }

    fn to_f64(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }
}

/// TTL-cached snapshot of derived book metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookMetrics {
    pub timestamp: Option<String>,
    pub exchange: Option<String>,
    pub symbol: Option<String>,
    pub best_ask: Option<f64>,
    pub best_ask_qty: Option<f64>,
    pub best_bid: Option<f64>,
    pub best_bid_qty: Option<f64>,
    pub mid: Option<f64>,
    pub spread: Option<f64>,
    pub spread_bps: Option<f64>,
    /// `bid_volume / ask_volume`. `Some(f64::INFINITY)` when there are bids
    /// but no asks; `None` when the book is entirely empty.
    pub imbalance: Option<f64>,
}

/// Result of walking one side of the book for a market order of a given
/// base-asset size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VwapFill {
    pub vwap: Option<f64>,
    pub filled: f64,
    pub remaining: f64,
}

/// Update-latency counters, the book's own slice of `Simulator::performance`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookPerformance {
    pub update_count: u64,
    pub avg_update_time_ms: f64,
    pub min_update_time_ms: f64,
    pub max_update_time_ms: f64,
}

pub struct Book {
    asks: BTreeMap<PriceKey, Decimal>,
    bids: BTreeMap<PriceKey, Decimal>,
    max_depth: usize,
    metrics_ttl: Duration,

    timestamp: Option<String>,
    exchange: Option<String>,
    symbol: Option<String>,

    cached_metrics: Option<BookMetrics>,
    cached_at: Option<Instant>,

    update_times: VecDeque<Duration>,
}

impl Book {
    pub fn new(max_depth: usize) -> Self {
        Self {
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
            max_depth,
            metrics_ttl: DEFAULT_METRICS_TTL,
            timestamp: None,
            exchange: None,
            symbol: None,
            cached_metrics: None,
            cached_at: None,
            update_times: VecDeque::with_capacity(UPDATE_TIME_HISTORY),
        }
    }

    #[cfg(test)]
    pub fn with_metrics_ttl(max_depth: usize, ttl: Duration) -> Self {
        let mut book = Self::new(max_depth);
        book.metrics_ttl = ttl;
        book
    }

    /// Wholesale-replace both ladders from a full snapshot. Zero/negative
    /// quantities are dropped; a parse failure on any level aborts the
    /// whole update and the prior book is retained untouched.
    pub fn update(&mut self, snapshot: &Snapshot) -> Result<(), BookError> {
        let start = Instant::now();

        let new_asks = parse_side(&snapshot.asks, "ask")?;
        let new_bids = parse_side(&snapshot.bids, "bid")?;

        self.asks = new_asks;
        self.bids = new_bids;
        self.timestamp = Some(snapshot.timestamp.clone());
        self.exchange = Some(snapshot.exchange.clone());
        self.symbol = Some(snapshot.symbol.clone());

        self.trim();
        self.invalidate_cache();

        self.record_update_time(start.elapsed());

        Ok(())
    }

    fn trim(&mut self) {
        while self.asks.len() > self.max_depth {
            // Asks ascending: the worst (highest) price is the last entry.
            if let Some((&key, _)) = self.asks.iter().next_back() {
                self.asks.remove(&key);
            }
        }
        while self.bids.len() > self.max_depth {
            // Bids ascending too: the worst (lowest) price is the first entry.
            if let Some((&key, _)) = self.bids.iter().next() {
                self.bids.remove(&key);
            }
        }
    }

    fn record_update_time(&mut self, elapsed: Duration) {
        if self.update_times.len() == UPDATE_TIME_HISTORY {
            self.update_times.pop_front();
        }
        self.update_times.push_back(elapsed);
    }

    fn invalidate_cache(&mut self) {
        self.cached_metrics = None;
        self.cached_at = None;
    }

    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks
            .iter()
            .next()
            .map(|(k, qty)| (k.to_f64(), qty.to_f64().unwrap_or(0.0)))
    }

    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids
            .iter()
            .next_back()
            .map(|(k, qty)| (k.to_f64(), qty.to_f64().unwrap_or(0.0)))
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.best_ask(), self.best_bid()) {
            (Some((ask, _)), Some((bid, _))) => Some((ask + bid) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_ask(), self.best_bid()) {
            (Some((ask, _)), Some((bid, _))) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn imbalance(&self) -> Option<f64> {
        let ask_volume: f64 = self.asks.values().filter_map(|q| q.to_f64()).sum();
        let bid_volume: f64 = self.bids.values().filter_map(|q| q.to_f64()).sum();

        if ask_volume == 0.0 && bid_volume == 0.0 {
            None
        } else if ask_volume == 0.0 {
            Some(f64::INFINITY)
        } else {
            Some(bid_volume / ask_volume)
        }
    }

    /// Walk the book in favorable order (ascending asks for a buy,
    /// descending bids for a sell) consuming liquidity until `quantity`
    /// base-asset units are filled or the side is exhausted.
    pub fn vwap(&self, quantity: f64, side: Side) -> VwapFill {
        let mut remaining = quantity;
        let mut filled = 0.0;
        let mut notional = 0.0;

        let levels: Box<dyn Iterator<Item = (f64, f64)>> = match side {
            Side::Buy => Box::new(
                self.asks
                    .iter()
                    .map(|(k, q)| (k.to_f64(), q.to_f64().unwrap_or(0.0))),
            ),
            Side::Sell => Box::new(
                self.bids
                    .iter()
                    .rev()
                    .map(|(k, q)| (k.to_f64(), q.to_f64().unwrap_or(0.0))),
            ),
        };

        for (price, available) in levels {
            if remaining <= 0.0 {
                break;
            }
            let fill = remaining.min(available);
            notional += fill * price;
            filled += fill;
            remaining -= fill;
        }

        let vwap = if filled > 0.0 { Some(notional / filled) } else { None };
        VwapFill { vwap, filled, remaining: remaining.max(0.0) }
    }

    /// Sum of quantity over the top `levels` price levels on `side`.
    pub fn depth_sum(&self, side: Side, levels: usize) -> f64 {
        match side {
            Side::Buy => self
                .asks
                .values()
                .take(levels)
                .filter_map(|q| q.to_f64())
                .sum(),
            Side::Sell => self
                .bids
                .iter()
                .rev()
                .take(levels)
                .filter_map(|(_, q)| q.to_f64())
                .sum(),
        }
    }

    /// Cached metrics record, recomputed if the cache has expired or was
    /// invalidated by a mutation.
    pub fn metrics(&mut self) -> BookMetrics {
        if let (Some(metrics), Some(at)) = (&self.cached_metrics, self.cached_at) {
            if at.elapsed() <= self.metrics_ttl {
                return metrics.clone();
            }
        }

        let best_ask = self.best_ask();
        let best_bid = self.best_bid();
        let mid = self.mid();
        let spread = self.spread();
        let spread_bps = match (spread, mid) {
            (Some(s), Some(m)) if m != 0.0 => Some(s / m * 10_000.0),
            _ => None,
        };

        let metrics = BookMetrics {
            timestamp: self.timestamp.clone(),
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            best_ask: best_ask.map(|(p, _)| p),
            best_ask_qty: best_ask.map(|(_, q)| q),
            best_bid: best_bid.map(|(p, _)| p),
            best_bid_qty: best_bid.map(|(_, q)| q),
            mid,
            spread,
            spread_bps,
            imbalance: self.imbalance(),
        };

        self.cached_metrics = Some(metrics.clone());
        self.cached_at = Some(Instant::now());
        metrics
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    pub fn performance(&self) -> BookPerformance {
        if self.update_times.is_empty() {
            return BookPerformance::default();
        }
        let count = self.update_times.len() as f64;
        let total_ms: f64 = self.update_times.iter().map(Duration::as_secs_f64).sum::<f64>() * 1000.0;
        let min_ms = self
            .update_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .fold(f64::INFINITY, f64::min);
        let max_ms = self
            .update_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .fold(0.0, f64::max);

        BookPerformance {
            update_count: self.update_times.len() as u64,
            avg_update_time_ms: total_ms / count,
            min_update_time_ms: min_ms,
            max_update_time_ms: max_ms,
        }
    }
}

fn parse_side(
    levels: &[(String, String)],
    side: &'static str,
) -> Result<BTreeMap<PriceKey, Decimal>, BookError> {
    let mut out = BTreeMap::new();
    for (price_str, qty_str) in levels {
        let price = Decimal::from_str(price_str).map_err(|_| BookError::InvalidLevel {
            side,
            price: price_str.clone(),
            quantity: qty_str.clone(),
        })?;
        let quantity = Decimal::from_str(qty_str).map_err(|_| BookError::InvalidLevel {
            side,
            price: price_str.clone(),
            quantity: qty_str.clone(),
        })?;

        if quantity <= Decimal::ZERO {
            continue;
        }

        let key = PriceKey::from_decimal(price).ok_or_else(|| BookError::InvalidLevel {
            side,
            price: price_str.clone(),
            quantity: qty_str.clone(),
        })?;
        out.insert(key, quantity);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: &str, qty: &str) -> (String, String) {
        (price.to_string(), qty.to_string())
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT".to_string(),
            asks: vec![level("50000", "1"), level("50010", "2")],
            bids: vec![level("49990", "1.5"), level("49980", "2.5")],
        }
    }

    #[test]
    fn update_then_metrics_reports_best_prices_mid_spread_and_imbalance() {
        let mut book = Book::new(50);
        book.update(&sample_snapshot()).unwrap();

        let m = book.metrics();
        assert_eq!(m.best_ask, Some(50000.0));
        assert_eq!(m.best_bid, Some(49990.0));
        assert_eq!(m.mid, Some(49995.0));
        assert_eq!(m.spread, Some(10.0));
        assert!((m.spread_bps.unwrap() - 2.0004).abs() < 1e-3);
        assert!((m.imbalance.unwrap() - 1.333).abs() < 1e-2);
    }

    #[test]
    fn buy_vwap_fills_fully_across_two_ask_levels() {
        let mut book = Book::new(50);
        book.update(&sample_snapshot()).unwrap();

        let fill = book.vwap(2.0, Side::Buy);
        assert_eq!(fill.filled, 2.0);
        assert_eq!(fill.remaining, 0.0);
        assert_eq!(fill.vwap, Some(50005.0));
    }

    #[test]
    fn sell_vwap_partially_fills_when_bid_liquidity_is_short() {
        let mut book = Book::new(50);
        book.update(&sample_snapshot()).unwrap();

        let fill = book.vwap(5.0, Side::Sell);
        assert_eq!(fill.filled, 4.0);
        assert_eq!(fill.remaining, 1.0);
        assert!((fill.vwap.unwrap() - 49983.75).abs() < 1e-6);
    }

    #[test]
    fn zero_quantity_levels_are_dropped() {
        let mut book = Book::new(50);
        let snap = Snapshot {
            asks: vec![level("50000", "0"), level("50010", "1")],
            ..sample_snapshot()
        };
        book.update(&snap).unwrap();
        assert_eq!(book.ask_depth(), 1);
        assert_eq!(book.best_ask(), Some((50010.0, 1.0)));
    }

    #[test]
    fn trims_to_max_depth_keeping_best_prices() {
        let mut book = Book::new(2);
        let snap = Snapshot {
            asks: vec![
                level("50000", "1"),
                level("50010", "1"),
                level("50020", "1"),
            ],
            bids: vec![
                level("49990", "1"),
                level("49980", "1"),
                level("49970", "1"),
            ],
            ..sample_snapshot()
        };
        book.update(&snap).unwrap();
        assert_eq!(book.ask_depth(), 2);
        assert_eq!(book.bid_depth(), 2);
        assert_eq!(book.best_ask(), Some((50000.0, 1.0)));
        assert_eq!(book.best_bid(), Some((49990.0, 1.0)));
    }

    #[test]
    fn malformed_level_retains_prior_book() {
        let mut book = Book::new(50);
        book.update(&sample_snapshot()).unwrap();

        let bad = Snapshot {
            asks: vec![level("not-a-number", "1")],
            ..sample_snapshot()
        };
        let result = book.update(&bad);
        assert!(result.is_err());
        assert_eq!(book.best_ask(), Some((50000.0, 1.0)));
    }

    #[test]
    fn imbalance_is_infinite_with_no_asks() {
        let mut book = Book::new(50);
        let snap = Snapshot {
            asks: vec![],
            bids: vec![level("49990", "1.0")],
            ..sample_snapshot()
        };
        book.update(&snap).unwrap();
        assert_eq!(book.imbalance(), Some(f64::INFINITY));
    }

    #[test]
    fn metrics_cache_is_stable_within_ttl() {
        let mut book = Book::with_metrics_ttl(50, Duration::from_secs(10));
        book.update(&sample_snapshot()).unwrap();

        let first = book.metrics();
        // Mutate the underlying timestamp field directly is not possible from
        // outside; instead assert two reads without an intervening update
        // return bit-identical records.
        let second = book.metrics();
        assert_eq!(first.best_ask, second.best_ask);
        assert_eq!(first.mid, second.mid);
    }
}
