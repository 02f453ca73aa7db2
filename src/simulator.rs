//! The trade simulator: owns the book and the three prediction models,
//! funnels every mutation through a single worker task, and publishes a
//! new [`SimResult`] via a lock-free single-writer/multi-reader slot.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::benchmark::{Benchmarker, BenchmarkResults};
use crate::book::{Book, BookPerformance, Side};
use crate::config::Config;
use crate::error::ParameterError;
use crate::fees::FeeSchedule;
use crate::impact::ImpactModel;
use crate::maker_taker::MakerTakerModel;
use crate::parameter::{Parameter, Parameters};
use crate::slippage::SlippageModel;
use crate::wire::{
    FeesResult, MakerTakerResult, MarketImpactResult, NetCostResult, OrderbookSummary,
    PerformanceSummary, SimResult, SlippageResult, Snapshot,
};

/// Placeholder daily-volume proxy until real market data is wired in.
const DAILY_VOLUME_MULTIPLIER: f64 = 1000.0;

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub benchmark: BenchmarkResults,
    pub book: BookPerformance,
    pub tick_count: u64,
}

struct Inner {
    book: Mutex<Book>,
    slippage: SlippageModel,
    maker_taker: MakerTakerModel,
    fees: FeeSchedule,
    impact: ImpactModel,
    params: Mutex<Parameters>,
    result: ArcSwap<SimResult>,
    benchmarker: Benchmarker,
    config: Config,
    tick_count: AtomicU64,
    running: AtomicBool,
    worker_tx: mpsc::UnboundedSender<()>,
}

/// Cheaply cloneable handle to the running simulator.
#[derive(Clone)]
pub struct Simulator {
    inner: Arc<Inner>,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = SimResult { parameters: Parameters::from_config(&config), ..Default::default() };

        let inner = Arc::new(Inner {
            book: Mutex::new(Book::new(config.max_orderbook_depth)),
            slippage: SlippageModel::new(),
            maker_taker: MakerTakerModel::new(),
            fees: FeeSchedule::new(),
            impact: ImpactModel::default(),
            params: Mutex::new(Parameters::from_config(&config)),
            result: ArcSwap::from_pointee(initial),
            benchmarker: Benchmarker::default(),
            config,
            tick_count: AtomicU64::new(0),
            running: AtomicBool::new(false),
            worker_tx: tx,
        });

        let worker_inner = inner.clone();
        tokio::spawn(async move { worker_loop(worker_inner, rx).await });

        Self { inner }
    }

    /// Idempotent. Enables the benchmarker and opens processing.
    pub fn start(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.benchmarker.start();
        info!("trade simulator started");
    }

    /// Closes processing; the last published result is retained.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.benchmarker.stop();
        info!("trade simulator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Validate and apply `name`/`value`, then dispatch an asynchronous full
    /// simulation. Returns as soon as the parameter set is updated; never
    /// holds a lock across the dispatch.
    pub fn set_parameter(&self, name: &str, value: &serde_json::Value) -> Result<(), ParameterError> {
        let parsed = Parameter::parse(name, value)?;

        {
            let mut params = self.inner.params.lock();
            parsed.apply(&mut params);
        }

        let _ = self.inner.worker_tx.send(());
        Ok(())
    }

    /// Feed one ingest snapshot. Updates the book, then triggers a full
    /// simulation every `processing_batch_size` ticks and a benchmark log
    /// every `benchmark_interval` ticks.
    pub fn on_snapshot(&self, snapshot: &Snapshot) {
        let update_result = {
            let _guard = self.inner.benchmarker.measure("orderbook_update");
            let mut book = self.inner.book.lock();
            book.update(snapshot)
        };

        if let Err(err) = update_result {
            warn!(error = %err, "failed to update orderbook");
            return;
        }

        let tick = self.inner.tick_count.fetch_add(1, Ordering::Relaxed) + 1;

        let batch_size = self.inner.config.processing_batch_size;
        if batch_size > 0 && tick % batch_size == 0 {
            let _ = self.inner.worker_tx.send(());
        }

        let benchmark_interval = self.inner.config.benchmark_interval;
        if benchmark_interval > 0 && tick % benchmark_interval == 0 {
            info!(results = ?self.inner.benchmarker.results(), "benchmark results");
        }
    }

    /// A copy of the latest published result.
    pub fn results(&self) -> SimResult {
        (**self.inner.result.load()).clone()
    }

    /// The live parameter set, reflecting every accepted `set_parameter`
    /// synchronously rather than whatever was last published in a
    /// `SimResult` (which lags until the next full simulation runs).
    pub fn parameters(&self) -> Parameters {
        self.inner.params.lock().clone()
    }

    /// The benchmarker's aggregate plus the book's own update-latency
    /// counters.
    pub fn performance(&self) -> PerformanceReport {
        PerformanceReport {
            benchmark: self.inner.benchmarker.results(),
            book: self.inner.book.lock().performance(),
            tick_count: self.inner.tick_count.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        run_full_simulation(&inner);
    }
}

/// The full simulation pipeline: read book metrics, run slippage/maker-taker/
/// fee/impact estimation, compose net cost, and publish. A failed step
/// (empty book) logs a warning and leaves the previously published result
/// untouched.
fn run_full_simulation(inner: &Arc<Inner>) {
    let _full = inner.benchmarker.measure("full_simulation");

    let metrics = {
        let mut book = inner.book.lock();
        book.metrics()
    };

    let Some(mid) = metrics.mid else {
        warn!("cannot run simulation: orderbook is empty");
        return;
    };

    let daily_volume = mid * DAILY_VOLUME_MULTIPLIER;
    let params = inner.params.lock().clone();

    let slippage = {
        let _guard = inner.benchmarker.measure("slippage_estimation");
        let book = inner.book.lock();
        inner
            .slippage
            .estimate_from_book(&book, params.quantity_usd, mid, params.volatility, Side::Buy)
    };

    let maker_taker = {
        let _guard = inner.benchmarker.measure("maker_taker_prediction");
        let book = inner.book.lock();
        inner
            .maker_taker
            .predict_from_book(&book, params.quantity_usd, mid, params.volatility, Side::Buy)
    };

    let fee_calc = {
        let _guard = inner.benchmarker.measure("fee_calculation");
        inner.fees.calculate(
            &params.exchange,
            &params.order_type,
            params.quantity_usd,
            mid,
            &params.fee_tier,
            Some(maker_taker.maker_percentage),
        )
    };

    let impact = {
        let _guard = inner.benchmarker.measure("market_impact_calculation");
        inner.impact.impact_from_book(
            metrics.imbalance.unwrap_or(1.0),
            params.quantity_usd,
            mid,
            daily_volume,
            params.volatility,
            true,
        )
    };

    let (net_expected_bps, net_conservative_bps) = {
        let _guard = inner.benchmarker.measure("net_cost_calculation");
        let expected = slippage.expected_bps + fee_calc.effective_rate_bps + impact.total_bps;
        let conservative =
            slippage.conservative_bps + fee_calc.effective_rate_bps + impact.total_bps * 1.2;
        (expected, conservative)
    };

    let internal_latency_ms = inner
        .benchmarker
        .results()
        .labels
        .get("full_simulation")
        .map(|s| s.last_ms)
        .unwrap_or(0.0);

    let result = SimResult {
        timestamp: Utc::now().to_rfc3339(),
        slippage: SlippageResult {
            expected_bps: slippage.expected_bps,
            conservative_bps: slippage.conservative_bps,
        },
        fees: FeesResult {
            maker: fee_calc.maker_fee,
            taker: fee_calc.taker_fee,
            total: fee_calc.total_fee,
            effective_rate_bps: fee_calc.effective_rate_bps,
        },
        market_impact: MarketImpactResult {
            temporary_bps: impact.temporary_bps,
            permanent_bps: impact.permanent_bps,
            total_bps: impact.total_bps,
        },
        net_cost: NetCostResult { expected_bps: net_expected_bps, conservative_bps: net_conservative_bps },
        maker_taker: MakerTakerResult {
            maker_percentage: maker_taker.maker_percentage,
            taker_percentage: maker_taker.taker_percentage,
        },
        orderbook_summary: OrderbookSummary {
            best_bid: metrics.best_bid,
            best_ask: metrics.best_ask,
            mid: metrics.mid,
            spread_bps: metrics.spread_bps,
            imbalance: metrics.imbalance,
        },
        performance: PerformanceSummary { internal_latency_ms },
        parameters: params,
    };

    {
        let _guard = inner.benchmarker.measure("results_update");
        inner.result.store(Arc::new(result));
    }
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

    #[tokio::test]
    async fn simulation_results_are_empty_until_book_has_data() {
        let sim = Simulator::new(Config::default());
        let result = sim.results();
        assert!(result.orderbook_summary.mid.is_none());
    }

    #[tokio::test]
    async fn set_parameter_rejects_unknown_name() {
        let sim = Simulator::new(Config::default());
        let err = sim.set_parameter("leverage", &serde_json::json!(5)).unwrap_err();
        assert!(matches!(err, ParameterError::UnknownName(_)));
    }

    #[tokio::test]
    async fn set_parameter_is_reflected_in_the_next_published_result() {
        let sim = Simulator::new(Config::default());
        sim.on_snapshot(&sample_snapshot());

        sim.set_parameter("quantity", &serde_json::json!(200.0)).unwrap();
        // Allow the worker task to process the dispatched simulation.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let result = sim.results();
        assert_eq!(result.parameters.quantity_usd, 200.0);
    }

    #[tokio::test]
    async fn performance_report_includes_book_counters() {
        let sim = Simulator::new(Config::default());
        sim.on_snapshot(&sample_snapshot());
        let report = sim.performance();
        assert_eq!(report.book.update_count, 1);
        assert_eq!(report.tick_count, 1);
    }
}
