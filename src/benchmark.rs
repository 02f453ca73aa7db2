//! Per-label timing harness: `measure` returns a guard whose `Drop` records
//! the elapsed time, which is a no-op when the benchmarker hasn't been
//! `start()`-ed. Percentiles are computed by index truncation (not
//! interpolation) over a capped history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

const DEFAULT_MAX_HISTORY: usize = 1000;

#[derive(Debug, Clone, Default)]
struct Timing {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
    last: Duration,
    history: std::collections::VecDeque<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelStats {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct BenchmarkResults {
    pub labels: HashMap<String, LabelStats>,
    pub total_runtime_seconds: Option<f64>,
}

struct Inner {
    max_history: usize,
    timings: HashMap<String, Timing>,
    start_time: Option<Instant>,
    is_running: bool,
}

/// Cloneable handle onto a shared timing table.
#[derive(Clone)]
pub struct Benchmarker {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Benchmarker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl Benchmarker {
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                max_history,
                timings: HashMap::new(),
                start_time: None,
                is_running: false,
            })),
        }
    }

    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.start_time = Some(Instant::now());
        inner.is_running = true;
    }

    pub fn stop(&self) {
        self.inner.lock().is_running = false;
    }

    /// Begin timing `label`. Returns a guard that records the elapsed time
    /// on drop; if the benchmarker isn't running, the guard records nothing.
    pub fn measure(&self, label: &str) -> MeasureGuard<'_> {
        let running = self.inner.lock().is_running;
        MeasureGuard {
            benchmarker: self,
            label: label.to_string(),
            started: running.then(Instant::now),
        }
    }

    fn record(&self, label: &str, elapsed: Duration) {
        let mut inner = self.inner.lock();
        let max_history = inner.max_history;
        let timing = inner.timings.entry(label.to_string()).or_default();

        timing.count += 1;
        timing.total += elapsed;
        timing.min = Some(timing.min.map_or(elapsed, |m| m.min(elapsed)));
        timing.max = timing.max.max(elapsed);
        timing.last = elapsed;

        if timing.history.len() == max_history {
            timing.history.pop_front();
        }
        timing.history.push_back(elapsed);
    }

    pub fn results(&self) -> BenchmarkResults {
        let inner = self.inner.lock();
        let mut labels = HashMap::new();

        for (label, timing) in inner.timings.iter() {
            if timing.count == 0 {
                continue;
            }
            let avg = timing.total.as_secs_f64() / timing.count as f64;

            let mut history: Vec<f64> = timing.history.iter().map(Duration::as_secs_f64).collect();
            history.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let (p50, p90, p99) = if history.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                let n = history.len();
                let idx = |frac: f64| ((n as f64 * frac) as usize).min(n - 1);
                (
                    history[n / 2],
                    history[idx(0.9)],
                    history[idx(0.99)],
                )
            };

            labels.insert(
                label.clone(),
                LabelStats {
                    count: timing.count,
                    avg_ms: avg * 1000.0,
                    min_ms: timing.min.unwrap_or_default().as_secs_f64() * 1000.0,
                    max_ms: timing.max.as_secs_f64() * 1000.0,
                    last_ms: timing.last.as_secs_f64() * 1000.0,
                    p50_ms: p50 * 1000.0,
                    p90_ms: p90 * 1000.0,
                    p99_ms: p99 * 1000.0,
                },
            );
        }

        let total_runtime_seconds = inner.start_time.map(|t| t.elapsed().as_secs_f64());

        BenchmarkResults { labels, total_runtime_seconds }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.timings.clear();
        inner.start_time = Some(Instant::now());
    }
}

/// RAII timing guard returned by [`Benchmarker::measure`].
pub struct MeasureGuard<'a> {
    benchmarker: &'a Benchmarker,
    label: String,
    started: Option<Instant>,
}

impl Drop for MeasureGuard<'_> {
    fn drop(&mut self) {
        if let Some(start) = self.started {
            self.benchmarker.record(&self.label, start.elapsed());
        }
    }
}
