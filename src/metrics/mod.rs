use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use tokio::time::interval;
use tracing::info;

use crate::orderbook::types::Execution;
use crate::orderbook::BookStats;

/// Mutating engine entry points instrumented for throughput and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Submit,
    Cancel,
    Modify,
}

impl EngineOp {
    pub const ALL: [EngineOp; 3] = [EngineOp::Submit, EngineOp::Cancel, EngineOp::Modify];

    fn label(self) -> &'static str {
        match self {
            EngineOp::Submit => "submit",
            EngineOp::Cancel => "cancel",
            EngineOp::Modify => "modify",
        }
    }
}

/// Publishes engine activity through the `metrics` facade.
///
/// Distribution work (histogram buckets, percentiles, rates) belongs to the
/// installed exporter; this struct only registers the series and feeds them.
/// The lone local state is a call count and summed wall time per operation,
/// enough for `report_loop` to print a running mean without re-aggregating
/// anything the exporter already has.
#[derive(Debug)]
pub struct OrderBookMetrics {
    ops: [OpUsage; 3],
    rejections: AtomicU64,
    executions: AtomicU64,
    traded_volume: AtomicU64,
    traded_notional: AtomicU64,
}

/// Call count and summed wall time of one instrumented operation.
#[derive(Debug)]
struct OpUsage {
    calls: AtomicU64,
    nanos: AtomicU64,
}

impl OpUsage {
    const fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            nanos: AtomicU64::new(0),
        }
    }
}

impl OrderBookMetrics {
    pub fn new() -> Self {
        describe_counter!("engine_orders_total", "Engine operations by kind");
        describe_counter!(
            "engine_orders_rejected_total",
            "Operations refused by validation or liquidity checks"
        );
        describe_counter!("engine_executions_total", "Executions emitted");
        describe_counter!("engine_traded_volume_total", "Shares traded");
        describe_histogram!(
            "engine_operation_duration_seconds",
            "Wall time of engine operations"
        );
        describe_gauge!("engine_resting_orders", "Orders currently resting");
        describe_gauge!("engine_levels", "Live price levels per side");
        describe_gauge!("engine_best_price", "Best price per side, in cents");
        describe_gauge!("engine_spread_cents", "Bid-ask spread in cents");

        Self {
            ops: [OpUsage::new(), OpUsage::new(), OpUsage::new()],
            rejections: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            traded_volume: AtomicU64::new(0),
            traded_notional: AtomicU64::new(0),
        }
    }

    /// Run one engine call under the clock: count the attempt, feed its wall
    /// time to the exporter histogram, and hand back the call's result
    /// untouched.
    pub fn measure<F, R>(&self, op: EngineOp, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let begun = Instant::now();
        let result = f();
        let elapsed = begun.elapsed();

        let usage = &self.ops[op as usize];
        usage.calls.fetch_add(1, Ordering::Relaxed);
        usage
            .nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);

        counter!("engine_orders_total", "operation" => op.label()).increment(1);
        histogram!("engine_operation_duration_seconds", "operation" => op.label())
            .record(elapsed.as_secs_f64());

        result
    }

    /// Count an operation the engine refused.
    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_rejected_total").increment(1);
    }

    /// Record one emitted execution report.
    pub fn record_execution(&self, execution: &Execution) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.traded_volume
            .fetch_add(execution.size as u64, Ordering::Relaxed);
        self.traded_notional.fetch_add(
            execution.price as u64 * execution.size as u64,
            Ordering::Relaxed,
        );

        counter!("engine_executions_total").increment(1);
        counter!("engine_traded_volume_total").increment(execution.size as u64);
    }

    /// Publish book-state gauges from a stats snapshot.
    pub fn observe_book(&self, stats: &BookStats) {
        gauge!("engine_resting_orders", "symbol" => stats.symbol.clone())
            .set(stats.resting_orders as f64);
        gauge!("engine_levels", "symbol" => stats.symbol.clone(), "side" => "bid")
            .set(stats.bid_levels as f64);
        gauge!("engine_levels", "symbol" => stats.symbol.clone(), "side" => "ask")
            .set(stats.ask_levels as f64);

        if let Some(bid) = stats.best_bid {
            gauge!("engine_best_price", "symbol" => stats.symbol.clone(), "side" => "bid")
                .set(bid as f64);
        }
        if let Some(ask) = stats.best_ask {
            gauge!("engine_best_price", "symbol" => stats.symbol.clone(), "side" => "ask")
                .set(ask as f64);
        }
        if let Some(spread) = stats.spread {
            gauge!("engine_spread_cents", "symbol" => stats.symbol.clone()).set(spread as f64);
        }
    }

    /// How many times an operation ran under `measure`.
    pub fn op_calls(&self, op: EngineOp) -> u64 {
        self.ops[op as usize].calls.load(Ordering::Relaxed)
    }

    /// Mean wall time of an operation in microseconds, 0.0 before first use.
    pub fn op_mean_micros(&self, op: EngineOp) -> f64 {
        let usage = &self.ops[op as usize];
        let calls = usage.calls.load(Ordering::Relaxed);
        if calls == 0 {
            0.0
        } else {
            usage.nanos.load(Ordering::Relaxed) as f64 / calls as f64 / 1_000.0
        }
    }

    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn traded_volume(&self) -> u64 {
        self.traded_volume.load(Ordering::Relaxed)
    }

    pub fn traded_notional(&self) -> u64 {
        self.traded_notional.load(Ordering::Relaxed)
    }
}

impl Default for OrderBookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Log a one-line activity summary every `every`, until the task is dropped.
pub async fn report_loop(metrics: Arc<OrderBookMetrics>, every: Duration) {
    let mut tick = interval(every);

    loop {
        tick.tick().await;

        let line = EngineOp::ALL
            .iter()
            .map(|&op| {
                format!(
                    "{} {} ({:.1}us avg)",
                    op.label(),
                    metrics.op_calls(op),
                    metrics.op_mean_micros(op)
                )
            })
            .collect::<Vec<_>>()
            .join(" / ");
        info!(
            "engine activity: {} | rejected {} | {} executions for {} shares",
            line,
            metrics.rejections(),
            metrics.executions(),
            metrics.traded_volume()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdAllocator;
    use crate::orderbook::{Book, OrderIntent, Side};
    use rust_decimal::Decimal;

    #[test]
    fn test_measure_counts_per_operation() {
        let metrics = OrderBookMetrics::new();

        let answer = metrics.measure(EngineOp::Submit, || 42);
        assert_eq!(answer, 42);
        metrics.measure(EngineOp::Submit, || ());
        metrics.measure(EngineOp::Cancel, || ());

        assert_eq!(metrics.op_calls(EngineOp::Submit), 2);
        assert_eq!(metrics.op_calls(EngineOp::Cancel), 1);
        assert_eq!(metrics.op_calls(EngineOp::Modify), 0);
        assert_eq!(metrics.op_mean_micros(EngineOp::Modify), 0.0);
    }

    #[test]
    fn test_rejections_are_separate_from_calls() {
        let metrics = OrderBookMetrics::new();

        metrics.record_rejection();
        metrics.record_rejection();

        assert_eq!(metrics.rejections(), 2);
        assert_eq!(metrics.op_calls(EngineOp::Submit), 0);
    }

    #[test]
    fn test_record_execution_totals() {
        let metrics = OrderBookMetrics::new();
        let mut book = Book::new("TEST", Arc::new(IdAllocator::new()));

        book.submit(&OrderIntent::limit(Side::Sell, 10, Decimal::new(5000, 2), 1))
            .unwrap();
        book.submit(&OrderIntent::limit(Side::Buy, 4, Decimal::new(5000, 2), 2))
            .unwrap();

        let execution = book.pop_next_execution().unwrap();
        metrics.record_execution(&execution);

        assert_eq!(metrics.executions(), 1);
        assert_eq!(metrics.traded_volume(), 4);
        assert_eq!(metrics.traded_notional(), 4 * 5000);
    }
}
