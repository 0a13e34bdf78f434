//! Demo exchange server.
//!
//! Runs a multi-instrument exchange with simulated order flow, publishes
//! execution reports as JSON log lines, and exposes Prometheus metrics.
//! The exchange itself is single-threaded per the engine contract; tasks
//! share it through one mutex.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{error, info, warn};

use exchange_matching_engine::metrics::{report_loop, EngineOp};
use exchange_matching_engine::orderbook::types::cents_to_decimal;
use exchange_matching_engine::{
    Exchange, OrderBookError, OrderBookMetrics, OrderIntent, Side,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Starting exchange server...");
    let started_at = Instant::now();

    start_metrics_exporter();

    // Build the exchange
    let symbols = vec!["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN"];
    let mut exchange = Exchange::new("DEMO");
    for symbol in &symbols {
        exchange.add_instrument(*symbol);
        info!("Listed instrument: {}", symbol);
    }
    let exchange = Arc::new(Mutex::new(exchange));
    let metrics = Arc::new(OrderBookMetrics::new());

    // Periodic metrics log line
    tokio::spawn(report_loop(Arc::clone(&metrics), Duration::from_secs(5)));

    // Simulated market activity per symbol
    for symbol in &symbols {
        let exchange = Arc::clone(&exchange);
        let metrics = Arc::clone(&metrics);
        let symbol = symbol.to_string();
        tokio::spawn(async move {
            simulate_market_activity(exchange, symbol, metrics).await;
        });
    }

    // Periodic book stats
    {
        let exchange = Arc::clone(&exchange);
        let metrics = Arc::clone(&metrics);
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(10));
            loop {
                tick.tick().await;
                let exchange = exchange.lock();
                for symbol in &symbols {
                    if let Some(book) = exchange.get_book(symbol) {
                        let stats = book.stats();
                        metrics.observe_book(&stats);
                        info!(
                            "{} | resting: {} | bid: {} | ask: {} | spread: {} | executions: {}",
                            symbol,
                            stats.resting_orders,
                            stats.best_bid.map_or("-".into(), format_price),
                            stats.best_ask.map_or("-".into(), format_price),
                            stats.spread.map_or("-".into(), format_price),
                            stats.total_executions
                        );
                    }
                }
            }
        });
    }

    info!("Exchange server is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down exchange server...");
    let exchange = exchange.lock();
    for symbol in &symbols {
        if let Some(book) = exchange.get_book(symbol) {
            let stats = book.stats();
            info!(
                "Final stats for {}: {} resting orders, {} executions, {} shares traded",
                symbol, stats.resting_orders, stats.total_executions, stats.total_traded_volume
            );
        }
    }
    info!("Uptime: {}s", started_at.elapsed().as_secs());

    Ok(())
}

/// Simulate deterministic market activity for one symbol.
async fn simulate_market_activity(
    exchange: Arc<Mutex<Exchange>>,
    symbol: String,
    metrics: Arc<OrderBookMetrics>,
) {
    let mut tick = interval(Duration::from_millis(10));
    let base_price: i64 = 10_000; // cents
    let mut counter: i64 = 0;
    let mut open_orders: Vec<u64> = Vec::new();

    // Initial liquidity on both sides
    {
        let mut exchange = exchange.lock();
        for i in 1..=50 {
            let bid = OrderIntent::limit(Side::Buy, 100, Decimal::new(base_price - i * 10, 2), 1);
            let ask = OrderIntent::limit(Side::Sell, 100, Decimal::new(base_price + i * 10, 2), 2);

            for intent in [bid, ask] {
                if let Ok(id) = metrics.measure(EngineOp::Submit, || {
                    exchange.add_order(&symbol, &intent)
                }) {
                    open_orders.push(id);
                }
            }
        }
    }
    info!("Initial liquidity added for {}", symbol);

    loop {
        tick.tick().await;
        counter += 1;

        {
            let mut exchange = exchange.lock();
            match counter % 10 {
                // Market orders (20% of activity)
                0 | 1 => {
                    let side = if counter % 2 == 0 { Side::Buy } else { Side::Sell };
                    let shares = 10 + counter % 50;
                    let intent = OrderIntent::market(side, shares, 3);

                    match metrics.measure(EngineOp::Submit, || exchange.add_order(&symbol, &intent))
                    {
                        Ok(_) => {}
                        Err(OrderBookError::InsufficientLiquidity) => {
                            metrics.record_rejection();
                            // Replenish the drained side
                            let price = match side {
                                Side::Buy => base_price + 50,
                                Side::Sell => base_price - 50,
                            };
                            let replenish = OrderIntent::limit(
                                side.opposite(),
                                shares,
                                Decimal::new(price, 2),
                                4,
                            );
                            if let Ok(id) = metrics.measure(EngineOp::Submit, || {
                                exchange.add_order(&symbol, &replenish)
                            }) {
                                open_orders.push(id);
                            }
                        }
                        Err(e) => warn!("Market order failed for {}: {}", symbol, e),
                    }
                }

                // Limit orders around the touch (50% of activity)
                2..=6 => {
                    let side = if counter % 2 == 0 { Side::Buy } else { Side::Sell };
                    let offset = counter % 25;
                    let price = match side {
                        Side::Buy => base_price - offset,
                        Side::Sell => base_price + offset,
                    };
                    let shares = 50 + counter % 100;
                    let intent = OrderIntent::limit(side, shares, Decimal::new(price, 2), 5);

                    match metrics.measure(EngineOp::Submit, || exchange.add_order(&symbol, &intent))
                    {
                        Ok(id) => open_orders.push(id),
                        Err(e) => warn!("Limit order failed for {}: {}", symbol, e),
                    }
                }

                // Cancellations
                7 => {
                    if let Some(id) = open_orders.pop() {
                        match metrics
                            .measure(EngineOp::Cancel, || exchange.cancel_order(&symbol, id))
                        {
                            Ok(()) => {}
                            // Already filled; nothing left to cancel
                            Err(OrderBookError::UnknownOrder) => {}
                            Err(e) => warn!("Cancel failed for {}: {}", symbol, e),
                        }
                    }
                }

                // Size modifications
                8 => {
                    if let Some(&id) = open_orders.first() {
                        let new_size = 25 + counter % 75;
                        match metrics.measure(EngineOp::Modify, || {
                            exchange.modify_size(&symbol, id, new_size)
                        }) {
                            Ok(()) => {}
                            Err(OrderBookError::UnknownOrder) => {
                                open_orders.remove(0);
                            }
                            Err(e) => warn!("Modify failed for {}: {}", symbol, e),
                        }
                    }
                }

                // Deliver execution reports
                9 => {
                    if let Some(book) = exchange.get_book_mut(&symbol) {
                        for execution in book.drain_executions() {
                            metrics.record_execution(&execution);
                            match serde_json::to_string(&execution) {
                                Ok(report) => info!(target: "execution_reports", "{}", report),
                                Err(e) => error!("Failed to serialize execution: {}", e),
                            }
                        }
                    }
                }

                _ => unreachable!(),
            }
        }
    }
}

/// Format an internal price for log output
fn format_price(price: i32) -> String {
    format!("${}", cents_to_decimal(price))
}

/// Install the Prometheus metrics exporter
fn start_metrics_exporter() {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let addr: std::net::SocketAddr = "0.0.0.0:9090".parse().expect("static address");
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!("Prometheus metrics available at http://{}/metrics", addr),
        Err(e) => error!("Failed to start metrics exporter: {}", e),
    }
}
