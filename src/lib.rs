//! Central Limit Order Book Matching Engine
//!
//! A multi-instrument exchange core: per-symbol order books matched under
//! strict price-time priority, with execution reports for every fill.
//!
//! # Features
//!
//! - **Price-Time Priority**: strict FIFO within a price level, strict price
//!   priority across levels, fills at the maker's resting price
//! - **Dense price levels**: preallocated per-cent level slots with a bitmap
//!   best-price scan; no allocation on the matching path
//! - **O(1) order lifecycle**: arena-backed intrusive FIFO queues make
//!   cancel and modify constant-time given the order id
//! - **Execution reports**: per-fill records with both parties' cumulative,
//!   leaves and average-price running state
//! - **Deterministic core**: single-threaded per book, monotonic ids,
//!   same inputs produce the same outputs
//!
//! # Quick Start
//!
//! ```rust
//! use exchange_matching_engine::{Exchange, OrderIntent, Side};
//! use rust_decimal::Decimal;
//!
//! let mut exchange = Exchange::new("DEMO");
//! exchange.add_instrument("AAPL");
//!
//! // Rest an ask, then cross it
//! exchange.add_order("AAPL", &OrderIntent::limit(Side::Sell, 100, Decimal::new(15000, 2), 7))?;
//! exchange.add_order("AAPL", &OrderIntent::limit(Side::Buy, 40, Decimal::new(15000, 2), 9))?;
//!
//! let report = exchange.pop_next_execution("AAPL")?.expect("one fill");
//! assert_eq!(report.price, 15_000);
//! assert_eq!(report.size, 40);
//!
//! assert_eq!(exchange.nbbo("AAPL")?, (None, Some(15_000)));
//! # Ok::<(), exchange_matching_engine::OrderBookError>(())
//! ```
//!
//! # Architecture
//!
//! Each book owns two `BookSide`s (dense `[0, MAX_PRICE]` level arrays with
//! an occupancy bitmap), an order arena threaded with intrusive FIFO links,
//! a by-id index, and a FIFO execution queue. The `Exchange` registry maps
//! symbols to books and shares one atomic id allocator across all of them.
//! All mutation is `&mut self`: operations on one book are serialized by
//! construction and never suspend mid-match.

pub mod exchange;
pub mod ids;
pub mod metrics;
pub mod orderbook;

// Re-export commonly used types
pub use exchange::Exchange;
pub use ids::IdAllocator;
pub use metrics::OrderBookMetrics;
pub use orderbook::{
    Book, BookSnapshot, BookStats, ExecType, Execution, OrderBookError, OrderBookResult,
    OrderIntent, OrderType, Price, Quantity, Side,
};
