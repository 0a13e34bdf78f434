//! Core order book implementation.
//!
//! One `Book` per instrument: two dense price-indexed sides, an arena of
//! resting orders with intrusive FIFO queues per price level, a by-id index
//! for O(1) cancel/modify, and the outbound execution queue.

pub mod arena;
pub mod book;
pub mod error;
pub(crate) mod matching;
mod operations;
pub mod price_level;
pub mod side;
pub mod types;

// Re-export main types for convenience
pub use arena::Order;
pub use book::{Book, BookStats};
pub use error::{OrderBookError, OrderBookResult};
pub use price_level::PriceLevel;
pub use side::BookSide;
pub use types::{
    BookSnapshot, ClientId, ExecType, Execution, ExecutionId, OrderId, OrderIntent, OrderType,
    Price, PriceLevelInfo, Quantity, Side, Volume, MAX_PRICE,
};
