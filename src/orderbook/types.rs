use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::error::{OrderBookError, OrderBookResult};

pub type OrderId = u64;
pub type ExecutionId = u64;
pub type ClientId = u32;

/// Price in hundredths of the quote currency (cents).
pub type Price = i32;
/// Shares of a single order.
pub type Quantity = u32;
/// Aggregated shares (level or side totals).
pub type Volume = u64;

/// Highest admissible limit price, in cents. The dense side representation
/// preallocates one level slot per cent in `[0, MAX_PRICE]`.
pub const MAX_PRICE: Price = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// Per-party execution disposition: `FullFill` when the party's residual
/// reaches zero with this fill, `PartialFill` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecType {
    PartialFill,
    FullFill,
}

/// Client order intent as it arrives from the boundary layer.
///
/// Prices arrive as decimals with two fractional digits; `validate` converts
/// to internal cents. Limit must be present for `Limit` and absent for
/// `Market`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: Side,
    pub order_type: OrderType,
    pub shares: i64,
    pub limit: Option<Decimal>,
    pub client_id: ClientId,
}

impl OrderIntent {
    pub fn limit(side: Side, shares: i64, limit: Decimal, client_id: ClientId) -> Self {
        Self {
            side,
            order_type: OrderType::Limit,
            shares,
            limit: Some(limit),
            client_id,
        }
    }

    pub fn market(side: Side, shares: i64, client_id: ClientId) -> Self {
        Self {
            side,
            order_type: OrderType::Market,
            shares,
            limit: None,
            client_id,
        }
    }

    /// Validate the intent and resolve it to internal units.
    ///
    /// Returns `(shares, price)` where `price` is the limit in cents, or
    /// `-1` for market orders. No book state is touched here; a failed
    /// submit must leave the engine unchanged.
    pub(crate) fn validate(&self) -> OrderBookResult<(Quantity, Price)> {
        if self.shares <= 0 || self.shares > Quantity::MAX as i64 {
            return Err(OrderBookError::InvalidQuantity);
        }
        let shares = self.shares as Quantity;

        let price = match self.order_type {
            OrderType::Limit => {
                let limit = self.limit.ok_or(OrderBookError::MissingLimitPrice)?;
                price_to_cents(limit)?
            }
            OrderType::Market => {
                if self.limit.is_some() {
                    return Err(OrderBookError::UnexpectedLimitPrice);
                }
                -1
            }
        };

        Ok((shares, price))
    }
}

/// Convert a decimal price to internal cents: `round(decimal * 100)`,
/// midpoint away from zero.
pub fn price_to_cents(limit: Decimal) -> OrderBookResult<Price> {
    if limit <= Decimal::ZERO {
        return Err(OrderBookError::InvalidPrice);
    }
    let cents = (limit * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let cents = cents.to_i32().ok_or(OrderBookError::PriceOutOfRange)?;
    if cents <= 0 {
        return Err(OrderBookError::InvalidPrice);
    }
    if cents > MAX_PRICE {
        return Err(OrderBookError::PriceOutOfRange);
    }
    Ok(cents)
}

/// External decimal representation of an internal price.
pub fn cents_to_decimal(price: Price) -> Decimal {
    Decimal::new(price as i64, 2)
}

/// One fill between a resting (maker) order and an incoming (taker) order.
///
/// Immutable once emitted; appended to the book's execution queue in the
/// order fills occur. Downstream components translate these into wire
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: ExecutionId,
    pub symbol: String,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_client_id: ClientId,
    pub taker_client_id: ClientId,
    /// Fill price in cents. Always the maker's resting price.
    pub price: Price,
    pub size: Quantity,
    pub maker_side: Side,
    pub taker_side: Side,
    pub maker_exec_type: ExecType,
    pub taker_exec_type: ExecType,
    /// Cumulative filled shares per party, after this fill.
    pub maker_cumulative_filled: Quantity,
    pub taker_cumulative_filled: Quantity,
    /// Residual shares per party, after this fill.
    pub maker_leaves: Quantity,
    pub taker_leaves: Quantity,
    /// Volume-weighted average fill price per party, in cents.
    pub maker_avg_price: f64,
    pub taker_avg_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Execution {
    /// Fill price as a two-digit decimal for external reports.
    pub fn price_decimal(&self) -> Decimal {
        cents_to_decimal(self.price)
    }
}

/// Aggregate view of one price level, used in depth snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevelInfo {
    pub price: Price,
    pub volume: Volume,
    pub order_count: u32,
}

/// Point-in-time depth snapshot of one book, best levels first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevelInfo>,
    pub asks: Vec<PriceLevelInfo>,
}
