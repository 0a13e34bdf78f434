use serde::{Deserialize, Serialize};
use std::fmt;

/// Recoverable errors surfaced by the matching engine.
///
/// All variants are raised synchronously before any book state is written;
/// a failed operation never leaves partial mutations behind and never emits
/// an execution. Internal invariant breaches are not represented here: they
/// are fatal and abort via panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBookError {
    /// Order shares must be a positive integer
    InvalidQuantity,

    /// Limit price must be positive
    InvalidPrice,

    /// Limit price exceeds the bounded price range of the book
    PriceOutOfRange,

    /// Limit order submitted without a limit price
    MissingLimitPrice,

    /// Market order submitted with a limit price
    UnexpectedLimitPrice,

    /// Cancel or modify of an order id not resting in the book
    UnknownOrder,

    /// Operation on a symbol with no registered order book
    UnknownSymbol,

    /// Market order larger than the opposing side's resting volume
    InsufficientLiquidity,
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::InvalidQuantity => write!(f, "Order shares must be positive"),
            OrderBookError::InvalidPrice => write!(f, "Limit price must be positive"),
            OrderBookError::PriceOutOfRange => write!(f, "Limit price outside allowed range"),
            OrderBookError::MissingLimitPrice => {
                write!(f, "Limit order requires a limit price")
            }
            OrderBookError::UnexpectedLimitPrice => {
                write!(f, "Market order must not carry a limit price")
            }
            OrderBookError::UnknownOrder => write!(f, "Order is not in the book"),
            OrderBookError::UnknownSymbol => write!(f, "Symbol is not registered"),
            OrderBookError::InsufficientLiquidity => {
                write!(f, "Market order exceeds available liquidity")
            }
        }
    }
}

impl std::error::Error for OrderBookError {}

/// Result type for order book operations
pub type OrderBookResult<T> = Result<T, OrderBookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrderBookError::UnknownOrder.to_string(),
            "Order is not in the book"
        );
        assert_eq!(
            OrderBookError::InsufficientLiquidity.to_string(),
            "Market order exceeds available liquidity"
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = OrderBookError::UnknownOrder;
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: OrderBookError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
