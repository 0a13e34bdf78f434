//! Order lifecycle operations on a resting book: cancel, modify-price,
//! modify-size.
//!
//! Price changes relinquish queue position: modify-price is cancel followed
//! by a fresh submit (new order id, new time-priority slot, may cross).
//! Size changes keep the order in place and only move the aggregates.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::orderbook::book::Book;
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{price_to_cents, OrderId, OrderIntent, Quantity, Side};

impl Book {
    /// Cancel a resting order: unlink it from its level, update the level
    /// and side aggregates, drop its level if emptied, and remove it from
    /// the by-id index. Emits no execution.
    pub fn cancel(&mut self, order_id: OrderId) -> OrderBookResult<()> {
        let key = self
            .orders
            .remove(&order_id)
            .ok_or(OrderBookError::UnknownOrder)?;

        let side = self.arena.get(key).side;
        let book_side = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book_side.remove_order(&mut self.arena, key);
        let order = self.arena.remove(key);

        info!(
            symbol = %self.symbol,
            order_id,
            remaining = order.remaining(),
            "order canceled"
        );
        Ok(())
    }

    /// Reprice a resting order. Equivalent to cancel-then-submit with the
    /// same residual shares, order type and client id, but a **new order
    /// id** — any price change gives up queue position, even to the same
    /// price. The re-submitted order may cross.
    ///
    /// Returns the replacement order's id.
    pub fn modify_price(&mut self, order_id: OrderId, new_limit: Decimal) -> OrderBookResult<OrderId> {
        // Reject bad prices before unlinking anything.
        price_to_cents(new_limit)?;

        let key = *self
            .orders
            .get(&order_id)
            .ok_or(OrderBookError::UnknownOrder)?;
        let (side, remaining, client_id) = {
            let order = self.arena.get(key);
            (order.side, order.remaining(), order.client_id)
        };

        self.orders.remove(&order_id);
        let book_side = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book_side.remove_order(&mut self.arena, key);
        self.arena.remove(key);

        let replacement = OrderIntent::limit(side, remaining as i64, new_limit, client_id);
        let new_id = self.submit(&replacement)?;
        debug!(
            symbol = %self.symbol,
            order_id,
            new_id,
            %new_limit,
            "order repriced"
        );
        Ok(new_id)
    }

    /// Change a resting order's residual shares in place. Time priority is
    /// preserved; the level and side aggregates move by the delta. A
    /// non-positive size is rejected (cancel is a separate operation).
    pub fn modify_size(&mut self, order_id: OrderId, new_size: i64) -> OrderBookResult<()> {
        if new_size <= 0 || new_size > Quantity::MAX as i64 {
            return Err(OrderBookError::InvalidQuantity);
        }
        let new_size = new_size as Quantity;

        let key = *self
            .orders
            .get(&order_id)
            .ok_or(OrderBookError::UnknownOrder)?;
        let (side, price, old_size) = {
            let order = self.arena.get(key);
            (order.side, order.price, order.remaining())
        };

        let delta = new_size as i64 - old_size as i64;
        self.arena.get_mut(key).set_remaining(new_size);

        let book_side = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book_side.level_mut(price).adjust_volume(delta);
        book_side.adjust_total(delta);

        debug!(symbol = %self.symbol, order_id, old_size, new_size, "order resized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdAllocator;
    use crate::orderbook::types::{OrderId, Side};
    use std::sync::Arc;

    fn test_book() -> Book {
        Book::new("AAPL", Arc::new(IdAllocator::new()))
    }

    fn limit(side: Side, shares: i64, price_cents: i64, client_id: u32) -> OrderIntent {
        OrderIntent::limit(side, shares, Decimal::new(price_cents, 2), client_id)
    }

    fn level_ids(book: &Book, side: Side, price: i32) -> Vec<OrderId> {
        let book_side = match side {
            Side::Buy => book.buy_side(),
            Side::Sell => book.sell_side(),
        };
        book_side
            .find(price)
            .map(|level| level.keys(&book.arena).map(|k| book.arena.get(k).id).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_cancel_middle_order_in_level() {
        let mut book = test_book();

        book.submit(&limit(Side::Buy, 10, 4700, 48)).unwrap();
        let middle = book.submit(&limit(Side::Buy, 20, 4700, 49)).unwrap();
        book.submit(&limit(Side::Buy, 30, 4700, 50)).unwrap();

        book.cancel(middle).unwrap();

        let level = book.buy_side().find(4700).unwrap();
        assert_eq!(level.order_count(), 2);
        assert_eq!(level.total_volume(), 40);
        assert_eq!(level_ids(&book, Side::Buy, 4700), vec![0, 2]);
        assert_eq!(book.buy_side().side_volume(), 40);
        assert!(book.resting_order(middle).is_none());
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_head_order() {
        let mut book = test_book();

        let head = book.submit(&limit(Side::Buy, 10, 4700, 51)).unwrap();
        book.submit(&limit(Side::Buy, 20, 4700, 52)).unwrap();

        book.cancel(head).unwrap();

        assert_eq!(level_ids(&book, Side::Buy, 4700), vec![1]);
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_tail_order() {
        let mut book = test_book();

        book.submit(&limit(Side::Sell, 10, 4700, 53)).unwrap();
        let tail = book.submit(&limit(Side::Sell, 20, 4700, 54)).unwrap();

        book.cancel(tail).unwrap();

        assert_eq!(level_ids(&book, Side::Sell, 4700), vec![0]);
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_removes_emptied_level_and_recomputes_best() {
        let mut book = test_book();

        book.submit(&limit(Side::Sell, 10, 4700, 55)).unwrap();
        let best = book.submit(&limit(Side::Sell, 20, 4500, 56)).unwrap();

        book.cancel(best).unwrap();

        assert!(book.sell_side().find(4500).is_none());
        assert_eq!(book.best_ask(), Some(4700));
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_last_order_empties_side() {
        let mut book = test_book();

        let only = book.submit(&limit(Side::Sell, 10, 4700, 57)).unwrap();
        book.cancel(only).unwrap();

        assert!(book.sell_side().find(4700).is_none());
        assert_eq!(book.sell_side().side_volume(), 0);
        assert_eq!(book.best_ask(), None);
        book.assert_invariants();
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut book = test_book();
        assert_eq!(book.cancel(10), Err(OrderBookError::UnknownOrder));
    }

    #[test]
    fn test_cancel_twice_fails() {
        let mut book = test_book();
        let id = book.submit(&limit(Side::Buy, 10, 4700, 1)).unwrap();

        book.cancel(id).unwrap();
        assert_eq!(book.cancel(id), Err(OrderBookError::UnknownOrder));
    }

    #[test]
    fn test_cancel_after_full_fill_fails() {
        let mut book = test_book();

        let maker = book.submit(&limit(Side::Sell, 10, 4700, 1)).unwrap();
        book.submit(&limit(Side::Buy, 10, 4700, 2)).unwrap();

        assert_eq!(book.cancel(maker), Err(OrderBookError::UnknownOrder));
    }

    #[test]
    fn test_modify_size() {
        let mut book = test_book();

        let id = book.submit(&limit(Side::Buy, 10, 4500, 61)).unwrap();
        book.modify_size(id, 20).unwrap();

        let level = book.buy_side().find(4500).unwrap();
        assert_eq!(level.total_volume(), 20);
        assert_eq!(level.order_count(), 1);
        assert_eq!(book.buy_side().side_volume(), 20);
        assert_eq!(book.resting_order(id).unwrap().remaining(), 20);
        book.assert_invariants();

        book.modify_size(id, 5).unwrap();
        assert_eq!(book.buy_side().side_volume(), 5);
        book.assert_invariants();
    }

    #[test]
    fn test_modify_size_keeps_queue_position() {
        let mut book = test_book();

        let first = book.submit(&limit(Side::Buy, 10, 4500, 1)).unwrap();
        book.submit(&limit(Side::Buy, 5, 4500, 2)).unwrap();

        book.modify_size(first, 25).unwrap();
        assert_eq!(level_ids(&book, Side::Buy, 4500), vec![first, 1]);
    }

    #[test]
    fn test_modify_size_to_same_size_is_noop_on_totals() {
        let mut book = test_book();

        let id = book.submit(&limit(Side::Buy, 10, 4500, 1)).unwrap();
        book.modify_size(id, 10).unwrap();

        assert_eq!(book.buy_side().side_volume(), 10);
        assert_eq!(book.buy_side().find(4500).unwrap().total_volume(), 10);
        book.assert_invariants();
    }

    #[test]
    fn test_modify_size_rejects_non_positive() {
        let mut book = test_book();
        let id = book.submit(&limit(Side::Buy, 10, 4500, 1)).unwrap();

        assert_eq!(book.modify_size(id, 0), Err(OrderBookError::InvalidQuantity));
        assert_eq!(book.modify_size(id, -5), Err(OrderBookError::InvalidQuantity));
        assert_eq!(book.buy_side().side_volume(), 10);
    }

    #[test]
    fn test_modify_size_unknown_order() {
        let mut book = test_book();
        assert_eq!(book.modify_size(99, 10), Err(OrderBookError::UnknownOrder));
    }

    #[test]
    fn test_modify_price_moves_order() {
        let mut book = test_book();

        let id = book.submit(&limit(Side::Sell, 20, 5000, 58)).unwrap();
        let new_id = book.modify_price(id, Decimal::new(4000, 2)).unwrap();

        assert!(book.sell_side().find(5000).is_none());
        let level = book.sell_side().find(4000).unwrap();
        assert_eq!(level.order_count(), 1);
        assert_eq!(book.best_ask(), Some(4000));
        assert!(book.resting_order(id).is_none());
        assert_eq!(book.resting_order(new_id).unwrap().remaining(), 20);
        book.assert_invariants();
    }

    #[test]
    fn test_modify_price_into_existing_level() {
        let mut book = test_book();

        let id = book.submit(&limit(Side::Buy, 10, 4700, 59)).unwrap();
        book.submit(&limit(Side::Buy, 10, 4500, 60)).unwrap();

        book.modify_price(id, Decimal::new(4500, 2)).unwrap();

        assert!(book.buy_side().find(4700).is_none());
        let level = book.buy_side().find(4500).unwrap();
        assert_eq!(level.order_count(), 2);
        assert_eq!(level.total_volume(), 20);
        book.assert_invariants();
    }

    #[test]
    fn test_modify_price_relinquishes_priority_even_at_same_price() {
        let mut book = test_book();

        let first = book.submit(&limit(Side::Buy, 10, 4500, 1)).unwrap();
        let second = book.submit(&limit(Side::Buy, 5, 4500, 2)).unwrap();

        let new_id = book.modify_price(first, Decimal::new(4500, 2)).unwrap();

        assert_ne!(new_id, first);
        assert_eq!(level_ids(&book, Side::Buy, 4500), vec![second, new_id]);
        book.assert_invariants();
    }

    #[test]
    fn test_modify_price_preserves_client_and_residual() {
        let mut book = test_book();

        let id = book.submit(&limit(Side::Buy, 12, 4500, 77)).unwrap();
        let new_id = book.modify_price(id, Decimal::new(4600, 2)).unwrap();

        let order = book.resting_order(new_id).unwrap();
        assert_eq!(order.client_id, 77);
        assert_eq!(order.remaining(), 12);
        assert_eq!(order.filled(), 0);
    }

    #[test]
    fn test_modify_price_can_cross() {
        let mut book = test_book();

        book.submit(&limit(Side::Sell, 10, 5000, 1)).unwrap();
        let bid = book.submit(&limit(Side::Buy, 10, 4000, 2)).unwrap();

        let new_id = book.modify_price(bid, Decimal::new(5000, 2)).unwrap();

        let execution = book.pop_next_execution().unwrap();
        assert_eq!(execution.taker_order_id, new_id);
        assert_eq!(execution.price, 5000);
        assert_eq!(execution.size, 10);
        assert_eq!(book.nbbo(), (None, None));
        book.assert_invariants();
    }

    #[test]
    fn test_modify_price_rejects_bad_price_without_unlinking() {
        let mut book = test_book();

        let id = book.submit(&limit(Side::Buy, 10, 4500, 1)).unwrap();
        let err = book.modify_price(id, Decimal::new(-100, 2));
        assert_eq!(err, Err(OrderBookError::InvalidPrice));

        // the order is still resting untouched
        assert_eq!(book.resting_order(id).unwrap().remaining(), 10);
        assert_eq!(book.best_bid(), Some(4500));
        book.assert_invariants();
    }

    #[test]
    fn test_modify_price_unknown_order() {
        let mut book = test_book();
        assert_eq!(
            book.modify_price(3, Decimal::new(4500, 2)),
            Err(OrderBookError::UnknownOrder)
        );
    }
}
