use chrono::{DateTime, Utc};
use slab::Slab;

use crate::orderbook::types::{ClientId, OrderId, OrderType, Price, Quantity, Side};

/// Slot index of an order inside the arena. Levels and orders refer to each
/// other through these keys, never through pointers.
pub(crate) type OrderKey = usize;

/// Sentinel for "no neighbor" in the intrusive FIFO links.
pub(crate) const NIL: OrderKey = usize::MAX;

/// A resting order: immutable identity plus the mutable residual state that
/// matching and modification update in place.
///
/// The `next`/`prev` fields are intrusive doubly-linked FIFO links inside
/// the order's price level; the owning level holds the head and tail keys.
/// The parent level itself is identified by `(side, price)` — the price is
/// the level's slot in the dense side array, so no separate back-reference
/// is stored.
#[derive(Debug)]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub side: Side,
    pub order_type: OrderType,
    /// Resting limit price in cents.
    pub price: Price,
    pub entry_time: DateTime<Utc>,
    remaining: Quantity,
    filled: Quantity,
    /// Sum of fill_price * fill_shares over all fills, in cent-shares.
    notional: u64,
    pub(crate) next: OrderKey,
    pub(crate) prev: OrderKey,
}

impl Order {
    pub(crate) fn new(
        id: OrderId,
        client_id: ClientId,
        side: Side,
        order_type: OrderType,
        price: Price,
        remaining: Quantity,
        filled: Quantity,
        notional: u64,
    ) -> Self {
        Self {
            id,
            client_id,
            side,
            order_type,
            price,
            entry_time: Utc::now(),
            remaining,
            filled,
            notional,
            next: NIL,
            prev: NIL,
        }
    }

    /// Residual shares still open in the book.
    pub fn remaining(&self) -> Quantity {
        self.remaining
    }

    /// Cumulative filled shares.
    pub fn filled(&self) -> Quantity {
        self.filled
    }

    /// Volume-weighted average fill price in cents, 0.0 if nothing filled.
    pub fn avg_price(&self) -> f64 {
        if self.filled == 0 {
            0.0
        } else {
            self.notional as f64 / self.filled as f64
        }
    }

    /// Apply one fill: decrement the residual, advance the cumulative
    /// counters. The caller keeps level and side aggregates in sync.
    pub(crate) fn add_fill(&mut self, size: Quantity, price: Price) {
        debug_assert!(size <= self.remaining, "fill exceeds residual");
        self.remaining -= size;
        self.filled += size;
        self.notional += price as u64 * size as u64;
    }

    /// Replace the residual (size-modify). Aggregate updates are the
    /// caller's responsibility.
    pub(crate) fn set_remaining(&mut self, shares: Quantity) {
        self.remaining = shares;
    }
}

/// Arena of all orders owned by one book.
///
/// Orders are created when a limit remainder rests and destroyed when fully
/// filled or canceled; the slab recycles slots. Lookups through a stale key
/// are an internal invariant breach and abort.
#[derive(Debug, Default)]
pub(crate) struct OrderArena {
    slots: Slab<Order>,
}

impl OrderArena {
    pub(crate) fn new() -> Self {
        Self { slots: Slab::new() }
    }

    pub(crate) fn insert(&mut self, order: Order) -> OrderKey {
        self.slots.insert(order)
    }

    pub(crate) fn remove(&mut self, key: OrderKey) -> Order {
        self.slots.remove(key)
    }

    pub(crate) fn get(&self, key: OrderKey) -> &Order {
        &self.slots[key]
    }

    pub(crate) fn get_mut(&mut self, key: OrderKey) -> &mut Order {
        &mut self.slots[key]
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resting_order(id: OrderId, price: Price, shares: Quantity) -> Order {
        Order::new(id, 1, Side::Buy, OrderType::Limit, price, shares, 0, 0)
    }

    #[test]
    fn test_fill_accounting() {
        let mut order = resting_order(0, 3000, 10);

        order.add_fill(3, 3000);
        assert_eq!(order.remaining(), 7);
        assert_eq!(order.filled(), 3);
        assert_eq!(order.avg_price(), 3000.0);

        order.add_fill(4, 4000);
        assert_eq!(order.remaining(), 3);
        assert_eq!(order.filled(), 7);
        // (3*3000 + 4*4000) / 7
        assert!((order.avg_price() - 3571.4285714285716).abs() < 1e-9);
    }

    #[test]
    fn test_avg_price_empty() {
        let order = resting_order(0, 2500, 5);
        assert_eq!(order.avg_price(), 0.0);
    }

    #[test]
    fn test_arena_insert_remove_recycles() {
        let mut arena = OrderArena::new();

        let a = arena.insert(resting_order(0, 100, 1));
        let b = arena.insert(resting_order(1, 100, 2));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).id, 0);
        assert_eq!(arena.get(b).id, 1);

        let removed = arena.remove(a);
        assert_eq!(removed.id, 0);
        assert_eq!(arena.len(), 1);

        // slab reuses the freed slot
        let c = arena.insert(resting_order(2, 200, 3));
        assert_eq!(c, a);
        assert_eq!(arena.get(c).id, 2);
    }

    #[test]
    fn test_links_start_unlinked() {
        let order = resting_order(7, 100, 1);
        assert_eq!(order.next, NIL);
        assert_eq!(order.prev, NIL);
    }
}
