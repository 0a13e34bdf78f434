use crate::orderbook::arena::{OrderArena, OrderKey, NIL};
use crate::orderbook::types::{Price, Volume};

/// One price level: the FIFO of all resting orders at a single price on one
/// side of the book.
///
/// The queue is an intrusive doubly-linked list threaded through the order
/// arena; the level stores only head/tail keys plus the aggregates needed by
/// matching (`total_volume`) and depth reporting (`order_count`). Time
/// priority is insertion order: new orders link at the tail, matching
/// consumes from the head.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Price,
    total_volume: Volume,
    order_count: u32,
    head: OrderKey,
    tail: OrderKey,
}

impl PriceLevel {
    /// An unoccupied slot in the dense side array.
    pub(crate) fn vacant() -> Self {
        Self {
            price: 0,
            total_volume: 0,
            order_count: 0,
            head: NIL,
            tail: NIL,
        }
    }

    /// Reinitialize this slot for first use at `price`.
    pub(crate) fn open(&mut self, price: Price) {
        debug_assert!(self.is_empty(), "reopening a non-empty level");
        self.price = price;
        self.total_volume = 0;
        self.order_count = 0;
        self.head = NIL;
        self.tail = NIL;
    }

    /// Link an order at the tail of the queue.
    pub(crate) fn append(&mut self, arena: &mut OrderArena, key: OrderKey) {
        let shares = arena.get(key).remaining();

        if self.head == NIL {
            self.head = key;
            self.tail = key;
        } else {
            let tail = self.tail;
            arena.get_mut(tail).next = key;
            arena.get_mut(key).prev = tail;
            self.tail = key;
        }

        self.order_count += 1;
        self.total_volume += shares as Volume;
    }

    /// Splice an order out of the queue, subtracting its residual from the
    /// level volume. The caller destroys the order immediately after.
    pub(crate) fn unlink(&mut self, arena: &mut OrderArena, key: OrderKey) {
        let (prev, next, shares) = {
            let order = arena.get(key);
            (order.prev, order.next, order.remaining())
        };

        if prev == NIL {
            self.head = next;
        } else {
            arena.get_mut(prev).next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            arena.get_mut(next).prev = prev;
        }

        let order = arena.get_mut(key);
        order.prev = NIL;
        order.next = NIL;

        debug_assert!(self.order_count > 0);
        self.order_count -= 1;
        self.total_volume -= shares as Volume;
        debug_assert!((self.head == NIL) == (self.tail == NIL));
        debug_assert!((self.head == NIL) == (self.order_count == 0));
    }

    /// Adjust `total_volume` in place, used when an order's residual changes
    /// without relinking (partial fill of the head, size-modify).
    pub(crate) fn adjust_volume(&mut self, delta: i64) {
        self.total_volume = (self.total_volume as i64 + delta) as Volume;
    }

    /// Front of the FIFO: the next order to be matched.
    pub(crate) fn front(&self) -> Option<OrderKey> {
        if self.head == NIL {
            None
        } else {
            Some(self.head)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn total_volume(&self) -> Volume {
        self.total_volume
    }

    pub fn order_count(&self) -> u32 {
        self.order_count
    }

    /// Order keys in queue (time-priority) order.
    pub(crate) fn keys<'a>(&self, arena: &'a OrderArena) -> LevelKeys<'a> {
        LevelKeys {
            arena,
            next: self.head,
        }
    }
}

pub(crate) struct LevelKeys<'a> {
    arena: &'a OrderArena,
    next: OrderKey,
}

impl Iterator for LevelKeys<'_> {
    type Item = OrderKey;

    fn next(&mut self) -> Option<OrderKey> {
        if self.next == NIL {
            return None;
        }
        let key = self.next;
        self.next = self.arena.get(key).next;
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::arena::Order;
    use crate::orderbook::types::{OrderId, OrderType, Quantity, Side};

    fn insert_order(arena: &mut OrderArena, id: OrderId, shares: Quantity) -> OrderKey {
        arena.insert(Order::new(
            id,
            1,
            Side::Buy,
            OrderType::Limit,
            4700,
            shares,
            0,
            0,
        ))
    }

    fn ids(level: &PriceLevel, arena: &OrderArena) -> Vec<OrderId> {
        level.keys(arena).map(|k| arena.get(k).id).collect()
    }

    #[test]
    fn test_append_maintains_fifo() {
        let mut arena = OrderArena::new();
        let mut level = PriceLevel::vacant();
        level.open(4700);

        for id in 0..3 {
            let key = insert_order(&mut arena, id, 10);
            level.append(&mut arena, key);
        }

        assert_eq!(ids(&level, &arena), vec![0, 1, 2]);
        assert_eq!(level.order_count(), 3);
        assert_eq!(level.total_volume(), 30);
    }

    #[test]
    fn test_unlink_middle_order() {
        let mut arena = OrderArena::new();
        let mut level = PriceLevel::vacant();
        level.open(4700);

        let keys: Vec<_> = [(0, 10), (1, 20), (2, 30)]
            .iter()
            .map(|&(id, shares)| {
                let key = insert_order(&mut arena, id, shares);
                level.append(&mut arena, key);
                key
            })
            .collect();

        level.unlink(&mut arena, keys[1]);
        arena.remove(keys[1]);

        assert_eq!(ids(&level, &arena), vec![0, 2]);
        assert_eq!(level.order_count(), 2);
        assert_eq!(level.total_volume(), 40);
    }

    #[test]
    fn test_unlink_head_and_tail() {
        let mut arena = OrderArena::new();
        let mut level = PriceLevel::vacant();
        level.open(4700);

        let a = insert_order(&mut arena, 0, 10);
        let b = insert_order(&mut arena, 1, 20);
        let c = insert_order(&mut arena, 2, 30);
        level.append(&mut arena, a);
        level.append(&mut arena, b);
        level.append(&mut arena, c);

        level.unlink(&mut arena, a);
        assert_eq!(level.front(), Some(b));

        level.unlink(&mut arena, c);
        assert_eq!(ids(&level, &arena), vec![1]);
        assert_eq!(level.total_volume(), 20);
    }

    #[test]
    fn test_unlink_last_order_empties_level() {
        let mut arena = OrderArena::new();
        let mut level = PriceLevel::vacant();
        level.open(4700);

        let key = insert_order(&mut arena, 0, 10);
        level.append(&mut arena, key);
        level.unlink(&mut arena, key);

        assert!(level.is_empty());
        assert_eq!(level.front(), None);
        assert_eq!(level.total_volume(), 0);
    }

    #[test]
    fn test_adjust_volume() {
        let mut arena = OrderArena::new();
        let mut level = PriceLevel::vacant();
        level.open(4500);

        let key = insert_order(&mut arena, 0, 10);
        level.append(&mut arena, key);

        level.adjust_volume(10);
        assert_eq!(level.total_volume(), 20);
        level.adjust_volume(-15);
        assert_eq!(level.total_volume(), 5);
    }
}
