use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::ids::IdAllocator;
use crate::orderbook::arena::{Order, OrderArena, OrderKey};
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::matching::{self, MatchContext, Taker, TradeTally};
use crate::orderbook::side::BookSide;
use crate::orderbook::types::{
    BookSnapshot, Execution, OrderId, OrderIntent, OrderType, Price, Quantity, Side, Volume,
};

/// The order book for one instrument.
///
/// Owns both sides, the arena of resting orders, the by-id index used for
/// O(1) cancel/modify, and the outbound execution queue. All mutating
/// operations take `&mut self`: the engine contract is that operations for a
/// given symbol execute sequentially, with no suspension mid-match.
#[derive(Debug)]
pub struct Book {
    pub(crate) symbol: String,
    pub(crate) bids: BookSide,
    pub(crate) asks: BookSide,
    pub(crate) arena: OrderArena,
    /// order id -> arena slot, for every currently resting order.
    pub(crate) orders: HashMap<OrderId, OrderKey>,
    pub(crate) executions: VecDeque<Execution>,
    pub(crate) ids: Arc<IdAllocator>,
    pub(crate) tally: TradeTally,
}

impl Book {
    pub fn new(symbol: impl Into<String>, ids: Arc<IdAllocator>) -> Self {
        let symbol = symbol.into();
        info!(%symbol, "creating order book");
        Self {
            symbol,
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            arena: OrderArena::new(),
            orders: HashMap::new(),
            executions: VecDeque::new(),
            ids,
            tally: TradeTally::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Submit an order intent. Returns the allocated order id.
    ///
    /// Limit orders cross the spread while they can, then rest any
    /// remainder. Market orders sweep the opposing side and must be fully
    /// coverable by its resting volume. Validation happens before any state
    /// is written; a rejected submit leaves the book untouched and emits
    /// nothing.
    pub fn submit(&mut self, intent: &OrderIntent) -> OrderBookResult<OrderId> {
        let (shares, price) = intent.validate()?;
        debug!(
            symbol = %self.symbol,
            side = %intent.side,
            ?price,
            shares,
            order_type = ?intent.order_type,
            "submit"
        );

        match intent.order_type {
            OrderType::Limit => Ok(self.submit_limit(intent, shares, price)),
            OrderType::Market => self.submit_market(intent, shares),
        }
    }

    fn submit_limit(&mut self, intent: &OrderIntent, shares: Quantity, price: Price) -> OrderId {
        let id = self.ids.next_order_id();
        let mut taker = Taker::new(id, intent.client_id, intent.side, shares);

        {
            let opposing = match intent.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            let mut ctx = MatchContext {
                arena: &mut self.arena,
                index: &mut self.orders,
                ids: self.ids.as_ref(),
                symbol: &self.symbol,
                executions: &mut self.executions,
                tally: &mut self.tally,
            };
            matching::cross_spread(opposing, &mut ctx, &mut taker, price);
        }

        if taker.remaining > 0 {
            let order = Order::new(
                id,
                intent.client_id,
                intent.side,
                OrderType::Limit,
                price,
                taker.remaining,
                taker.filled,
                taker.notional,
            );
            let key = self.arena.insert(order);
            let own = match intent.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            own.add_resting(&mut self.arena, key);
            self.orders.insert(id, key);
            debug!(order_id = id, price, remaining = taker.remaining, "order resting");
        }

        id
    }

    fn submit_market(&mut self, intent: &OrderIntent, shares: Quantity) -> OrderBookResult<OrderId> {
        let opposing_volume = match intent.side {
            Side::Buy => self.asks.side_volume(),
            Side::Sell => self.bids.side_volume(),
        };
        if shares as Volume > opposing_volume {
            return Err(OrderBookError::InsufficientLiquidity);
        }

        let id = self.ids.next_order_id();
        let mut taker = Taker::new(id, intent.client_id, intent.side, shares);

        let opposing = match intent.side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        };
        let mut ctx = MatchContext {
            arena: &mut self.arena,
            index: &mut self.orders,
            ids: self.ids.as_ref(),
            symbol: &self.symbol,
            executions: &mut self.executions,
            tally: &mut self.tally,
        };
        matching::sweep(opposing, &mut ctx, &mut taker);

        Ok(id)
    }

    /// Pop the oldest undelivered execution, if any. Executions are
    /// delivered strictly in the order fills occurred.
    pub fn pop_next_execution(&mut self) -> Option<Execution> {
        self.executions.pop_front()
    }

    /// Drain every undelivered execution, oldest first.
    pub fn drain_executions(&mut self) -> Vec<Execution> {
        self.executions.drain(..).collect()
    }

    pub fn pending_executions(&self) -> usize {
        self.executions.len()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Best bid and best ask, `None` on a side with no resting volume.
    pub fn nbbo(&self) -> (Option<Price>, Option<Price>) {
        (self.best_bid(), self.best_ask())
    }

    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn buy_side(&self) -> &BookSide {
        &self.bids
    }

    pub fn sell_side(&self) -> &BookSide {
        &self.asks
    }

    /// Number of orders currently resting in the book.
    pub fn total_orders(&self) -> usize {
        self.orders.len()
    }

    /// A resting order by id. Orders disappear from here once fully filled
    /// or canceled; their history lives on in the execution stream.
    pub fn resting_order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id).map(|&key| self.arena.get(key))
    }

    /// Depth snapshot, best levels first, at most `depth` levels per side.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            symbol: self.symbol.clone(),
            timestamp: Utc::now(),
            bids: self.bids.depth(depth),
            asks: self.asks.depth(depth),
        }
    }

    pub fn stats(&self) -> BookStats {
        BookStats {
            symbol: self.symbol.clone(),
            resting_orders: self.total_orders(),
            bid_levels: self.bids.level_count(),
            ask_levels: self.asks.level_count(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
            bid_volume: self.bids.side_volume(),
            ask_volume: self.asks.side_volume(),
            total_executions: self.tally.executions,
            total_traded_volume: self.tally.traded_volume,
        }
    }

    /// Walk the whole book and assert every structural invariant. Test-only;
    /// production code treats a breach as fatal at the point it is detected.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let mut linked = std::collections::HashSet::new();

        for side in [&self.bids, &self.asks] {
            let levels = side.depth(usize::MAX);
            let mut level_sum: Volume = 0;

            if let Some(first) = levels.first() {
                assert_eq!(side.best_price(), Some(first.price), "best is extremum");
            } else {
                assert_eq!(side.best_price(), None);
            }

            for info in &levels {
                let level = side.find(info.price).expect("depth level present");
                assert!(level.order_count() > 0, "present level must be non-empty");

                let mut volume: Volume = 0;
                let mut count = 0u32;
                let mut last_id = None;
                for key in level.keys(&self.arena) {
                    let order = self.arena.get(key);
                    assert_eq!(order.price, info.price);
                    assert!(order.remaining() > 0);
                    if let Some(prev) = last_id {
                        assert!(order.id > prev, "FIFO ids ascend within a level");
                    }
                    last_id = Some(order.id);
                    volume += order.remaining() as Volume;
                    count += 1;
                    linked.insert(order.id);
                }
                assert_eq!(level.total_volume(), volume, "level volume = sum of residuals");
                assert_eq!(level.order_count(), count, "level count = list length");
                level_sum += level.total_volume();
            }
            assert_eq!(side.side_volume(), level_sum, "side volume = sum of levels");
        }

        assert_eq!(self.orders.len(), linked.len(), "index covers linked orders");
        assert_eq!(self.orders.len(), self.arena.len(), "arena holds only resting orders");
        for (&id, &key) in &self.orders {
            assert_eq!(self.arena.get(key).id, id, "index entry points at its order");
            assert!(linked.contains(&id), "indexed order is linked in a level");
        }
    }
}

/// Aggregate statistics of one book.
#[derive(Debug, Clone)]
pub struct BookStats {
    pub symbol: String,
    pub resting_orders: usize,
    pub bid_levels: u32,
    pub ask_levels: u32,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
    pub bid_volume: Volume,
    pub ask_volume: Volume,
    pub total_executions: u64,
    pub total_traded_volume: u64,
}
