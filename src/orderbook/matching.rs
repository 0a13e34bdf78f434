//! Price-time priority fill loops shared by market sweeps and limit-order
//! spread crossing.
//!
//! Matching always consumes the opposing side's best level first and, within
//! a level, its FIFO from the head. The fill price is always the maker's
//! resting price. One execution is emitted per maker order consumed.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tracing::debug;

use crate::ids::IdAllocator;
use crate::orderbook::arena::{OrderArena, OrderKey};
use crate::orderbook::side::BookSide;
use crate::orderbook::types::{
    ClientId, ExecType, Execution, OrderId, Price, Quantity, Side,
};

/// Running state of the aggressing order for the duration of one submit.
///
/// A taker that rests after crossing carries these counters into its resting
/// order, so later maker-side executions continue the same cumulative
/// sequence. The original market quantity is kept only here; once the submit
/// returns, taker state is observable solely through the emitted executions.
#[derive(Debug)]
pub(crate) struct Taker {
    pub id: OrderId,
    pub client_id: ClientId,
    pub side: Side,
    pub remaining: Quantity,
    pub filled: Quantity,
    pub notional: u64,
}

impl Taker {
    pub(crate) fn new(id: OrderId, client_id: ClientId, side: Side, shares: Quantity) -> Self {
        Self {
            id,
            client_id,
            side,
            remaining: shares,
            filled: 0,
            notional: 0,
        }
    }

    fn add_fill(&mut self, size: Quantity, price: Price) {
        self.remaining -= size;
        self.filled += size;
        self.notional += price as u64 * size as u64;
    }

    fn avg_price(&self) -> f64 {
        if self.filled == 0 {
            0.0
        } else {
            self.notional as f64 / self.filled as f64
        }
    }
}

/// Mutable book state the fill loop threads through, split out of `Book` so
/// the opposing side can be borrowed alongside it.
pub(crate) struct MatchContext<'a> {
    pub arena: &'a mut OrderArena,
    pub index: &'a mut HashMap<OrderId, OrderKey>,
    pub ids: &'a IdAllocator,
    pub symbol: &'a str,
    pub executions: &'a mut VecDeque<Execution>,
    pub tally: &'a mut TradeTally,
}

/// Lifetime trade counters kept on the book for stats reporting.
#[derive(Debug, Default)]
pub(crate) struct TradeTally {
    pub executions: u64,
    pub traded_volume: u64,
}

/// Does a limit taker at `limit` cross the best opposing price? Equal prices
/// cross.
pub(crate) fn crosses(taker_side: Side, limit: Price, best_opposing: Price) -> bool {
    match taker_side {
        Side::Buy => limit >= best_opposing,
        Side::Sell => limit <= best_opposing,
    }
}

/// Market-order sweep: consume best opposing levels until the taker is
/// filled. The caller has already checked the liquidity precondition, so an
/// exhausted opposing side here is an internal inconsistency.
pub(crate) fn sweep(opposing: &mut BookSide, ctx: &mut MatchContext<'_>, taker: &mut Taker) {
    while taker.remaining > 0 {
        assert!(
            opposing.best_price().is_some(),
            "market sweep drained the opposing side below the checked volume"
        );
        fill_best_level(opposing, ctx, taker);
    }
}

/// Limit-order crossing phase: match against the best opposing level while
/// the limit still crosses it and shares remain.
pub(crate) fn cross_spread(
    opposing: &mut BookSide,
    ctx: &mut MatchContext<'_>,
    taker: &mut Taker,
    limit: Price,
) {
    while taker.remaining > 0 {
        match opposing.best_price() {
            Some(best) if crosses(taker.side, limit, best) => {
                fill_best_level(opposing, ctx, taker);
            }
            _ => break,
        }
    }
}

/// Consume head orders at the current best opposing level, emitting one
/// execution per maker, until the taker is satisfied or the level drains.
/// A drained level is removed and the cached best recomputed.
fn fill_best_level(opposing: &mut BookSide, ctx: &mut MatchContext<'_>, taker: &mut Taker) {
    let level_price = opposing
        .best_price()
        .expect("fill loop entered with an empty opposing side");

    while taker.remaining > 0 {
        let Some(head_key) = opposing.level_mut(level_price).front() else {
            break;
        };

        let (fill, maker_id, maker_client_id, maker_side, maker_filled, maker_leaves, maker_avg) = {
            let maker = ctx.arena.get_mut(head_key);
            let fill = taker.remaining.min(maker.remaining());
            maker.add_fill(fill, level_price);
            (
                fill,
                maker.id,
                maker.client_id,
                maker.side,
                maker.filled(),
                maker.remaining(),
                maker.avg_price(),
            )
        };
        taker.add_fill(fill, level_price);

        opposing.level_mut(level_price).adjust_volume(-(fill as i64));
        opposing.adjust_total(-(fill as i64));

        let maker_exec_type = if maker_leaves == 0 {
            ExecType::FullFill
        } else {
            ExecType::PartialFill
        };
        let taker_exec_type = if taker.remaining == 0 {
            ExecType::FullFill
        } else {
            ExecType::PartialFill
        };

        let execution = Execution {
            execution_id: ctx.ids.next_execution_id(),
            symbol: ctx.symbol.to_string(),
            maker_order_id: maker_id,
            taker_order_id: taker.id,
            maker_client_id,
            taker_client_id: taker.client_id,
            price: level_price,
            size: fill,
            maker_side,
            taker_side: taker.side,
            maker_exec_type,
            taker_exec_type,
            maker_cumulative_filled: maker_filled,
            taker_cumulative_filled: taker.filled,
            maker_leaves,
            taker_leaves: taker.remaining,
            maker_avg_price: maker_avg,
            taker_avg_price: taker.avg_price(),
            timestamp: Utc::now(),
        };
        debug!(
            execution_id = execution.execution_id,
            maker = maker_id,
            taker = taker.id,
            price = level_price,
            size = fill,
            "execution"
        );
        ctx.executions.push_back(execution);
        ctx.tally.executions += 1;
        ctx.tally.traded_volume += fill as u64;

        if maker_leaves == 0 {
            // residual is zero, so the unlink adjusts no volume
            opposing.level_mut(level_price).unlink(ctx.arena, head_key);
            ctx.index.remove(&maker_id);
            ctx.arena.remove(head_key);
        } else {
            // taker exhausted against a larger maker
            break;
        }
    }

    if opposing.level_mut(level_price).is_empty() {
        opposing.remove_level(level_price);
    }
}
