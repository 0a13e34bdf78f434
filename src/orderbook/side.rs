use tracing::trace;

use crate::orderbook::arena::{OrderArena, OrderKey};
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{Price, PriceLevelInfo, Side, Volume, MAX_PRICE};

const WORD_BITS: usize = 64;
const LEVEL_SLOTS: usize = MAX_PRICE as usize + 1;
const WORDS: usize = (LEVEL_SLOTS + WORD_BITS - 1) / WORD_BITS;

/// One side (bid or ask) of an order book.
///
/// Price levels live in a dense array indexed by price in cents over
/// `[0, MAX_PRICE]`; a bitmap of 64-bit words marks which slots hold a live
/// level. The cached best price is updated in O(1) on insert and by a
/// hardware bit-scan over the bitmap when the best level empties.
///
/// The empty-sentinel for the cached best is `-1` on the buy side and
/// `MAX_PRICE + 1` on the sell side, so any admissible price compares
/// strictly better than "empty".
#[derive(Debug)]
pub struct BookSide {
    side: Side,
    levels: Box<[PriceLevel]>,
    occupied: Box<[u64]>,
    side_volume: Volume,
    level_count: u32,
    best: Price,
}

impl BookSide {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            levels: vec![PriceLevel::vacant(); LEVEL_SLOTS].into_boxed_slice(),
            occupied: vec![0u64; WORDS].into_boxed_slice(),
            side_volume: 0,
            level_count: 0,
            best: Self::empty_sentinel(side),
        }
    }

    fn empty_sentinel(side: Side) -> Price {
        match side {
            Side::Buy => -1,
            Side::Sell => MAX_PRICE + 1,
        }
    }

    /// `a` is strictly better than `b` for this side.
    fn better(&self, a: Price, b: Price) -> bool {
        match self.side {
            Side::Buy => a > b,
            Side::Sell => a < b,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.best == Self::empty_sentinel(self.side)
    }

    /// Best (highest bid / lowest ask) price, `None` when the side is empty.
    pub fn best_price(&self) -> Option<Price> {
        if self.is_empty() {
            None
        } else {
            Some(self.best)
        }
    }

    pub fn best_level(&self) -> Option<&PriceLevel> {
        self.best_price().map(|p| &self.levels[p as usize])
    }

    /// Level at an exact price, `None` if no order rests there.
    pub fn find(&self, price: Price) -> Option<&PriceLevel> {
        if price >= 0 && price <= MAX_PRICE && self.test_bit(price) {
            Some(&self.levels[price as usize])
        } else {
            None
        }
    }

    /// Total resting shares on this side.
    pub fn side_volume(&self) -> Volume {
        self.side_volume
    }

    /// Number of live price levels.
    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    /// Rest an order on this side: locate or create its level, link it at
    /// the tail, and lift the cached best if the price improves on it.
    pub(crate) fn add_resting(&mut self, arena: &mut OrderArena, key: OrderKey) {
        let (price, shares) = {
            let order = arena.get(key);
            (order.price, order.remaining())
        };
        debug_assert!((0..=MAX_PRICE).contains(&price), "price out of range");

        if !self.test_bit(price) {
            self.occupy(price);
        }
        self.levels[price as usize].append(arena, key);
        self.side_volume += shares as Volume;
    }

    /// Unlink a resting order (cancel path), dropping its level if it was
    /// the only occupant.
    pub(crate) fn remove_order(&mut self, arena: &mut OrderArena, key: OrderKey) {
        let (price, shares) = {
            let order = arena.get(key);
            (order.price, order.remaining())
        };

        let level = &mut self.levels[price as usize];
        level.unlink(arena, key);
        self.side_volume -= shares as Volume;

        if self.levels[price as usize].is_empty() {
            self.remove_level(price);
        }
    }

    /// Adjust the side aggregate in place (size-modify, partial fills).
    pub(crate) fn adjust_total(&mut self, delta: i64) {
        self.side_volume = (self.side_volume as i64 + delta) as Volume;
    }

    pub(crate) fn level_mut(&mut self, price: Price) -> &mut PriceLevel {
        debug_assert!(self.test_bit(price), "level not present");
        &mut self.levels[price as usize]
    }

    /// Remove an emptied level and recompute the cached best if it was the
    /// best. Calling this on a non-empty level is an invariant breach.
    pub(crate) fn remove_level(&mut self, price: Price) {
        assert!(
            self.levels[price as usize].is_empty(),
            "removing a non-empty level"
        );
        self.clear_bit(price);
        self.level_count -= 1;

        if price == self.best {
            self.best = match self.side {
                Side::Buy => self.scan_down(price).unwrap_or(-1),
                Side::Sell => self.scan_up(price).unwrap_or(MAX_PRICE + 1),
            };
            trace!(side = %self.side, best = self.best, "best level recomputed");
        }
    }

    /// Best-first depth view, at most `depth` levels.
    pub fn depth(&self, depth: usize) -> Vec<PriceLevelInfo> {
        let mut out = Vec::with_capacity(depth.min(self.level_count as usize));
        let mut cursor = self.best_price();

        while let Some(price) = cursor {
            if out.len() == depth {
                break;
            }
            let level = &self.levels[price as usize];
            out.push(PriceLevelInfo {
                price,
                volume: level.total_volume(),
                order_count: level.order_count(),
            });
            cursor = match self.side {
                Side::Buy => {
                    if price == 0 {
                        None
                    } else {
                        self.scan_down(price - 1)
                    }
                }
                Side::Sell => {
                    if price == MAX_PRICE {
                        None
                    } else {
                        self.scan_up(price + 1)
                    }
                }
            };
        }
        out
    }

    // bitmap plumbing

    fn test_bit(&self, price: Price) -> bool {
        let p = price as usize;
        self.occupied[p / WORD_BITS] & (1u64 << (p % WORD_BITS)) != 0
    }

    fn occupy(&mut self, price: Price) {
        let p = price as usize;
        self.occupied[p / WORD_BITS] |= 1u64 << (p % WORD_BITS);
        self.levels[p].open(price);
        self.level_count += 1;
        if self.better(price, self.best) {
            self.best = price;
        }
    }

    fn clear_bit(&mut self, price: Price) {
        let p = price as usize;
        self.occupied[p / WORD_BITS] &= !(1u64 << (p % WORD_BITS));
    }

    /// Highest occupied price `<= from`.
    fn scan_down(&self, from: Price) -> Option<Price> {
        if from < 0 {
            return None;
        }
        let mut word_idx = from as usize / WORD_BITS;
        let bit = from as usize % WORD_BITS;
        let mask = if bit == WORD_BITS - 1 {
            u64::MAX
        } else {
            (1u64 << (bit + 1)) - 1
        };
        let mut word = self.occupied[word_idx] & mask;
        loop {
            if word != 0 {
                let high = WORD_BITS - 1 - word.leading_zeros() as usize;
                return Some((word_idx * WORD_BITS + high) as Price);
            }
            if word_idx == 0 {
                return None;
            }
            word_idx -= 1;
            word = self.occupied[word_idx];
        }
    }

    /// Lowest occupied price `>= from`.
    fn scan_up(&self, from: Price) -> Option<Price> {
        if from > MAX_PRICE {
            return None;
        }
        let mut word_idx = from as usize / WORD_BITS;
        let bit = from as usize % WORD_BITS;
        let mut word = self.occupied[word_idx] & (u64::MAX << bit);
        loop {
            if word != 0 {
                let low = word.trailing_zeros() as usize;
                return Some((word_idx * WORD_BITS + low) as Price);
            }
            word_idx += 1;
            if word_idx == WORDS {
                return None;
            }
            word = self.occupied[word_idx];
        }
    }
}
