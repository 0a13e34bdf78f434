//! The instrument registry: routes client-facing operations to the order
//! book of the addressed symbol.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::ids::IdAllocator;
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{Execution, OrderId, OrderIntent, Price};
use crate::orderbook::Book;

/// A multi-instrument exchange: one order book per registered symbol plus
/// the shared monotonic id allocator.
///
/// All mutating operations take `&mut self`; the engine contract (one
/// mutation at a time per book) is met trivially by running the exchange on
/// a single dispatcher. Deployments that shard books across threads keep the
/// same contract per book; the id allocator stays atomic either way.
#[derive(Debug)]
pub struct Exchange {
    name: String,
    books: HashMap<String, Book>,
    ids: Arc<IdAllocator>,
}

impl Exchange {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!(exchange = %name, "creating exchange");
        Self {
            name,
            books: HashMap::new(),
            ids: Arc::new(IdAllocator::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new instrument. Returns `false` (and leaves the existing
    /// book untouched) if the symbol is already listed.
    pub fn add_instrument(&mut self, symbol: impl Into<String>) -> bool {
        let symbol = symbol.into();
        if self.books.contains_key(&symbol) {
            warn!(%symbol, "instrument already listed");
            return false;
        }
        let book = Book::new(symbol.clone(), Arc::clone(&self.ids));
        self.books.insert(symbol, book);
        true
    }

    /// Delist an instrument, destroying its book and all resting orders.
    /// Outstanding execution-queue entries are drained and returned so
    /// nothing is silently discarded.
    pub fn remove_instrument(&mut self, symbol: &str) -> OrderBookResult<Vec<Execution>> {
        let mut book = self
            .books
            .remove(symbol)
            .ok_or(OrderBookError::UnknownSymbol)?;
        let outstanding = book.drain_executions();
        info!(%symbol, outstanding = outstanding.len(), "instrument removed");
        Ok(outstanding)
    }

    pub fn list_instruments(&self) -> Vec<String> {
        self.books.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// The book for a symbol, `None` if the symbol is not listed.
    pub fn get_book(&self, symbol: &str) -> Option<&Book> {
        self.books.get(symbol)
    }

    pub fn get_book_mut(&mut self, symbol: &str) -> Option<&mut Book> {
        self.books.get_mut(symbol)
    }

    fn book_mut(&mut self, symbol: &str) -> OrderBookResult<&mut Book> {
        self.books
            .get_mut(symbol)
            .ok_or(OrderBookError::UnknownSymbol)
    }

    /// Submit an order to the addressed book. Returns the allocated id.
    pub fn add_order(&mut self, symbol: &str, intent: &OrderIntent) -> OrderBookResult<OrderId> {
        self.book_mut(symbol)?.submit(intent)
    }

    pub fn cancel_order(&mut self, symbol: &str, order_id: OrderId) -> OrderBookResult<()> {
        self.book_mut(symbol)?.cancel(order_id)
    }

    /// Reprice a resting order; returns the replacement order's id (price
    /// changes relinquish queue position).
    pub fn modify_price(
        &mut self,
        symbol: &str,
        order_id: OrderId,
        new_limit: Decimal,
    ) -> OrderBookResult<OrderId> {
        self.book_mut(symbol)?.modify_price(order_id, new_limit)
    }

    pub fn modify_size(
        &mut self,
        symbol: &str,
        order_id: OrderId,
        new_size: i64,
    ) -> OrderBookResult<()> {
        self.book_mut(symbol)?.modify_size(order_id, new_size)
    }

    /// Best bid and best ask for a symbol, in internal units.
    pub fn nbbo(&self, symbol: &str) -> OrderBookResult<(Option<Price>, Option<Price>)> {
        self.books
            .get(symbol)
            .map(Book::nbbo)
            .ok_or(OrderBookError::UnknownSymbol)
    }

    /// Pop the oldest undelivered execution of a symbol's book.
    pub fn pop_next_execution(&mut self, symbol: &str) -> OrderBookResult<Option<Execution>> {
        Ok(self.book_mut(symbol)?.pop_next_execution())
    }
}
