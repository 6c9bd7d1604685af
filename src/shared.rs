use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{BookError, SnapshotError};
use crate::matching::{LimitOrderBook, MarketDepth};
use crate::order::{Order, Trade};
use crate::persistence::snapshot::encode_state;
use crate::types::{OrderId, Price};

/// A book behind a reader-writer lock, for callers that share it across threads
/// without an actor. Each call takes the lock once.
#[derive(Debug, Clone)]
pub struct SharedBook {
    inner: Arc<RwLock<LimitOrderBook>>,
}

impl SharedBook {
    pub fn new(book: LimitOrderBook) -> Self {
        Self {
            inner: Arc::new(RwLock::new(book)),
        }
    }

    pub fn add_order(&self, order: Order) -> Result<Vec<Trade>, BookError> {
        self.inner.write().add_order(order)
    }

    pub fn cancel_order(&self, order_id: OrderId) -> Result<Order, BookError> {
        self.inner.write().cancel_order(order_id)
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.inner.read().get_order(order_id).cloned()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.inner.read().best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.inner.read().best_ask()
    }

    pub fn market_depth(&self, levels: usize) -> MarketDepth {
        self.inner.read().market_depth(levels)
    }

    /// Holds the read lock only while copying; encoding happens after release.
    pub fn snapshot(&self) -> Result<Bytes, SnapshotError> {
        let state = self.inner.read().capture();
        encode_state(state)
    }

    pub fn check_invariants(&self) -> Result<(), BookError> {
        self.inner.read().check_invariants()
    }

    /// Runs `f` under the read lock, for several queries against one consistent state.
    pub fn read<R>(&self, f: impl FnOnce(&LimitOrderBook) -> R) -> R {
        f(&self.inner.read())
    }

    /// Returns the book if this is the last reference.
    pub fn into_inner(self) -> Result<LimitOrderBook, SharedBook> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| SharedBook { inner })
    }
}
