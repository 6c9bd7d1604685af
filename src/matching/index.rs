use std::collections::HashMap;

use crate::types::{OrderId, Price, Side};

/// Where a resting order lives: its side, its level, and its arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub side: Side,
    pub price: Price,
    pub(crate) slot: usize,
}

/// Id lookup for every resting order. Kept in lockstep with the side books.
#[derive(Debug, Clone, Default)]
pub struct OrderIndex {
    entries: HashMap<OrderId, IndexEntry>,
}

impl OrderIndex {
    pub fn get(&self, order_id: &OrderId) -> Option<&IndexEntry> {
        self.entries.get(order_id)
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.entries.contains_key(order_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderId, &IndexEntry)> {
        self.entries.iter()
    }

    pub(crate) fn insert(&mut self, order_id: OrderId, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(order_id, entry)
    }

    pub(crate) fn remove(&mut self, order_id: &OrderId) -> Option<IndexEntry> {
        self.entries.remove(order_id)
    }
}
