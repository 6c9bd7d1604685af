use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use slab::Slab;

use crate::error::BookError;
use crate::order::Order;
use crate::types::Price;

/// Arena slot holding one resting order and its neighbours in the level queue.
#[derive(Debug, Clone)]
pub(crate) struct OrderNode {
    pub(crate) order: Order,
    prev: Option<usize>,
    next: Option<usize>,
}

impl OrderNode {
    pub(crate) fn new(order: Order) -> Self {
        Self {
            order,
            prev: None,
            next: None,
        }
    }
}

/// FIFO queue of arena slots resting at one price, with cached aggregates.
#[derive(Debug, Clone, Default)]
pub(crate) struct PriceLevel {
    head: Option<usize>,
    tail: Option<usize>,
    total_qty: u64,
    order_count: usize,
}

impl PriceLevel {
    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn total_qty(&self) -> u64 {
        self.total_qty
    }

    pub(crate) fn order_count(&self) -> usize {
        self.order_count
    }

    /// Whether `qty` more would still fit in the cached aggregate.
    pub(crate) fn can_absorb(&self, qty: u64) -> bool {
        self.total_qty.checked_add(qty).is_some()
    }

    pub(crate) fn push_back(&mut self, orders: &mut Slab<OrderNode>, key: usize) -> Result<(), BookError> {
        let remaining = orders[key].order.remaining_quantity.value();
        let total = self.total_qty.checked_add(remaining).ok_or_else(|| {
            BookError::InvariantViolation(format!(
                "level aggregate {} cannot absorb {remaining}",
                self.total_qty
            ))
        })?;
        orders[key].prev = self.tail;
        orders[key].next = None;
        match self.tail {
            Some(tail) => orders[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.total_qty = total;
        self.order_count += 1;
        Ok(())
    }

    /// Removes `key` from both the queue and the arena, keeping the order of its neighbours.
    pub(crate) fn unlink(&mut self, orders: &mut Slab<OrderNode>, key: usize) -> Result<OrderNode, BookError> {
        let remaining = orders[key].order.remaining_quantity.value();
        let total = self.shrink(remaining)?;
        let node = orders.remove(key);
        match node.prev {
            Some(prev) => orders[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => orders[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        self.total_qty = total;
        self.order_count -= 1;
        Ok(node)
    }

    /// Accounts for a partial fill of an order that stays queued.
    pub(crate) fn reduce(&mut self, qty: u64) -> Result<(), BookError> {
        self.total_qty = self.shrink(qty)?;
        Ok(())
    }

    fn shrink(&self, qty: u64) -> Result<u64, BookError> {
        self.total_qty.checked_sub(qty).ok_or_else(|| {
            BookError::InvariantViolation(format!(
                "level aggregate {} is below {qty} being removed",
                self.total_qty
            ))
        })
    }

    pub(crate) fn iter<'a>(&self, orders: &'a Slab<OrderNode>) -> LevelIter<'a> {
        LevelIter {
            orders,
            cursor: self.head,
        }
    }
}

/// Walks a level head to tail, yielding `(slot, order)`.
pub(crate) struct LevelIter<'a> {
    orders: &'a Slab<OrderNode>,
    cursor: Option<usize>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (usize, &'a Order);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let node = self.orders.get(key)?;
        self.cursor = node.next;
        Some((key, &node.order))
    }
}

/// Map key that fixes the iteration direction of one side of the book.
/// Iterating a `SideBook` front to back always yields the best price first.
pub(crate) trait LevelKey: Ord + Copy + fmt::Debug {
    fn from_price(price: Price) -> Self;
    fn price(self) -> Price;
}

impl LevelKey for Price {
    fn from_price(price: Price) -> Self {
        price
    }

    fn price(self) -> Price {
        self
    }
}

impl LevelKey for Reverse<Price> {
    fn from_price(price: Price) -> Self {
        Reverse(price)
    }

    fn price(self) -> Price {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SideBook<K: LevelKey> {
    levels: BTreeMap<K, PriceLevel>,
}

/// Highest price first.
pub(crate) type Bids = SideBook<Reverse<Price>>;
/// Lowest price first.
pub(crate) type Asks = SideBook<Price>;

impl<K: LevelKey> Default for SideBook<K> {
    fn default() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }
}

impl<K: LevelKey> SideBook<K> {
    pub(crate) fn best_price(&self) -> Option<Price> {
        self.levels.first_key_value().map(|(key, _)| key.price())
    }

    pub(crate) fn best(&self) -> Option<(Price, &PriceLevel)> {
        self.levels
            .first_key_value()
            .map(|(key, level)| (key.price(), level))
    }

    pub(crate) fn best_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels
            .iter_mut()
            .next()
            .map(|(key, level)| (key.price(), level))
    }

    pub(crate) fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&K::from_price(price))
    }

    pub(crate) fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&K::from_price(price))
    }

    pub(crate) fn level_or_insert(&mut self, price: Price) -> &mut PriceLevel {
        self.levels.entry(K::from_price(price)).or_default()
    }

    pub(crate) fn remove_if_empty(&mut self, price: Price) {
        let key = K::from_price(price);
        if self.levels.get(&key).is_some_and(PriceLevel::is_empty) {
            self.levels.remove(&key);
        }
    }

    /// Levels best-first.
    pub(crate) fn levels(&self) -> impl Iterator<Item = (Price, &PriceLevel)> + '_ {
        self.levels.iter().map(|(key, level)| (key.price(), level))
    }

    pub(crate) fn len(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
