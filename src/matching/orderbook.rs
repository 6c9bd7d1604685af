use std::collections::VecDeque;

use rust_decimal::Decimal;
use slab::Slab;
use tracing::{debug, trace};

use crate::error::{BookError, SnapshotError};
use crate::matching::index::{IndexEntry, OrderIndex};
use crate::matching::level::{Asks, Bids, LevelKey, OrderNode, SideBook};
use crate::matching::{DepthLevel, MarketDepth};
use crate::order::{Order, Trade};
use crate::persistence::snapshot::{BookState, IndexRecord, LevelState};
use crate::types::{OrderId, Price, Quantity, Side, Symbol, TickSize};

/// Trades kept by [`LimitOrderBook::recent_trades`]; older ones are dropped.
pub const RECENT_TRADES_CAPACITY: usize = 1000;

/// Price-time priority book for a single symbol.
///
/// Orders live in one slab arena. Each price level is an intrusive FIFO list of
/// slots and the index maps an order id to its slot, so nothing points back at a
/// level. Mutation takes `&mut self`; the book does no locking of its own.
#[derive(Debug, Clone)]
pub struct LimitOrderBook {
    symbol: Symbol,
    tick_size: TickSize,
    bids: Bids,
    asks: Asks,
    orders: Slab<OrderNode>,
    index: OrderIndex,
    next_sequence: u64,
    next_trade_sequence: u64,
    recent_trades: VecDeque<Trade>,
}

impl LimitOrderBook {
    pub fn new(symbol: Symbol, tick_size: TickSize) -> Self {
        Self {
            symbol,
            tick_size,
            bids: Bids::default(),
            asks: Asks::default(),
            orders: Slab::new(),
            index: OrderIndex::default(),
            next_sequence: 1,
            next_trade_sequence: 1,
            recent_trades: VecDeque::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn tick_size(&self) -> TickSize {
        self.tick_size
    }

    /// Matches `order` against the opposite side, then rests whatever is left.
    ///
    /// Trades come back in execution order, each priced at the resting order's
    /// price. A rejected order leaves the book untouched.
    pub fn add_order(&mut self, mut order: Order) -> Result<Vec<Trade>, BookError> {
        Price::new(order.price.value(), self.tick_size)?;
        if order.remaining_quantity.is_zero() || order.remaining_quantity != order.original_quantity {
            return Err(BookError::InvalidQuantity {
                value: order.remaining_quantity.value(),
                reason: "new orders must be positive and unfilled",
            });
        }
        if self.index.contains(&order.id) {
            return Err(BookError::DuplicateOrderId(order.id));
        }
        // Matching never touches the order's own side, so this bound holds for any remainder.
        let fits = match order.side {
            Side::Buy => level_can_absorb(&self.bids, order.price, order.original_quantity),
            Side::Sell => level_can_absorb(&self.asks, order.price, order.original_quantity),
        };
        if !fits {
            return Err(BookError::InvalidQuantity {
                value: order.original_quantity.value(),
                reason: "resting it would overflow the aggregate quantity at its price",
            });
        }

        order.sequence = self.next_sequence;
        self.next_sequence += 1;

        let trades = match order.side {
            Side::Buy => sweep(
                &mut self.asks,
                &mut self.orders,
                &mut self.index,
                &mut order,
                &mut self.next_trade_sequence,
            )?,
            Side::Sell => sweep(
                &mut self.bids,
                &mut self.orders,
                &mut self.index,
                &mut order,
                &mut self.next_trade_sequence,
            )?,
        };

        self.remember(&trades);
        if order.is_filled() {
            debug!(symbol = %self.symbol, order_id = %order.id, trades = trades.len(), "order filled on entry");
        } else {
            debug!(
                symbol = %self.symbol,
                order_id = %order.id,
                side = %order.side,
                price = %order.price,
                remaining = %order.remaining_quantity,
                trades = trades.len(),
                "order resting"
            );
            self.rest(order)?;
        }
        Ok(trades)
    }

    /// Removes a resting order and returns it with its final remaining quantity.
    /// Cancelling an id that is not resting, including one already cancelled or filled,
    /// is `OrderNotFound`.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<Order, BookError> {
        let entry = self
            .index
            .get(&order_id)
            .copied()
            .ok_or(BookError::OrderNotFound(order_id))?;
        let node = match entry.side {
            Side::Buy => detach(&mut self.bids, &mut self.orders, order_id, entry)?,
            Side::Sell => detach(&mut self.asks, &mut self.orders, order_id, entry)?,
        };
        self.index.remove(&order_id);
        debug!(
            symbol = %self.symbol,
            order_id = %order_id,
            side = %entry.side,
            price = %entry.price,
            remaining = %node.order.remaining_quantity,
            "order cancelled"
        );
        Ok(node.order)
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        let entry = self.index.get(&order_id)?;
        self.orders.get(entry.slot).map(|node| &node.order)
    }

    /// The last trades executed on this book, oldest first.
    pub fn recent_trades(&self) -> impl DoubleEndedIterator<Item = &Trade> + ExactSizeIterator + '_ {
        self.recent_trades.iter()
    }

    /// Side and price level of a resting order, straight from the index.
    pub fn locate(&self, order_id: OrderId) -> Option<(Side, Price)> {
        self.index.get(&order_id).map(|entry| (entry.side, entry.price))
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    pub fn best_bid_quantity(&self) -> Option<Quantity> {
        self.bids
            .best()
            .map(|(_, level)| Quantity::from_raw(level.total_qty()))
    }

    pub fn best_ask_quantity(&self) -> Option<Quantity> {
        self.asks
            .best()
            .map(|(_, level)| Quantity::from_raw(level.total_qty()))
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.value() - bid.value()),
            _ => None,
        }
    }

    /// Up to `levels` best price levels per side, best first.
    pub fn market_depth(&self, levels: usize) -> MarketDepth {
        MarketDepth {
            bids: depth_levels(&self.bids, levels),
            asks: depth_levels(&self.asks, levels),
            spread: self.spread(),
        }
    }

    /// Every resting order on `side` in the order it would be matched.
    pub fn orders_in_priority(&self, side: Side) -> Vec<&Order> {
        match side {
            Side::Buy => priority_walk(&self.bids, &self.orders),
            Side::Sell => priority_walk(&self.asks, &self.orders),
        }
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    pub fn level_count(&self, side: Side) -> usize {
        match side {
            Side::Buy => self.bids.len(),
            Side::Sell => self.asks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Full structural audit. Under correct use of the public API this is always `Ok`.
    pub fn check_invariants(&self) -> Result<(), BookError> {
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(violation(format!("crossed book: bid {bid} >= ask {ask}")));
            }
        }
        self.check_recent_trades()?;
        let resting = self.check_side(Side::Buy, &self.bids)? + self.check_side(Side::Sell, &self.asks)?;
        if resting != self.index.len() || resting != self.orders.len() {
            return Err(violation(format!(
                "{resting} orders queued, {} indexed, {} in arena",
                self.index.len(),
                self.orders.len()
            )));
        }
        Ok(())
    }

    fn check_recent_trades(&self) -> Result<(), BookError> {
        if self.recent_trades.len() > RECENT_TRADES_CAPACITY {
            return Err(violation(format!(
                "{} recent trades kept, capacity is {RECENT_TRADES_CAPACITY}",
                self.recent_trades.len()
            )));
        }
        let mut last_sequence = 0u64;
        for trade in &self.recent_trades {
            if trade.sequence <= last_sequence || trade.sequence >= self.next_trade_sequence {
                return Err(violation(format!("recent trade sequence {} out of order", trade.sequence)));
            }
            if trade.quantity.is_zero() || !self.tick_size.is_aligned(trade.price.value()) {
                return Err(violation(format!("recent trade {} is malformed", trade.sequence)));
            }
            last_sequence = trade.sequence;
        }
        Ok(())
    }

    fn check_side<K: LevelKey>(&self, side: Side, book: &SideBook<K>) -> Result<usize, BookError> {
        let mut resting = 0;
        for (price, level) in book.levels() {
            if level.is_empty() {
                return Err(violation(format!("empty {side} level {price} left in book")));
            }
            let mut total = 0u128;
            let mut count = 0usize;
            let mut last_sequence = 0u64;
            for (slot, order) in level.iter(&self.orders) {
                if order.side != side || order.price != price {
                    return Err(violation(format!(
                        "order {} ({} @ {}) queued in {side} level {price}",
                        order.id, order.side, order.price
                    )));
                }
                if order.remaining_quantity.is_zero() || order.remaining_quantity > order.original_quantity {
                    return Err(violation(format!(
                        "order {} rests with remaining {} of {}",
                        order.id, order.remaining_quantity, order.original_quantity
                    )));
                }
                if order.sequence <= last_sequence || order.sequence >= self.next_sequence {
                    return Err(violation(format!(
                        "order {} sequence {} out of FIFO order at {price}",
                        order.id, order.sequence
                    )));
                }
                let expected = IndexEntry { side, price, slot };
                if self.index.get(&order.id) != Some(&expected) {
                    return Err(violation(format!("index entry for order {} disagrees with book", order.id)));
                }
                last_sequence = order.sequence;
                total += u128::from(order.remaining_quantity.value());
                count += 1;
            }
            if total != u128::from(level.total_qty()) || count != level.order_count() {
                return Err(violation(format!(
                    "{side} level {price} caches {} over {} orders, queue holds {total} over {count}",
                    level.total_qty(),
                    level.order_count()
                )));
            }
            resting += count;
        }
        Ok(resting)
    }

    /// Copies the full book into plain data. This is the only part of taking a
    /// snapshot that needs the book; encoding can happen elsewhere.
    pub fn capture(&self) -> BookState {
        let mut index: Vec<IndexRecord> = self
            .index
            .iter()
            .map(|(order_id, entry)| IndexRecord {
                order_id: *order_id,
                side: entry.side,
                price: entry.price,
            })
            .collect();
        index.sort_unstable_by_key(|record| record.order_id);
        BookState {
            symbol: self.symbol.clone(),
            tick_size: self.tick_size,
            next_sequence: self.next_sequence,
            next_trade_sequence: self.next_trade_sequence,
            bids: level_states(&self.bids, &self.orders),
            asks: level_states(&self.asks, &self.orders),
            index,
            recent_trades: self.recent_trades.iter().cloned().collect(),
        }
    }

    /// Rebuilds a book from captured state, rejecting anything a live book could not have produced.
    pub fn from_state(state: BookState) -> Result<Self, SnapshotError> {
        let BookState {
            symbol,
            tick_size,
            next_sequence,
            next_trade_sequence,
            bids,
            asks,
            index,
            recent_trades,
        } = state;
        if next_sequence == 0 || next_trade_sequence == 0 {
            return Err(SnapshotError::Corrupt(format!(
                "sequence counters start at 1, found order {next_sequence} and trade {next_trade_sequence}"
            )));
        }
        let symbol = Symbol::new(symbol.as_str()).map_err(corrupt)?;
        let tick_size = TickSize::new(tick_size.value()).map_err(corrupt)?;
        let mut book = Self::new(symbol, tick_size);
        book.next_sequence = next_sequence;
        book.next_trade_sequence = next_trade_sequence;
        book.recent_trades = recent_trades.into();
        book.load_side(Side::Buy, bids)?;
        book.load_side(Side::Sell, asks)?;

        if index.len() != book.index.len() {
            return Err(SnapshotError::Corrupt(format!(
                "index table has {} entries, levels hold {} orders",
                index.len(),
                book.index.len()
            )));
        }
        for record in &index {
            let matches = book
                .index
                .get(&record.order_id)
                .is_some_and(|entry| entry.side == record.side && entry.price == record.price);
            if !matches {
                return Err(SnapshotError::Corrupt(format!(
                    "index table entry for order {} disagrees with levels",
                    record.order_id
                )));
            }
        }
        book.check_invariants().map_err(corrupt)?;
        Ok(book)
    }

    fn load_side(&mut self, side: Side, levels: Vec<LevelState>) -> Result<(), SnapshotError> {
        let mut previous: Option<Price> = None;
        for level in levels {
            Price::new(level.price.value(), self.tick_size).map_err(corrupt)?;
            if level.orders.is_empty() {
                return Err(SnapshotError::Corrupt(format!("empty {side} level {}", level.price)));
            }
            if let Some(prev) = previous {
                let best_first = match side {
                    Side::Buy => level.price < prev,
                    Side::Sell => level.price > prev,
                };
                if !best_first {
                    return Err(SnapshotError::Corrupt(format!(
                        "{side} level {} out of order after {prev}",
                        level.price
                    )));
                }
            }
            previous = Some(level.price);
            for order in level.orders {
                if order.side != side || order.price != level.price {
                    return Err(SnapshotError::Corrupt(format!(
                        "order {} does not belong to {side} level {}",
                        order.id, level.price
                    )));
                }
                if self.index.contains(&order.id) {
                    return Err(SnapshotError::Corrupt(format!("order {} appears twice", order.id)));
                }
                self.rest(order).map_err(corrupt)?;
            }
        }
        Ok(())
    }

    fn remember(&mut self, trades: &[Trade]) {
        self.recent_trades.extend(trades.iter().cloned());
        let excess = self.recent_trades.len().saturating_sub(RECENT_TRADES_CAPACITY);
        self.recent_trades.drain(..excess);
    }

    fn rest(&mut self, order: Order) -> Result<(), BookError> {
        let id = order.id;
        let side = order.side;
        let price = order.price;
        let slot = self.orders.insert(OrderNode::new(order));
        let queued = match side {
            Side::Buy => enqueue(&mut self.bids, &mut self.orders, price, slot),
            Side::Sell => enqueue(&mut self.asks, &mut self.orders, price, slot),
        };
        if let Err(err) = queued {
            self.orders.remove(slot);
            return Err(err);
        }
        self.index.insert(id, IndexEntry { side, price, slot });
        Ok(())
    }
}

/// Consumes crossing liquidity from `book` for `taker`, best level first and FIFO
/// within a level. A maker that reaches zero is unlinked and unindexed before the
/// next match is attempted.
fn sweep<K: LevelKey>(
    book: &mut SideBook<K>,
    orders: &mut Slab<OrderNode>,
    index: &mut OrderIndex,
    taker: &mut Order,
    next_trade_sequence: &mut u64,
) -> Result<Vec<Trade>, BookError> {
    let mut trades = Vec::new();
    while !taker.is_filled() {
        let Some((best_price, level)) = book.best_mut() else {
            break;
        };
        if !taker.crosses(best_price) {
            break;
        }
        let Some(head) = level.head() else {
            return Err(violation(format!("empty level {best_price} left in book")));
        };
        let maker = &mut orders[head].order;
        let qty = taker.remaining_quantity.min(maker.remaining_quantity);
        level.reduce(qty.value())?;
        maker.fill(qty)?;
        taker.fill(qty)?;

        let trade = Trade::between(*next_trade_sequence, taker, maker, qty);
        *next_trade_sequence += 1;
        trace!(
            sequence = trade.sequence,
            maker = %maker.id,
            taker = %taker.id,
            price = %best_price,
            qty = %qty,
            "fill"
        );
        let maker_id = maker.id;
        let maker_done = maker.is_filled();
        trades.push(trade);

        if maker_done {
            level.unlink(orders, head)?;
            index.remove(&maker_id);
            if level.is_empty() {
                book.remove_if_empty(best_price);
            }
        }
    }
    Ok(trades)
}

fn detach<K: LevelKey>(
    book: &mut SideBook<K>,
    orders: &mut Slab<OrderNode>,
    order_id: OrderId,
    entry: IndexEntry,
) -> Result<OrderNode, BookError> {
    if orders.get(entry.slot).map(|node| node.order.id) != Some(order_id) {
        return Err(violation(format!("slot {} does not hold order {order_id}", entry.slot)));
    }
    let level = book
        .level_mut(entry.price)
        .ok_or_else(|| violation(format!("order {order_id} indexed at missing level {}", entry.price)))?;
    let node = level.unlink(orders, entry.slot)?;
    book.remove_if_empty(entry.price);
    Ok(node)
}

/// Appends `slot` to the level at `price`, dropping a level this call created if it refuses.
fn enqueue<K: LevelKey>(
    book: &mut SideBook<K>,
    orders: &mut Slab<OrderNode>,
    price: Price,
    slot: usize,
) -> Result<(), BookError> {
    let queued = book.level_or_insert(price).push_back(orders, slot);
    if queued.is_err() {
        book.remove_if_empty(price);
    }
    queued
}

fn level_can_absorb<K: LevelKey>(book: &SideBook<K>, price: Price, qty: Quantity) -> bool {
    book.level(price).is_none_or(|level| level.can_absorb(qty.value()))
}

fn depth_levels<K: LevelKey>(book: &SideBook<K>, levels: usize) -> Vec<DepthLevel> {
    book.levels()
        .take(levels)
        .map(|(price, level)| DepthLevel {
            price,
            quantity: Quantity::from_raw(level.total_qty()),
            order_count: level.order_count(),
        })
        .collect()
}

fn priority_walk<'a, K: LevelKey>(book: &'a SideBook<K>, orders: &'a Slab<OrderNode>) -> Vec<&'a Order> {
    book.levels()
        .flat_map(|(_, level)| level.iter(orders).map(|(_, order)| order))
        .collect()
}

fn level_states<K: LevelKey>(book: &SideBook<K>, orders: &Slab<OrderNode>) -> Vec<LevelState> {
    book.levels()
        .map(|(price, level)| LevelState {
            price,
            orders: level.iter(orders).map(|(_, order)| order.clone()).collect(),
        })
        .collect()
}

fn violation(message: String) -> BookError {
    BookError::InvariantViolation(message)
}

fn corrupt(err: BookError) -> SnapshotError {
    SnapshotError::Corrupt(err.to_string())
}
