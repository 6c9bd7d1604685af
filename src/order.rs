use serde::{Deserialize, Serialize};

use crate::error::BookError;
use crate::types::{OrderId, Price, Quantity, Side, UserId};

/// A limit order. `sequence` is stamped by the book on acceptance; whatever the
/// caller puts there is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub original_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub sequence: u64,
}

impl Order {
    pub fn new(id: OrderId, user_id: UserId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            user_id,
            side,
            price,
            original_quantity: quantity,
            remaining_quantity: quantity,
            sequence: 0,
        }
    }

    /// Whether this order would trade against a resting order quoted at `price`.
    pub fn crosses(&self, price: Price) -> bool {
        match self.side {
            Side::Buy => self.price >= price,
            Side::Sell => self.price <= price,
        }
    }

    pub fn filled_quantity(&self) -> Quantity {
        Quantity::from_raw(
            self.original_quantity
                .value()
                .saturating_sub(self.remaining_quantity.value()),
        )
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    pub(crate) fn fill(&mut self, qty: Quantity) -> Result<(), BookError> {
        self.remaining_quantity = self.remaining_quantity.checked_sub(qty).ok_or_else(|| {
            BookError::InvariantViolation(format!(
                "fill of {qty} exceeds remaining {} on order {}",
                self.remaining_quantity, self.id
            ))
        })?;
        Ok(())
    }
}

/// One execution between a resting maker and an incoming taker, always at the maker's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub sequence: u64,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
    pub taker_side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl Trade {
    pub(crate) fn between(sequence: u64, taker: &Order, maker: &Order, quantity: Quantity) -> Self {
        let (buy, sell) = match taker.side {
            Side::Buy => (taker, maker),
            Side::Sell => (maker, taker),
        };
        Self {
            sequence,
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            buy_user_id: buy.user_id.clone(),
            sell_user_id: sell.user_id.clone(),
            taker_side: taker.side,
            price: maker.price,
            quantity,
        }
    }

    pub fn maker_order_id(&self) -> OrderId {
        match self.taker_side {
            Side::Buy => self.sell_order_id,
            Side::Sell => self.buy_order_id,
        }
    }

    pub fn taker_order_id(&self) -> OrderId {
        match self.taker_side {
            Side::Buy => self.buy_order_id,
            Side::Sell => self.sell_order_id,
        }
    }
}
