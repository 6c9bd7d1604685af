use std::time::Instant;

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::engine::EngineError;
use crate::error::BookError;
use crate::matching::{LimitOrderBook, MarketDepth};
use crate::metrics;
use crate::order::{Order, Trade};
use crate::persistence::snapshot::{encode_state, BookState};
use crate::types::{OrderId, Price, Quantity, Symbol, TickSize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid: Option<Price>,
    pub best_bid_quantity: Option<Quantity>,
    pub best_ask: Option<Price>,
    pub best_ask_quantity: Option<Quantity>,
    pub spread: Option<Decimal>,
}

pub enum BookCommand {
    Submit {
        order: Order,
        reply: oneshot::Sender<Result<Vec<Trade>, BookError>>,
    },
    Cancel {
        order_id: OrderId,
        reply: oneshot::Sender<Result<Order, BookError>>,
    },
    Get {
        order_id: OrderId,
        reply: oneshot::Sender<Option<Order>>,
    },
    Depth {
        levels: usize,
        reply: oneshot::Sender<MarketDepth>,
    },
    Top {
        reply: oneshot::Sender<TopOfBook>,
    },
    Capture {
        reply: oneshot::Sender<BookState>,
    },
}

impl BookCommand {
    fn name(&self) -> &'static str {
        match self {
            BookCommand::Submit { .. } => "submit",
            BookCommand::Cancel { .. } => "cancel",
            BookCommand::Get { .. } => "get",
            BookCommand::Depth { .. } => "depth",
            BookCommand::Top { .. } => "top",
            BookCommand::Capture { .. } => "capture",
        }
    }
}

/// Cloneable sender side of a book task. The task owns the book outright and
/// applies commands one at a time in arrival order.
#[derive(Debug, Clone)]
pub struct BookHandle {
    symbol: Symbol,
    tick_size: TickSize,
    tx: mpsc::Sender<BookCommand>,
}

impl BookHandle {
    /// Moves `book` into a new task. The task ends once every handle is dropped and
    /// yields the book back through the join handle.
    pub fn spawn(book: LimitOrderBook, capacity: usize) -> (BookHandle, JoinHandle<LimitOrderBook>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = BookHandle {
            symbol: book.symbol().clone(),
            tick_size: book.tick_size(),
            tx,
        };
        let task = tokio::spawn(run(book, rx));
        (handle, task)
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn tick_size(&self) -> TickSize {
        self.tick_size
    }

    pub async fn submit(&self, order: Order) -> Result<Vec<Trade>, EngineError> {
        Ok(self.request(|reply| BookCommand::Submit { order, reply }).await??)
    }

    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, EngineError> {
        Ok(self.request(|reply| BookCommand::Cancel { order_id, reply }).await??)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>, EngineError> {
        self.request(|reply| BookCommand::Get { order_id, reply }).await
    }

    pub async fn depth(&self, levels: usize) -> Result<MarketDepth, EngineError> {
        self.request(|reply| BookCommand::Depth { levels, reply }).await
    }

    pub async fn top(&self) -> Result<TopOfBook, EngineError> {
        self.request(|reply| BookCommand::Top { reply }).await
    }

    pub async fn capture(&self) -> Result<BookState, EngineError> {
        self.request(|reply| BookCommand::Capture { reply }).await
    }

    /// The task only copies the book; encoding and hashing run here.
    pub async fn snapshot(&self) -> Result<Bytes, EngineError> {
        let state = self.capture().await?;
        Ok(encode_state(state)?)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BookCommand,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| EngineError::Closed(self.symbol.clone()))?;
        rx.await.map_err(|_| EngineError::Closed(self.symbol.clone()))
    }
}

async fn run(mut book: LimitOrderBook, mut rx: mpsc::Receiver<BookCommand>) -> LimitOrderBook {
    info!(symbol = %book.symbol(), "book task started");
    while let Some(command) = rx.recv().await {
        let name = command.name();
        let started = Instant::now();
        handle_command(&mut book, command);
        metrics::record_latency(name, started.elapsed());
    }
    info!(symbol = %book.symbol(), orders = book.order_count(), "book task stopped");
    book
}

#[instrument(skip_all, fields(symbol = %book.symbol(), command = command.name()))]
fn handle_command(book: &mut LimitOrderBook, command: BookCommand) {
    match command {
        BookCommand::Submit { order, reply } => {
            let result = book.add_order(order);
            match &result {
                Ok(trades) => metrics::record_accepted(book.symbol(), trades),
                Err(err) => {
                    debug!(%err, "order rejected");
                    metrics::record_rejected(book.symbol());
                }
            }
            let _ = reply.send(result);
        }
        BookCommand::Cancel { order_id, reply } => {
            let result = book.cancel_order(order_id);
            if result.is_ok() {
                metrics::record_cancelled(book.symbol());
            }
            let _ = reply.send(result);
        }
        BookCommand::Get { order_id, reply } => {
            let _ = reply.send(book.get_order(order_id).cloned());
        }
        BookCommand::Depth { levels, reply } => {
            let _ = reply.send(book.market_depth(levels));
        }
        BookCommand::Top { reply } => {
            let _ = reply.send(TopOfBook {
                best_bid: book.best_bid(),
                best_bid_quantity: book.best_bid_quantity(),
                best_ask: book.best_ask(),
                best_ask_quantity: book.best_ask_quantity(),
                spread: book.spread(),
            });
        }
        BookCommand::Capture { reply } => {
            let _ = reply.send(book.capture());
        }
    }
}
