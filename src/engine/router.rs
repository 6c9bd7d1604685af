use std::collections::BTreeMap;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::actor::BookHandle;
use crate::engine::{Command, EngineError, Outcome};
use crate::matching::LimitOrderBook;
use crate::order::Order;
use crate::types::{Price, Quantity, Symbol, UserId};

/// One book task per symbol. Commands for different symbols never wait on each other.
pub struct Router {
    books: BTreeMap<Symbol, BookHandle>,
    tasks: Vec<(Symbol, JoinHandle<LimitOrderBook>)>,
    channel_capacity: usize,
    depth_levels: usize,
}

impl Router {
    pub fn new(channel_capacity: usize, depth_levels: usize) -> Self {
        Self {
            books: BTreeMap::new(),
            tasks: Vec::new(),
            channel_capacity,
            depth_levels,
        }
    }

    /// Empty books for every configured market.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let mut router = Router::new(settings.channel_capacity, settings.depth_levels);
        for market in &settings.markets {
            router.insert(market.build_book()?)?;
        }
        Ok(router)
    }

    pub fn insert(&mut self, book: LimitOrderBook) -> Result<BookHandle, EngineError> {
        let symbol = book.symbol().clone();
        if self.books.contains_key(&symbol) {
            return Err(EngineError::DuplicateSymbol(symbol));
        }
        let (handle, task) = BookHandle::spawn(book, self.channel_capacity);
        info!(symbol = %symbol, "book routed");
        self.books.insert(symbol.clone(), handle.clone());
        self.tasks.push((symbol, task));
        Ok(handle)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.books.keys()
    }

    pub fn route(&self, symbol: &str) -> Result<&BookHandle, EngineError> {
        Symbol::new(symbol)
            .ok()
            .and_then(|symbol| self.books.get(&symbol))
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }

    /// Runs one driver command. Failures come back as `Outcome::Rejected`.
    pub async fn apply(&self, command: Command) -> Outcome {
        match self.execute(command).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, "command rejected");
                Outcome::Rejected {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn execute(&self, command: Command) -> Result<Outcome, EngineError> {
        let handle = self.route(command.symbol())?;
        let symbol = handle.symbol().clone();
        match command {
            Command::Submit {
                order_id,
                user_id,
                side,
                price,
                quantity,
                ..
            } => {
                let price = Price::parse(&price, handle.tick_size())?;
                let quantity = Quantity::new(quantity)?;
                let order = Order::new(order_id, UserId::new(user_id), side, price, quantity);
                let trades = handle.submit(order).await?;
                Ok(Outcome::Accepted {
                    symbol,
                    order_id,
                    trades,
                })
            }
            Command::Cancel { order_id, .. } => {
                let order = handle.cancel(order_id).await?;
                Ok(Outcome::Cancelled { symbol, order })
            }
            Command::Depth { levels, .. } => {
                let depth = handle.depth(levels.unwrap_or(self.depth_levels)).await?;
                Ok(Outcome::Depth { symbol, depth })
            }
        }
    }

    /// Closes every book task and hands the books back in insertion order.
    /// Waits for any `BookHandle` clones held elsewhere to be dropped.
    pub async fn shutdown(self) -> Result<Vec<LimitOrderBook>, EngineError> {
        let Router { books, tasks, .. } = self;
        drop(books);
        let mut out = Vec::with_capacity(tasks.len());
        for (symbol, task) in tasks {
            match task.await {
                Ok(book) => out.push(book),
                Err(err) => {
                    warn!(%err, "book task failed");
                    return Err(EngineError::Closed(symbol));
                }
            }
        }
        info!(books = out.len(), "router stopped");
        Ok(out)
    }
}
