pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
pub mod order;
pub mod persistence;
pub mod shared;
pub mod types;

pub mod metrics;

pub use error::{BookError, SnapshotError};
pub use matching::{DepthLevel, LimitOrderBook, MarketDepth};
pub use order::{Order, Trade};
pub use types::{OrderId, Price, Quantity, Side, Symbol, TickSize, UserId};
