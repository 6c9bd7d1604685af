pub mod actor;
pub mod router;

use serde::{Deserialize, Serialize};

use crate::error::{BookError, SnapshotError};
use crate::matching::MarketDepth;
use crate::order::{Order, Trade};
use crate::types::{OrderId, Side, Symbol};

pub use actor::BookHandle;
pub use router::Router;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Book(#[from] BookError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error("symbol {0} is already routed")]
    DuplicateSymbol(Symbol),
    #[error("book task for {0} has stopped")]
    Closed(Symbol),
}

/// One line of driver input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Submit {
        symbol: String,
        order_id: OrderId,
        user_id: String,
        side: Side,
        /// Decimal string, validated against the book's tick size.
        price: String,
        quantity: u64,
    },
    Cancel {
        symbol: String,
        order_id: OrderId,
    },
    Depth {
        symbol: String,
        #[serde(default)]
        levels: Option<usize>,
    },
}

impl Command {
    pub fn symbol(&self) -> &str {
        match self {
            Command::Submit { symbol, .. } | Command::Cancel { symbol, .. } | Command::Depth { symbol, .. } => {
                symbol
            }
        }
    }
}

/// One line of driver output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Accepted {
        symbol: Symbol,
        order_id: OrderId,
        trades: Vec<Trade>,
    },
    Cancelled {
        symbol: Symbol,
        order: Order,
    },
    Depth {
        symbol: Symbol,
        depth: MarketDepth,
    },
    Rejected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_json_lines() {
        let submit: Command = serde_json::from_str(
            r#"{"type":"submit","symbol":"AAPL","order_id":7,"user_id":"alice","side":"buy","price":"150.00","quantity":100}"#,
        )
        .unwrap();
        assert_eq!(submit.symbol(), "AAPL");
        assert!(matches!(submit, Command::Submit { side: Side::Buy, quantity: 100, .. }));

        let depth: Command = serde_json::from_str(r#"{"type":"depth","symbol":"AAPL"}"#).unwrap();
        assert_eq!(
            depth,
            Command::Depth {
                symbol: "AAPL".into(),
                levels: None
            }
        );
    }

    #[test]
    fn rejected_outcome_is_tagged() {
        let line = serde_json::to_string(&Outcome::Rejected {
            reason: "order 1 not found".into(),
        })
        .unwrap();
        assert_eq!(line, r#"{"type":"rejected","reason":"order 1 not found"}"#);
    }
}
