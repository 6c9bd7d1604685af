use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::matching::LimitOrderBook;
use crate::order::{Order, Trade};
use crate::types::{OrderId, Price, Side, Symbol, TickSize};

pub const SNAPSHOT_VERSION: u32 = 1;

/// One price level, orders in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelState {
    pub price: Price,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
}

/// Plain-data copy of a book. Levels are best-first; the index table is sorted by id
/// so that equal books capture to equal bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookState {
    pub symbol: Symbol,
    pub tick_size: TickSize,
    pub next_sequence: u64,
    pub next_trade_sequence: u64,
    pub bids: Vec<LevelState>,
    pub asks: Vec<LevelState>,
    pub index: Vec<IndexRecord>,
    /// Oldest first.
    pub recent_trades: Vec<Trade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: u32,
    pub symbol: String,
    pub order_count: usize,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub state: BookState,
}

impl Snapshot {
    pub fn build(state: BookState) -> Result<Self, SnapshotError> {
        let checksum = checksum(&state)?;
        Ok(Snapshot {
            meta: SnapshotMeta {
                version: SNAPSHOT_VERSION,
                symbol: state.symbol.to_string(),
                order_count: state.index.len(),
                checksum,
            },
            state,
        })
    }

    pub fn encode(&self) -> Result<Bytes, SnapshotError> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    /// Decodes and verifies version and checksum. The state itself is validated on restore.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        if snapshot.meta.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.meta.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let actual = checksum(&snapshot.state)?;
        if actual != snapshot.meta.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: snapshot.meta.checksum,
                actual,
            });
        }
        Ok(snapshot)
    }
}

/// Encodes a captured state. Runs without access to the book.
pub fn encode_state(state: BookState) -> Result<Bytes, SnapshotError> {
    Snapshot::build(state)?.encode()
}

fn checksum(state: &BookState) -> Result<String, SnapshotError> {
    let bytes = bincode::serialize(state)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

impl LimitOrderBook {
    /// Serializes the complete book. Nothing is written anywhere.
    pub fn snapshot(&self) -> Result<Bytes, SnapshotError> {
        encode_state(self.capture())
    }

    pub fn restore(bytes: &[u8]) -> Result<LimitOrderBook, SnapshotError> {
        let snapshot = Snapshot::decode(bytes)?;
        LimitOrderBook::from_state(snapshot.state)
    }
}

pub struct SnapshotStore;

impl SnapshotStore {
    pub fn save(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Option<Bytes>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let mut file = File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(Bytes::from(buf)))
    }

    /// `<dir>/<SYMBOL>.snap`; `/` in a symbol becomes `_`.
    pub fn path_for(dir: &Path, symbol: &Symbol) -> std::path::PathBuf {
        dir.join(format!("{}.snap", symbol.as_str().replace('/', "_")))
    }
}
