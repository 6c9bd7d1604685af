use rust_decimal::Decimal;

use crate::types::OrderId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    #[error("invalid price {value}: {reason}")]
    InvalidPrice { value: Decimal, reason: &'static str },
    #[error("invalid quantity {value}: {reason}")]
    InvalidQuantity { value: u64, reason: &'static str },
    #[error("invalid tick size {0}: must be positive")]
    InvalidTickSize(Decimal),
    #[error("invalid symbol {0:?}")]
    InvalidSymbol(String),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("order {0} is already resting")]
    DuplicateOrderId(OrderId),
    /// The book detected divergence between its own structures. Never caused by caller input.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Book(#[from] BookError),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
}
