pub mod snapshot;

pub use snapshot::{BookState, Snapshot, SnapshotStore};
