//! Error taxonomy shared by the storage and container layers.

use thiserror::Error;

/// Everything that can go wrong reading or writing an entry, decoding a
/// container, or scanning a volume for recovery.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),

    #[error("block header mismatch: expected volume {expected_volume} entry {expected_entry} part {expected_part}, got volume {actual_volume} entry {actual_entry} part {actual_part}")]
    HeaderMismatch {
        expected_volume: u8,
        expected_entry: u16,
        expected_part: u16,
        actual_volume: u8,
        actual_entry: u16,
        actual_part: u16,
    },

    #[error("premature end of entry {entry_id} after {read} of {length} bytes")]
    PrematureEndOfEntry {
        entry_id: u16,
        read: u32,
        length: u32,
    },

    #[error("block {0} does not exist")]
    BlockNotFound(u32),

    #[error("entry {0} is unused")]
    UnusedEntry(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to decode container body: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
