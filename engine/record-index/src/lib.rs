//! # record-index
//!
//! Parses fixed 88-byte market records and builds an immutable mapping from
//! jiffy timestamp key to the ordered set of records sharing that key.
//! Pre-indexing trades memory for dispatch-time latency: lookups during the
//! tick loop never touch the file.

mod index;
mod record;

pub use index::JiffyIndex;
pub use record::{Record, JIFFY_FIELD_LEN, JIFFY_FIELD_OFFSET, RECORD_SIZE, SYMBOL_FIELD_OFFSET};

use thiserror::Error;

/// Errors from record parsing and index construction.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("record file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated record at byte offset {offset} ({got} of {RECORD_SIZE} bytes)")]
    TruncatedRecord { offset: u64, got: usize },

    #[error("non-numeric jiffy timestamp in record at byte offset {offset}")]
    BadTimestamp { offset: u64 },
}
