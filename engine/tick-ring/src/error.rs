//! Error types for shared-memory segments.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RingError {
    #[error("shared memory segment I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("ring capacity must be a power of two greater than 1, got {0}")]
    InvalidCapacity(u64),

    #[error("segment is {got} bytes, need {expected} for the declared capacity")]
    SegmentTruncated { expected: usize, got: usize },

    #[error("date config segment holds an invalid date: {0}")]
    BadDateConfig(String),
}
