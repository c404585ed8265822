//! Error types

use thiserror::Error;

/// GBN engine error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("segment buffer overflow: capacity of {max_size} segments exceeded")]
    BufferOverflow { max_size: usize },

    #[error("sequence space exhausted: next sequence number would be {next}")]
    SequenceSpaceExhausted { next: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid datagram length: expected {expected}, got {got}")]
    InvalidDatagram { expected: usize, got: usize },

    #[error("transfer timed out with no progress")]
    TransferTimeout,
}

/// Result alias
pub type Result<T> = std::result::Result<T, Error>;
