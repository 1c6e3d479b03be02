use crate::types::{AlgorithmId, CollectiveOp, DataType, Rank};
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, TuneError>;

#[derive(Debug, thiserror::Error)]
pub enum TuneError {
    #[error("failed to allocate {bytes} bytes for the {pool} pool")]
    AllocationFailure { pool: &'static str, bytes: usize },

    #[error(
        "no space left in {pool} pool for slot {slot}: requested {requested} elements, {available} available"
    )]
    NoSpaceLeft {
        pool: &'static str,
        slot: u8,
        requested: usize,
        available: usize,
    },

    #[error("invalid algorithm id {id}")]
    InvalidAlgorithmId { id: AlgorithmId },

    #[error("unknown algorithm name '{name}'")]
    InvalidAlgorithmName { name: String },

    #[error("unknown collective operation '{0}'")]
    UnknownOperation(String),

    #[error("no profile loaded for {op}")]
    ProfileNotFound { op: CollectiveOp },

    #[error("profile for {op} was recorded with {recorded} processes, group has {live}")]
    GroupSizeMismatch {
        op: CollectiveOp,
        recorded: u32,
        live: u32,
    },

    #[error("no range in the {op} profile covers {size} bytes")]
    RangeNotMatched { op: CollectiveOp, size: u64 },

    #[error("invalid message size {size}")]
    InvalidMessageSize { size: u64 },

    #[error("invalid value '{value}' for setting {key}")]
    InvalidSetting { key: String, value: String },

    #[error("selection context does not choose algorithms per call")]
    SelectionUnavailable,

    #[error("malformed profile {}:{line}: {reason}", .path.display())]
    MalformedProfile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("cannot read profile directory {}: {source}", .path.display())]
    ProfileDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported data type: {dtype:?} for operation {op}")]
    UnsupportedDType { dtype: DataType, op: &'static str },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid rank {rank}: group size is {group_size}")]
    InvalidRank { rank: Rank, group_size: u32 },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TuneError {
    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `MalformedProfile` error for `line` (1-based) of `path`.
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedProfile {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the bootstrap instead of degrading to
    /// the default algorithm.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure { .. }
                | Self::MalformedProfile { .. }
                | Self::ProfileDirectory { .. }
        )
    }
}
