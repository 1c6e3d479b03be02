pub mod arena;
pub mod catalog;
pub mod cli;
pub mod collective;
pub mod comm;
pub mod config;
pub mod context;
pub mod error;
pub mod profile;
pub mod reduce;
pub mod tuner;
pub mod types;

pub use arena::BufferArena;
pub use catalog::Catalog;
pub use comm::{Communicator, LocalComm};
pub use config::{ConfigStore, TuneConfig};
pub use context::{ContextKind, SelectionContext};
pub use error::{Result, TuneError};
pub use tuner::{AlgorithmRecorder, Tuner};
pub use types::{AlgorithmId, CollectiveOp, Count, DataType, Rank, ReduceOp};
