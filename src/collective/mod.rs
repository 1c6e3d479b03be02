//! Decomposition algorithms, one module per replaceable operation.
//!
//! Each algorithm re-expresses its operation as a short fixed pipeline of
//! other primitives plus arena scratch space. Algorithms keep no state
//! between calls and release every arena slot before returning, on success
//! and on failure alike (via [`ArenaLease`](crate::arena::ArenaLease)).
//!
//! Two conventions recur:
//! - padding: a vector split evenly across the group is padded up to a
//!   multiple of the group size with copies of its first element, and only
//!   the first `count` elements are copied back;
//! - fan-out emulation: a rooted operation runs as its symmetric
//!   counterpart on every rank, and each rank keeps only its own slice.

pub(crate) mod helpers;

pub mod allgather;
pub mod allreduce;
pub mod alltoall;
pub mod bcast;
pub mod gather;
pub mod reduce;
pub mod reduce_scatter_block;
pub mod scan;
pub mod scatter;

pub use allgather::{AllgatherAlgorithm, AllgatherModule};
pub use allreduce::{AllreduceAlgorithm, AllreduceModule};
pub use alltoall::{AlltoallAlgorithm, AlltoallModule};
pub use bcast::{BcastAlgorithm, BcastModule};
pub use gather::{GatherAlgorithm, GatherModule};
pub use reduce::{ReduceAlgorithm, ReduceModule};
pub use reduce_scatter_block::{ReduceScatterBlockAlgorithm, ReduceScatterBlockModule};
pub use scan::{ScanAlgorithm, ScanModule};
pub use scatter::{ScatterAlgorithm, ScatterModule};
