use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{bytes, group_size};
use crate::comm::Communicator;
use crate::error::Result;
use crate::types::{CollectiveOp, DataType, ReduceOp};

collective_module! {
    /// Reduce-scatter-block algorithms.
    ReduceScatterBlockModule => ReduceScatterBlockAlgorithm {
        op: CollectiveOp::ReduceScatterBlock,
        rooted: false,
        Default = 0 => "default",
        AsReduceScatter = 1 => "reducescatterblock_as_reduce_scatter",
    }
}

/// Reduce the whole vector at rank 0, then scatter the blocks.
pub(crate) fn as_reduce_scatter(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    let size = group_size(comm);
    let total = size * count;

    let mut lease = arena.lease();
    let msg = lease.msg();
    let region = msg.grab(Slot::First, bytes(total, dtype))?;
    let scratch = msg.slice_mut(region);

    comm.reduce(send, scratch, total, dtype, op, 0)?;
    comm.scatter(scratch, recv, count, dtype, 0)
}
