use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{bytes, group_size, uniform_layout};
use crate::comm::{Communicator, span};
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType, Rank, ReduceOp};

collective_module! {
    /// Gather algorithms.
    GatherModule => GatherAlgorithm {
        op: CollectiveOp::Gather,
        rooted: true,
        Default = 0 => "default",
        AsAllgather = 1 => "gather_as_allgather",
        AsGatherv = 2 => "gather_as_gatherv",
        AsReduce = 3 => "gather_as_reduce",
    }
}

/// Allgather everywhere; non-root ranks receive into scratch and discard it.
pub(crate) fn as_allgather(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let size = group_size(comm);

    let mut lease = arena.lease();
    let msg = lease.msg();
    let region = msg.grab(Slot::First, size * bytes(count, dtype))?;

    if comm.rank() == root {
        comm.allgather(send, recv, count, dtype)
    } else {
        comm.allgather(send, msg.slice_mut(region), count, dtype)
    }
}

pub(crate) fn as_gatherv(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let size = group_size(comm);
    let word = std::mem::size_of::<Count>();

    let mut lease = arena.lease();
    let ints = lease.ints();
    let counts_region = ints.grab(Slot::First, size * word)?;
    let displs_region = ints.grab(Slot::Second, size * word)?;
    let (counts, displs) = ints.pair_mut(counts_region, displs_region);
    uniform_layout(counts, displs, count)?;

    comm.gatherv(send, count, recv, counts, displs, dtype, root)
}

/// Each rank writes its block into a zeroed buffer; a bitwise-or reduce of
/// the raw bytes assembles the blocks at the root.
pub(crate) fn as_reduce(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let size = group_size(comm);
    let block = bytes(count, dtype);
    let total = size * block;
    let own = span(send, 0, block)?;

    let mut lease = arena.lease();
    let msg = lease.msg();
    let region = msg.grab(Slot::First, total)?;
    let scratch = msg.slice_mut(region);
    scratch.fill(0);
    let at = comm.rank() as usize * block;
    scratch[at..at + block].copy_from_slice(own);

    comm.reduce(scratch, recv, total, DataType::U8, ReduceOp::BitOr, root)
}
