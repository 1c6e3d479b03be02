use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{bytes, group_size, uniform_layout};
use crate::comm::{Communicator, span, span_mut};
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType, ReduceOp};

collective_module! {
    /// Allgather algorithms.
    AllgatherModule => AllgatherAlgorithm {
        op: CollectiveOp::Allgather,
        rooted: false,
        Default = 0 => "default",
        AsAllgatherv = 1 => "allgather_as_allgatherv",
        AsAllreduce = 2 => "allgather_as_allreduce",
        AsAlltoall = 3 => "allgather_as_alltoall",
        AsGatherBcast = 4 => "allgather_as_gather_bcast",
    }
}

pub(crate) fn as_allgatherv(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
) -> Result<()> {
    let size = group_size(comm);
    let word = std::mem::size_of::<Count>();

    let mut lease = arena.lease();
    let ints = lease.ints();
    let counts_region = ints.grab(Slot::First, size * word)?;
    let displs_region = ints.grab(Slot::Second, size * word)?;
    let (counts, displs) = ints.pair_mut(counts_region, displs_region);
    uniform_layout(counts, displs, count)?;

    comm.allgatherv(send, count, recv, counts, displs, dtype)
}

/// Every rank places its block into a zeroed buffer; a bitwise-or
/// allreduce over the raw bytes then merges the disjoint blocks.
pub(crate) fn as_allreduce(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
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

    comm.allreduce(scratch, recv, total, DataType::U8, ReduceOp::BitOr)
}

/// Send the same block to everyone via alltoall.
pub(crate) fn as_alltoall(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
) -> Result<()> {
    let size = group_size(comm);
    let block = bytes(count, dtype);
    let own = span(send, 0, block)?;

    let mut lease = arena.lease();
    let msg = lease.msg();
    let region = msg.grab(Slot::First, size * block)?;
    let scratch = msg.slice_mut(region);
    if block > 0 {
        for copy in scratch.chunks_exact_mut(block) {
            copy.copy_from_slice(own);
        }
    }

    comm.alltoall(scratch, recv, count, dtype)
}

/// Gather at rank 0, then broadcast the assembled buffer.
pub(crate) fn as_gather_bcast(
    comm: &mut dyn Communicator,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
) -> Result<()> {
    let size = group_size(comm);
    let total = span_mut(recv, 0, bytes(size * count, dtype))?;
    comm.gather(send, total, count, dtype, 0)?;
    comm.bcast(total, size * count, dtype, 0)
}
