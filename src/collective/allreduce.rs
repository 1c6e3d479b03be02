use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{
    bytes, displacements, group_size, pad_with_first, padded_count, round_robin_counts,
};
use crate::comm::{Communicator, span, span_mut};
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType, ReduceOp};

collective_module! {
    /// Allreduce algorithms.
    AllreduceModule => AllreduceAlgorithm {
        op: CollectiveOp::Allreduce,
        rooted: false,
        Default = 0 => "default",
        AsReduceBcast = 1 => "allreduce_as_reduce_bcast",
        AsReduceScatterBlockAllgather = 2 => "allreduce_as_reducescatterblock_allgather",
        AsReduceScatterAllgatherv = 3 => "allreduce_as_reducescatter_allgatherv",
    }
}

/// Reduce to rank 0, then broadcast.
pub(crate) fn as_reduce_bcast(
    comm: &mut dyn Communicator,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    comm.reduce(send, recv, count, dtype, op, 0)?;
    comm.bcast(recv, count, dtype, 0)
}

/// Reduce-scatter equal padded blocks, then allgather them.
pub(crate) fn as_reduce_scatter_block_allgather(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    let size = group_size(comm);
    let padded = padded_count(count, size);
    let chunk = padded / size;
    let n = bytes(count, dtype);
    let input = span(send, 0, n)?;
    let output = span_mut(recv, 0, n)?;

    let mut lease = arena.lease();
    let msg = lease.msg();
    let full_region = msg.grab(Slot::First, bytes(padded, dtype))?;
    let part_region = msg.grab(Slot::Second, bytes(chunk, dtype))?;
    let (full, part) = msg.pair_mut(full_region, part_region);

    full[..n].copy_from_slice(input);
    pad_with_first(full, count, padded, dtype.size_in_bytes());

    comm.reduce_scatter_block(full, part, chunk, dtype, op)?;
    comm.allgather(part, full, chunk, dtype)?;

    output.copy_from_slice(&full[..n]);
    Ok(())
}

/// Reduce-scatter round-robin chunks straight into their final place in
/// `recv`, then complete the buffer with an in-place allgatherv.
#[allow(clippy::too_many_arguments)]
pub(crate) fn as_reduce_scatter_allgatherv(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    min_chunk: usize,
) -> Result<()> {
    let size = group_size(comm);
    let word = std::mem::size_of::<Count>();
    let rank = comm.rank() as usize;

    let mut lease = arena.lease();
    let ints = lease.ints();
    let counts_region = ints.grab(Slot::First, size * word)?;
    let displs_region = ints.grab(Slot::Second, size * word)?;
    let (counts, displs) = ints.pair_mut(counts_region, displs_region);
    round_robin_counts(counts, count, min_chunk)?;
    displacements(counts, displs);

    let at = bytes(displs[rank] as usize, dtype);
    let mine = span_mut(recv, at, bytes(counts[rank] as usize, dtype))?;
    comm.reduce_scatter(send, mine, counts, dtype, op)?;
    comm.allgatherv_in_place(recv, counts, displs, dtype)
}
