use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{
    bytes, displacements, group_size, pad_with_first, padded_count, round_robin_counts,
};
use crate::comm::{Communicator, span, span_mut};
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType, Rank, ReduceOp};

collective_module! {
    /// Reduce algorithms.
    ReduceModule => ReduceAlgorithm {
        op: CollectiveOp::Reduce,
        rooted: true,
        Default = 0 => "default",
        AsAllreduce = 1 => "reduce_as_allreduce",
        AsReduceScatterBlockGather = 2 => "reduce_as_reducescatterblock_gather",
        AsReduceScatterGatherv = 3 => "reduce_as_reducescatter_gatherv",
    }
}

/// Allreduce everywhere; non-root ranks reduce into scratch.
#[allow(clippy::too_many_arguments)]
pub(crate) fn as_allreduce(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    root: Rank,
) -> Result<()> {
    let mut lease = arena.lease();
    let msg = lease.msg();
    let region = msg.grab(Slot::First, bytes(count, dtype))?;

    if comm.rank() == root {
        comm.allreduce(send, recv, count, dtype, op)
    } else {
        comm.allreduce(send, msg.slice_mut(region), count, dtype, op)
    }
}

/// Reduce-scatter equal padded blocks, then gather them at the root.
#[allow(clippy::too_many_arguments)]
pub(crate) fn as_reduce_scatter_block_gather(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    root: Rank,
) -> Result<()> {
    let size = group_size(comm);
    let padded = padded_count(count, size);
    let chunk = padded / size;
    let n = bytes(count, dtype);
    let input = span(send, 0, n)?;
    let output = if comm.rank() == root {
        Some(span_mut(recv, 0, n)?)
    } else {
        None
    };

    let mut lease = arena.lease();
    let msg = lease.msg();
    let full_region = msg.grab(Slot::First, bytes(padded, dtype))?;
    let part_region = msg.grab(Slot::Second, bytes(chunk, dtype))?;
    let (full, part) = msg.pair_mut(full_region, part_region);

    full[..n].copy_from_slice(input);
    pad_with_first(full, count, padded, dtype.size_in_bytes());

    comm.reduce_scatter_block(full, part, chunk, dtype, op)?;
    comm.gather(part, full, chunk, dtype, root)?;

    if let Some(output) = output {
        output.copy_from_slice(&full[..n]);
    }
    Ok(())
}

/// Reduce-scatter uneven round-robin chunks, then gatherv them at the root.
///
/// Chunks of `min_chunk` elements are dealt out starting at rank 0; the
/// remainder goes to the next rank in turn.
#[allow(clippy::too_many_arguments)]
pub(crate) fn as_reduce_scatter_gatherv(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    root: Rank,
    min_chunk: usize,
) -> Result<()> {
    let size = group_size(comm);
    let word = std::mem::size_of::<Count>();
    let rank = comm.rank() as usize;

    let mut lease = arena.lease();
    let (msg, ints) = lease.pools();
    let counts_region = ints.grab(Slot::First, size * word)?;
    let displs_region = ints.grab(Slot::Second, size * word)?;
    let (counts, displs) = ints.pair_mut(counts_region, displs_region);
    round_robin_counts(counts, count, min_chunk)?;

    let largest = counts.iter().copied().max().unwrap_or(0);
    let region = msg.grab(Slot::First, bytes(largest as usize, dtype))?;
    let partial = &mut msg.slice_mut(region)[..bytes(counts[rank] as usize, dtype)];

    comm.reduce_scatter(send, partial, counts, dtype, op)?;
    displacements(counts, displs);
    comm.gatherv(partial, counts[rank] as usize, recv, counts, displs, dtype, root)
}
