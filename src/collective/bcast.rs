use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{bytes, group_size, pad_with_first, padded_count};
use crate::comm::{Communicator, span_mut, to_count};
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType, Rank};

collective_module! {
    /// Broadcast algorithms.
    BcastModule => BcastAlgorithm {
        op: CollectiveOp::Bcast,
        rooted: true,
        Default = 0 => "default",
        AsAllgatherv = 1 => "bcast_as_allgatherv",
        AsScatterAllgather = 2 => "bcast_as_scatter_allgather",
    }
}

/// Broadcast as an in-place allgatherv where only the root contributes.
pub(crate) fn as_allgatherv(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    buf: &mut [u8],
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let size = group_size(comm);
    let word = std::mem::size_of::<Count>();
    let root = root as usize;

    let mut lease = arena.lease();
    let ints = lease.ints();
    let counts_region = ints.grab(Slot::First, size * word)?;
    let displs_region = ints.grab(Slot::Second, size * word)?;
    let (counts, displs) = ints.pair_mut(counts_region, displs_region);

    let block = to_count(count)?;
    for i in 0..size {
        counts[i] = if i == root { block } else { 0 };
        displs[i] = if i <= root { 0 } else { block };
    }

    comm.allgatherv_in_place(buf, counts, displs, dtype)
}

/// Broadcast as a scatter of padded chunks followed by an allgather.
///
/// The root's buffer already holds the result, so only the other ranks copy
/// the reassembled data back.
pub(crate) fn as_scatter_allgather(
    comm: &mut dyn Communicator,
    arena: &mut BufferArena,
    buf: &mut [u8],
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let size = group_size(comm);
    let extent = dtype.size_in_bytes();
    let padded = padded_count(count, size);
    let chunk = padded / size;
    let n = bytes(count, dtype);
    let user = span_mut(buf, 0, n)?;

    let mut lease = arena.lease();
    let msg = lease.msg();
    let full_region = msg.grab(Slot::First, bytes(padded, dtype))?;
    let part_region = msg.grab(Slot::Second, bytes(chunk, dtype))?;
    let (full, part) = msg.pair_mut(full_region, part_region);

    if comm.rank() == root {
        full[..n].copy_from_slice(user);
        pad_with_first(full, count, padded, extent);
    }

    comm.scatter(full, part, chunk, dtype, root)?;
    comm.allgather(part, full, chunk, dtype)?;

    if comm.rank() != root {
        user.copy_from_slice(&full[..n]);
    }
    Ok(())
}
