use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{bytes, group_size, uniform_layout};
use crate::comm::{Communicator, span, span_mut};
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType, Rank};

collective_module! {
    /// Scatter algorithms.
    ScatterModule => ScatterAlgorithm {
        op: CollectiveOp::Scatter,
        rooted: true,
        Default = 0 => "default",
        AsBcast = 1 => "scatter_as_bcast",
        AsScatterv = 2 => "scatter_as_scatterv",
    }
}

/// Broadcast the whole send buffer; every rank keeps its own block.
pub(crate) fn as_bcast(
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
    let mine = span_mut(recv, 0, block)?;

    let mut lease = arena.lease();
    let msg = lease.msg();
    let region = msg.grab(Slot::First, total)?;
    let scratch = msg.slice_mut(region);

    if comm.rank() == root {
        scratch.copy_from_slice(span(send, 0, total)?);
    }
    comm.bcast(scratch, size * count, dtype, root)?;

    let at = comm.rank() as usize * block;
    mine.copy_from_slice(&scratch[at..at + block]);
    Ok(())
}

pub(crate) fn as_scatterv(
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

    comm.scatterv(send, counts, displs, recv, count, dtype, root)
}
