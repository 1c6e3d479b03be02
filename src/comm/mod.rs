//! The primitive transport contract.
//!
//! Every decomposition algorithm is written against [`Communicator`]: rank
//! and size queries, blocking point-to-point transfers, and the native
//! version of each collective. Buffers are raw bytes; counts are element
//! counts of a [`DataType`]. Buffers that only matter at the root (the
//! receive side of gather and reduce, the send side of scatter) may be empty
//! on other ranks.

mod local;

pub use local::LocalComm;

use crate::error::{Result, TuneError};
use crate::reduce::reduce_slice;
use crate::types::{Count, DataType, Rank, ReduceOp};

/// Blocking communication primitives of one group member.
///
/// All collective methods must be called by every rank of the group in the
/// same order with matching counts.
#[allow(clippy::too_many_arguments)]
pub trait Communicator {
    fn rank(&self) -> Rank;

    fn size(&self) -> u32;

    fn send(&mut self, dest: Rank, data: &[u8]) -> Result<()>;

    /// Receive exactly `buf.len()` bytes from `src`.
    fn recv(&mut self, src: Rank, buf: &mut [u8]) -> Result<()>;

    fn bcast(&mut self, buf: &mut [u8], count: usize, dtype: DataType, root: Rank) -> Result<()>;

    fn scatter(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()>;

    fn scatterv(
        &mut self,
        send: &[u8],
        counts: &[Count],
        displs: &[Count],
        recv: &mut [u8],
        recv_count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()>;

    fn gather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()>;

    fn gatherv(
        &mut self,
        send: &[u8],
        send_count: usize,
        recv: &mut [u8],
        counts: &[Count],
        displs: &[Count],
        dtype: DataType,
        root: Rank,
    ) -> Result<()>;

    fn allgather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()>;

    fn allgatherv(
        &mut self,
        send: &[u8],
        send_count: usize,
        recv: &mut [u8],
        counts: &[Count],
        displs: &[Count],
        dtype: DataType,
    ) -> Result<()>;

    /// All-gather where each rank's contribution already sits in `buf` at
    /// `displs[rank]`.
    fn allgatherv_in_place(
        &mut self,
        buf: &mut [u8],
        counts: &[Count],
        displs: &[Count],
        dtype: DataType,
    ) -> Result<()>;

    fn alltoall(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()>;

    fn alltoallv(
        &mut self,
        send: &[u8],
        send_counts: &[Count],
        send_displs: &[Count],
        recv: &mut [u8],
        recv_counts: &[Count],
        recv_displs: &[Count],
        dtype: DataType,
    ) -> Result<()>;

    fn reduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    ) -> Result<()>;

    fn allreduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()>;

    /// Reduce, then leave `recv_counts[r]` elements of the result on rank `r`.
    fn reduce_scatter(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        recv_counts: &[Count],
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()>;

    fn reduce_scatter_block(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        recv_count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()>;

    /// Inclusive prefix reduction.
    fn scan(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()>;

    /// Exclusive prefix reduction. `recv` is left untouched on rank 0.
    fn exscan(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()>;

    /// Local `inout = inout op input`, no communication.
    fn reduce_local(
        &self,
        input: &[u8],
        inout: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        reduce_slice(inout, input, count, dtype, op)
    }
}

/// `len` bytes of `buf` starting at byte `start`.
pub(crate) fn span(buf: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    buf.get(start..start + len)
        .ok_or(TuneError::BufferSizeMismatch {
            expected: start + len,
            actual: buf.len(),
        })
}

pub(crate) fn span_mut(buf: &mut [u8], start: usize, len: usize) -> Result<&mut [u8]> {
    let actual = buf.len();
    buf.get_mut(start..start + len)
        .ok_or(TuneError::BufferSizeMismatch {
            expected: start + len,
            actual,
        })
}

/// Copy a block whose length must match the destination exactly.
pub(crate) fn copy_block(dst: &mut [u8], src: &[u8]) -> Result<()> {
    if dst.len() != src.len() {
        return Err(TuneError::BufferSizeMismatch {
            expected: dst.len(),
            actual: src.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

pub(crate) fn check_root(root: Rank, size: u32) -> Result<()> {
    if root >= size {
        return Err(TuneError::InvalidRank {
            rank: root,
            group_size: size,
        });
    }
    Ok(())
}

/// `n` as a metadata count; fails when it does not fit.
pub(crate) fn to_count(n: usize) -> Result<Count> {
    Count::try_from(n).map_err(|_| TuneError::InvalidMessageSize { size: n as u64 })
}

pub(crate) fn check_counts(counts: &[Count], displs: &[Count], size: u32) -> Result<()> {
    let size = size as usize;
    if counts.len() < size || displs.len() < size {
        return Err(TuneError::BufferSizeMismatch {
            expected: size,
            actual: counts.len().min(displs.len()),
        });
    }
    Ok(())
}
