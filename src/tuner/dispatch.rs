//! Per-operation entry points.
//!
//! Each call picks an algorithm id, runs the matching decomposition, and
//! runs the native operation instead when the id is the default, is unknown,
//! or the decomposition failed. The id that actually produced the result is
//! recorded.
//!
//! Caller buffers are measured before any of that, so a decomposition only
//! fails for reasons every rank shares and all ranks fall back together.

use super::Tuner;
use crate::collective::{
    AllgatherAlgorithm, AllreduceAlgorithm, AlltoallAlgorithm, BcastAlgorithm, GatherAlgorithm,
    ReduceAlgorithm, ReduceScatterBlockAlgorithm, ScanAlgorithm, ScatterAlgorithm, allgather,
    allreduce, alltoall, bcast, gather, reduce, reduce_scatter_block, scan, scatter,
};
use crate::collective::helpers::bytes;
use crate::comm::{Communicator, check_root};
use crate::error::{Result, TuneError};
use crate::types::{AlgorithmId, CollectiveOp, DEFAULT_ALGORITHM, DataType, Rank, ReduceOp};
use tracing::{debug, warn};

/// Selection and telemetry key for `count` elements of `dtype`.
fn message_size(count: usize, dtype: DataType) -> u64 {
    (count * dtype.size_in_bytes()) as u64
}

fn resolve<A>(op: CollectiveOp, id: AlgorithmId, from_id: fn(AlgorithmId) -> Option<A>) -> Option<A> {
    let alg = from_id(id);
    if alg.is_none() {
        warn!(%op, alg = id, "unknown algorithm id, running default");
    }
    alg
}

/// Id that produced the result: `id` when the decomposition succeeded,
/// otherwise the default, which the caller must then run.
fn settle(op: CollectiveOp, id: AlgorithmId, attempt: Option<Result<()>>) -> AlgorithmId {
    match attempt {
        Some(Ok(())) => id,
        Some(Err(e)) => {
            debug!(%op, alg = id, "decomposition failed, falling back to default: {e}");
            DEFAULT_ALGORITHM
        }
        None => DEFAULT_ALGORITHM,
    }
}

/// Caller buffers measured against what one call needs on this rank.
///
/// A buffer that is too short is replaced by a zeroed stand-in of the
/// required length, so the rank still takes part in the collective and its
/// peers complete. The first mismatch is returned once the call is done and
/// the caller's own buffers are left untouched.
struct Shortfall {
    op: CollectiveOp,
    first: Option<TuneError>,
}

impl Shortfall {
    fn new(op: CollectiveOp) -> Self {
        Self { op, first: None }
    }

    fn input<'a>(&mut self, buf: &'a [u8], need: usize, fill: &'a mut Vec<u8>) -> &'a [u8] {
        if buf.len() >= need {
            return buf;
        }
        self.note(need, buf.len());
        fill.resize(need, 0);
        fill.as_slice()
    }

    fn output<'a>(
        &mut self,
        buf: &'a mut [u8],
        need: usize,
        fill: &'a mut Vec<u8>,
    ) -> &'a mut [u8] {
        if buf.len() >= need {
            return buf;
        }
        self.note(need, buf.len());
        fill.resize(need, 0);
        fill.as_mut_slice()
    }

    fn note(&mut self, expected: usize, actual: usize) {
        warn!(op = %self.op, expected, actual, "caller buffer too short, running with a stand-in");
        self.first
            .get_or_insert(TuneError::BufferSizeMismatch { expected, actual });
    }

    fn finish(self, outcome: Result<()>) -> Result<()> {
        outcome?;
        self.first.map_or(Ok(()), Err)
    }
}

impl<C: Communicator> Tuner<C> {
    /// `buf` holds `count` elements on every rank.
    pub fn bcast(&mut self, buf: &mut [u8], count: usize, dtype: DataType, root: Rank) -> Result<()> {
        check_root(root, self.size())?;
        let n = bytes(count, dtype);

        let mut short = Shortfall::new(CollectiveOp::Bcast);
        let mut buf_fill = Vec::new();
        let buf = short.output(buf, n, &mut buf_fill);

        let outcome = self.run_bcast(buf, count, dtype, root);
        short.finish(outcome)
    }

    /// `send` holds `size * count` elements at the root and may be empty
    /// elsewhere.
    pub fn scatter(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size())?;
        let n = bytes(count, dtype);
        let at_root = self.rank() == root;

        let mut short = Shortfall::new(CollectiveOp::Scatter);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, if at_root { self.span_of(n) } else { 0 }, &mut send_fill);
        let recv = short.output(recv, n, &mut recv_fill);

        let outcome = self.run_scatter(send, recv, count, dtype, root);
        short.finish(outcome)
    }

    /// `recv` holds `size * count` elements at the root and may be empty
    /// elsewhere.
    pub fn gather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size())?;
        let n = bytes(count, dtype);
        let at_root = self.rank() == root;

        let mut short = Shortfall::new(CollectiveOp::Gather);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, n, &mut send_fill);
        let recv = short.output(recv, if at_root { self.span_of(n) } else { 0 }, &mut recv_fill);

        let outcome = self.run_gather(send, recv, count, dtype, root);
        short.finish(outcome)
    }

    pub fn allgather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()> {
        let n = bytes(count, dtype);

        let mut short = Shortfall::new(CollectiveOp::Allgather);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, n, &mut send_fill);
        let recv = short.output(recv, self.span_of(n), &mut recv_fill);

        let outcome = self.run_allgather(send, recv, count, dtype);
        short.finish(outcome)
    }

    /// Both buffers hold `size * count` elements.
    pub fn alltoall(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()> {
        let total = self.span_of(bytes(count, dtype));

        let mut short = Shortfall::new(CollectiveOp::Alltoall);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, total, &mut send_fill);
        let recv = short.output(recv, total, &mut recv_fill);

        let outcome = self.run_alltoall(send, recv, count, dtype);
        short.finish(outcome)
    }

    /// `recv` holds `count` elements at the root and may be empty elsewhere.
    pub fn reduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size())?;
        let n = bytes(count, dtype);
        let at_root = self.rank() == root;

        let mut short = Shortfall::new(CollectiveOp::Reduce);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, n, &mut send_fill);
        let recv = short.output(recv, if at_root { n } else { 0 }, &mut recv_fill);

        let outcome = self.run_reduce(send, recv, count, dtype, reduce_op, root);
        short.finish(outcome)
    }

    pub fn allreduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
    ) -> Result<()> {
        let n = bytes(count, dtype);

        let mut short = Shortfall::new(CollectiveOp::Allreduce);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, n, &mut send_fill);
        let recv = short.output(recv, n, &mut recv_fill);

        let outcome = self.run_allreduce(send, recv, count, dtype, reduce_op);
        short.finish(outcome)
    }

    /// `send` holds `size * recv_count` elements; each rank keeps its
    /// `recv_count`-element block of the reduction.
    pub fn reduce_scatter_block(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        recv_count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
    ) -> Result<()> {
        let n = bytes(recv_count, dtype);

        let mut short = Shortfall::new(CollectiveOp::ReduceScatterBlock);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, self.span_of(n), &mut send_fill);
        let recv = short.output(recv, n, &mut recv_fill);

        let outcome = self.run_reduce_scatter_block(send, recv, recv_count, dtype, reduce_op);
        short.finish(outcome)
    }

    pub fn scan(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
    ) -> Result<()> {
        let n = bytes(count, dtype);

        let mut short = Shortfall::new(CollectiveOp::Scan);
        let (mut send_fill, mut recv_fill) = (Vec::new(), Vec::new());
        let send = short.input(send, n, &mut send_fill);
        let recv = short.output(recv, n, &mut recv_fill);

        let outcome = self.run_scan(send, recv, count, dtype, reduce_op);
        short.finish(outcome)
    }

    /// One `block`-byte block per rank.
    fn span_of(&self, block: usize) -> usize {
        self.size() as usize * block
    }

    fn run_bcast(&mut self, buf: &mut [u8], count: usize, dtype: DataType, root: Rank) -> Result<()> {
        let op = CollectiveOp::Bcast;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, BcastAlgorithm::from_id) {
            Some(BcastAlgorithm::AsAllgatherv) => {
                Some(bcast::as_allgatherv(comm, arena, buf, count, dtype, root))
            }
            Some(BcastAlgorithm::AsScatterAllgather) => {
                Some(bcast::as_scatter_allgather(comm, arena, buf, count, dtype, root))
            }
            Some(BcastAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.bcast(buf, count, dtype, root)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_scatter(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        let op = CollectiveOp::Scatter;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, ScatterAlgorithm::from_id) {
            Some(ScatterAlgorithm::AsBcast) => {
                Some(scatter::as_bcast(comm, arena, send, recv, count, dtype, root))
            }
            Some(ScatterAlgorithm::AsScatterv) => {
                Some(scatter::as_scatterv(comm, arena, send, recv, count, dtype, root))
            }
            Some(ScatterAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.scatter(send, recv, count, dtype, root)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_gather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        let op = CollectiveOp::Gather;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, GatherAlgorithm::from_id) {
            Some(GatherAlgorithm::AsAllgather) => {
                Some(gather::as_allgather(comm, arena, send, recv, count, dtype, root))
            }
            Some(GatherAlgorithm::AsGatherv) => {
                Some(gather::as_gatherv(comm, arena, send, recv, count, dtype, root))
            }
            Some(GatherAlgorithm::AsReduce) => {
                Some(gather::as_reduce(comm, arena, send, recv, count, dtype, root))
            }
            Some(GatherAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.gather(send, recv, count, dtype, root)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_allgather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()> {
        let op = CollectiveOp::Allgather;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, AllgatherAlgorithm::from_id) {
            Some(AllgatherAlgorithm::AsAllgatherv) => {
                Some(allgather::as_allgatherv(comm, arena, send, recv, count, dtype))
            }
            Some(AllgatherAlgorithm::AsAllreduce) => {
                Some(allgather::as_allreduce(comm, arena, send, recv, count, dtype))
            }
            Some(AllgatherAlgorithm::AsAlltoall) => {
                Some(allgather::as_alltoall(comm, arena, send, recv, count, dtype))
            }
            Some(AllgatherAlgorithm::AsGatherBcast) => {
                Some(allgather::as_gather_bcast(comm, send, recv, count, dtype))
            }
            Some(AllgatherAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.allgather(send, recv, count, dtype)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_alltoall(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()> {
        let op = CollectiveOp::Alltoall;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, AlltoallAlgorithm::from_id) {
            Some(AlltoallAlgorithm::AsAlltoallv) => {
                Some(alltoall::as_alltoallv(comm, arena, send, recv, count, dtype))
            }
            Some(AlltoallAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.alltoall(send, recv, count, dtype)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_reduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        let op = CollectiveOp::Reduce;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);
        let min_chunk = self.config.min_scatter_chunk;

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, ReduceAlgorithm::from_id) {
            Some(ReduceAlgorithm::AsAllreduce) => Some(reduce::as_allreduce(
                comm, arena, send, recv, count, dtype, reduce_op, root,
            )),
            Some(ReduceAlgorithm::AsReduceScatterBlockGather) => {
                Some(reduce::as_reduce_scatter_block_gather(
                    comm, arena, send, recv, count, dtype, reduce_op, root,
                ))
            }
            Some(ReduceAlgorithm::AsReduceScatterGatherv) => {
                Some(reduce::as_reduce_scatter_gatherv(
                    comm, arena, send, recv, count, dtype, reduce_op, root, min_chunk,
                ))
            }
            Some(ReduceAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.reduce(send, recv, count, dtype, reduce_op, root)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_allreduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
    ) -> Result<()> {
        let op = CollectiveOp::Allreduce;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);
        let min_chunk = self.config.min_scatter_chunk;

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, AllreduceAlgorithm::from_id) {
            Some(AllreduceAlgorithm::AsReduceBcast) => Some(allreduce::as_reduce_bcast(
                comm, send, recv, count, dtype, reduce_op,
            )),
            Some(AllreduceAlgorithm::AsReduceScatterBlockAllgather) => {
                Some(allreduce::as_reduce_scatter_block_allgather(
                    comm, arena, send, recv, count, dtype, reduce_op,
                ))
            }
            Some(AllreduceAlgorithm::AsReduceScatterAllgatherv) => {
                Some(allreduce::as_reduce_scatter_allgatherv(
                    comm, arena, send, recv, count, dtype, reduce_op, min_chunk,
                ))
            }
            Some(AllreduceAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.allreduce(send, recv, count, dtype, reduce_op)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_reduce_scatter_block(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        recv_count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
    ) -> Result<()> {
        let op = CollectiveOp::ReduceScatterBlock;
        let msg_size = message_size(recv_count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let arena = &mut self.arena;
        let attempt = match resolve(op, id, ReduceScatterBlockAlgorithm::from_id) {
            Some(ReduceScatterBlockAlgorithm::AsReduceScatter) => {
                Some(reduce_scatter_block::as_reduce_scatter(
                    comm, arena, send, recv, recv_count, dtype, reduce_op,
                ))
            }
            Some(ReduceScatterBlockAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm
                .reduce_scatter_block(send, recv, recv_count, dtype, reduce_op)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }

    fn run_scan(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        reduce_op: ReduceOp,
    ) -> Result<()> {
        let op = CollectiveOp::Scan;
        let msg_size = message_size(count, dtype);
        let id = self.select(op, msg_size);

        let comm: &mut dyn Communicator = &mut self.comm;
        let attempt = match resolve(op, id, ScanAlgorithm::from_id) {
            Some(ScanAlgorithm::AsExscanReduceLocal) => Some(scan::as_exscan_reduce_local(
                comm, send, recv, count, dtype, reduce_op,
            )),
            Some(ScanAlgorithm::Default) | None => None,
        };

        let used = settle(op, id, attempt);
        if used == DEFAULT_ALGORITHM {
            self.comm.scan(send, recv, count, dtype, reduce_op)?;
        }
        self.record(op, msg_size, used);
        Ok(())
    }
}
