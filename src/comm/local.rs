use super::{Communicator, check_counts, check_root, copy_block, span, span_mut, to_count};
use crate::error::{Result, TuneError};
use crate::reduce::{check_reducible, reduce_slice};
use crate::types::{Count, DataType, Rank, ReduceOp};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// In-process group member.
///
/// Ranks are connected pairwise by unbounded FIFO channels, so sends never
/// block and messages between two ranks arrive in order. Receives block the
/// calling thread; endpoints must be driven from plain threads, not from
/// inside an async runtime.
///
/// Native collectives are linear and deterministic. Reductions always fold
/// contributions in ascending rank order.
#[derive(Debug)]
pub struct LocalComm {
    rank: Rank,
    size: u32,
    outbox: Vec<UnboundedSender<Vec<u8>>>,
    inbox: Vec<UnboundedReceiver<Vec<u8>>>,
}

impl LocalComm {
    /// Build `size` connected endpoints, indexed by rank.
    pub fn group(size: u32) -> Vec<LocalComm> {
        let n = size as usize;
        let mut outboxes: Vec<Vec<UnboundedSender<Vec<u8>>>> =
            (0..n).map(|_| Vec::with_capacity(n)).collect();
        let mut inboxes: Vec<Vec<Option<UnboundedReceiver<Vec<u8>>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();

        for (src, outbox) in outboxes.iter_mut().enumerate() {
            for inbox in inboxes.iter_mut() {
                let (tx, rx) = unbounded_channel();
                outbox.push(tx);
                inbox[src] = Some(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalComm {
                rank: rank as Rank,
                size,
                outbox,
                inbox: inbox.into_iter().flatten().collect(),
            })
            .collect()
    }

    /// Every other rank, ascending. Holds no borrow of `self`.
    fn peers(&self) -> impl Iterator<Item = Rank> + use<> {
        let me = self.rank;
        (0..self.size).filter(move |&r| r != me)
    }

    fn recv_vec(&mut self, src: Rank, operation: &'static str) -> Result<Vec<u8>> {
        let rx = self
            .inbox
            .get_mut(src as usize)
            .ok_or(TuneError::InvalidRank {
                rank: src,
                group_size: self.size,
            })?;
        rx.blocking_recv().ok_or(TuneError::CollectiveFailed {
            operation,
            rank: src,
            reason: "peer endpoint dropped".into(),
        })
    }

    fn recv_exact(&mut self, src: Rank, buf: &mut [u8], operation: &'static str) -> Result<()> {
        let data = self.recv_vec(src, operation)?;
        if data.len() != buf.len() {
            return Err(TuneError::BufferSizeMismatch {
                expected: buf.len(),
                actual: data.len(),
            });
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    /// Fold one contribution per rank in `sources`, taking
    /// `own` for this rank and receiving the rest.
    fn fold_from(
        &mut self,
        sources: std::ops::Range<Rank>,
        own: &[u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        operation: &'static str,
    ) -> Result<Option<Vec<u8>>> {
        let mut acc: Option<Vec<u8>> = None;
        for src in sources {
            let contribution = if src == self.rank {
                own.to_vec()
            } else {
                let data = self.recv_vec(src, operation)?;
                if data.len() != own.len() {
                    return Err(TuneError::BufferSizeMismatch {
                        expected: own.len(),
                        actual: data.len(),
                    });
                }
                data
            };
            match acc.as_mut() {
                None => acc = Some(contribution),
                Some(a) => reduce_slice(a, &contribution, count, dtype, op)?,
            }
        }
        Ok(acc)
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn send(&mut self, dest: Rank, data: &[u8]) -> Result<()> {
        let tx = self
            .outbox
            .get(dest as usize)
            .ok_or(TuneError::InvalidRank {
                rank: dest,
                group_size: self.size,
            })?;
        tx.send(data.to_vec())
            .map_err(|e| TuneError::transport_with_source(format!("send to rank {dest}"), e))
    }

    fn recv(&mut self, src: Rank, buf: &mut [u8]) -> Result<()> {
        self.recv_exact(src, buf, "recv")
    }

    fn bcast(&mut self, buf: &mut [u8], count: usize, dtype: DataType, root: Rank) -> Result<()> {
        check_root(root, self.size)?;
        let n = count * dtype.size_in_bytes();
        if self.rank == root {
            let data = span(buf, 0, n)?;
            for dest in self.peers() {
                self.send(dest, data)?;
            }
            Ok(())
        } else {
            self.recv_exact(root, span_mut(buf, 0, n)?, "bcast")
        }
    }

    fn scatter(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size)?;
        let n = count * dtype.size_in_bytes();
        if self.rank == root {
            for dest in 0..self.size {
                let block = span(send, dest as usize * n, n)?;
                if dest == root {
                    span_mut(recv, 0, n)?.copy_from_slice(block);
                } else {
                    self.send(dest, block)?;
                }
            }
            Ok(())
        } else {
            self.recv_exact(root, span_mut(recv, 0, n)?, "scatter")
        }
    }

    fn scatterv(
        &mut self,
        send: &[u8],
        counts: &[Count],
        displs: &[Count],
        recv: &mut [u8],
        recv_count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size)?;
        let ext = dtype.size_in_bytes();
        let n = recv_count * ext;
        if self.rank == root {
            check_counts(counts, displs, self.size)?;
            for dest in 0..self.size {
                let d = dest as usize;
                let block = span(send, displs[d] as usize * ext, counts[d] as usize * ext)?;
                if dest == root {
                    copy_block(span_mut(recv, 0, n)?, block)?;
                } else {
                    self.send(dest, block)?;
                }
            }
            Ok(())
        } else {
            self.recv_exact(root, span_mut(recv, 0, n)?, "scatterv")
        }
    }

    fn gather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size)?;
        let n = count * dtype.size_in_bytes();
        let own = span(send, 0, n)?;
        if self.rank != root {
            return self.send(root, own);
        }
        for src in 0..self.size {
            let slot = span_mut(recv, src as usize * n, n)?;
            if src == root {
                slot.copy_from_slice(own);
            } else {
                self.recv_exact(src, slot, "gather")?;
            }
        }
        Ok(())
    }

    fn gatherv(
        &mut self,
        send: &[u8],
        send_count: usize,
        recv: &mut [u8],
        counts: &[Count],
        displs: &[Count],
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size)?;
        let ext = dtype.size_in_bytes();
        let own = span(send, 0, send_count * ext)?;
        if self.rank != root {
            return self.send(root, own);
        }
        check_counts(counts, displs, self.size)?;
        for src in 0..self.size {
            let s = src as usize;
            let slot = span_mut(recv, displs[s] as usize * ext, counts[s] as usize * ext)?;
            if src == root {
                copy_block(slot, own)?;
            } else {
                self.recv_exact(src, slot, "gatherv")?;
            }
        }
        Ok(())
    }

    fn allgather(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()> {
        let n = count * dtype.size_in_bytes();
        let own = span(send, 0, n)?;
        for dest in self.peers() {
            self.send(dest, own)?;
        }
        for src in 0..self.size {
            let slot = span_mut(recv, src as usize * n, n)?;
            if src == self.rank {
                slot.copy_from_slice(own);
            } else {
                self.recv_exact(src, slot, "allgather")?;
            }
        }
        Ok(())
    }

    fn allgatherv(
        &mut self,
        send: &[u8],
        send_count: usize,
        recv: &mut [u8],
        counts: &[Count],
        displs: &[Count],
        dtype: DataType,
    ) -> Result<()> {
        check_counts(counts, displs, self.size)?;
        let ext = dtype.size_in_bytes();
        let own = span(send, 0, send_count * ext)?;
        for dest in self.peers() {
            self.send(dest, own)?;
        }
        for src in 0..self.size {
            let s = src as usize;
            let slot = span_mut(recv, displs[s] as usize * ext, counts[s] as usize * ext)?;
            if src == self.rank {
                copy_block(slot, own)?;
            } else {
                self.recv_exact(src, slot, "allgatherv")?;
            }
        }
        Ok(())
    }

    fn allgatherv_in_place(
        &mut self,
        buf: &mut [u8],
        counts: &[Count],
        displs: &[Count],
        dtype: DataType,
    ) -> Result<()> {
        check_counts(counts, displs, self.size)?;
        let ext = dtype.size_in_bytes();
        let me = self.rank as usize;
        let own = span(buf, displs[me] as usize * ext, counts[me] as usize * ext)?.to_vec();
        for dest in self.peers() {
            self.send(dest, &own)?;
        }
        for src in self.peers() {
            let s = src as usize;
            let slot = span_mut(buf, displs[s] as usize * ext, counts[s] as usize * ext)?;
            self.recv_exact(src, slot, "allgatherv")?;
        }
        Ok(())
    }

    fn alltoall(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
    ) -> Result<()> {
        let n = count * dtype.size_in_bytes();
        for dest in self.peers() {
            self.send(dest, span(send, dest as usize * n, n)?)?;
        }
        for src in 0..self.size {
            let slot = span_mut(recv, src as usize * n, n)?;
            if src == self.rank {
                slot.copy_from_slice(span(send, src as usize * n, n)?);
            } else {
                self.recv_exact(src, slot, "alltoall")?;
            }
        }
        Ok(())
    }

    fn alltoallv(
        &mut self,
        send: &[u8],
        send_counts: &[Count],
        send_displs: &[Count],
        recv: &mut [u8],
        recv_counts: &[Count],
        recv_displs: &[Count],
        dtype: DataType,
    ) -> Result<()> {
        check_counts(send_counts, send_displs, self.size)?;
        check_counts(recv_counts, recv_displs, self.size)?;
        let ext = dtype.size_in_bytes();
        for dest in self.peers() {
            let d = dest as usize;
            let block = span(send, send_displs[d] as usize * ext, send_counts[d] as usize * ext)?;
            self.send(dest, block)?;
        }
        for src in 0..self.size {
            let s = src as usize;
            let slot = span_mut(
                recv,
                recv_displs[s] as usize * ext,
                recv_counts[s] as usize * ext,
            )?;
            if src == self.rank {
                let own = span(send, send_displs[s] as usize * ext, send_counts[s] as usize * ext)?;
                copy_block(slot, own)?;
            } else {
                self.recv_exact(src, slot, "alltoallv")?;
            }
        }
        Ok(())
    }

    fn reduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        check_root(root, self.size)?;
        check_reducible(dtype, op)?;
        let n = count * dtype.size_in_bytes();
        let own = span(send, 0, n)?;
        if self.rank != root {
            return self.send(root, own);
        }
        let acc = self.fold_from(0..self.size, own, count, dtype, op, "reduce")?;
        if let Some(acc) = acc {
            span_mut(recv, 0, n)?.copy_from_slice(&acc);
        }
        Ok(())
    }

    fn allreduce(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        self.reduce(send, recv, count, dtype, op, 0)?;
        self.bcast(recv, count, dtype, 0)
    }

    fn reduce_scatter(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        recv_counts: &[Count],
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        check_reducible(dtype, op)?;
        let size = self.size as usize;
        if recv_counts.len() < size {
            return Err(TuneError::BufferSizeMismatch {
                expected: size,
                actual: recv_counts.len(),
            });
        }
        let ext = dtype.size_in_bytes();
        let mut offset = 0;
        let mut own_range = 0..0;
        for (dest, &c) in recv_counts.iter().take(size).enumerate() {
            let len = c as usize * ext;
            if dest == self.rank as usize {
                own_range = offset..offset + len;
            } else {
                self.send(dest as Rank, span(send, offset, len)?)?;
            }
            offset += len;
        }
        let own = span(send, own_range.start, own_range.len())?;
        let count = recv_counts[self.rank as usize] as usize;
        let acc = self.fold_from(0..self.size, own, count, dtype, op, "reduce_scatter")?;
        if let Some(acc) = acc {
            span_mut(recv, 0, acc.len())?.copy_from_slice(&acc);
        }
        Ok(())
    }

    fn reduce_scatter_block(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        recv_count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        let counts = vec![to_count(recv_count)?; self.size as usize];
        self.reduce_scatter(send, recv, &counts, dtype, op)
    }

    fn scan(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        check_reducible(dtype, op)?;
        let n = count * dtype.size_in_bytes();
        let own = span(send, 0, n)?;
        for dest in self.rank + 1..self.size {
            self.send(dest, own)?;
        }
        let acc = self.fold_from(0..self.rank + 1, own, count, dtype, op, "scan")?;
        if let Some(acc) = acc {
            span_mut(recv, 0, n)?.copy_from_slice(&acc);
        }
        Ok(())
    }

    fn exscan(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        check_reducible(dtype, op)?;
        let n = count * dtype.size_in_bytes();
        let own = span(send, 0, n)?;
        for dest in self.rank + 1..self.size {
            self.send(dest, own)?;
        }
        let acc = self.fold_from(0..self.rank, own, count, dtype, op, "exscan")?;
        if let Some(acc) = acc {
            span_mut(recv, 0, n)?.copy_from_slice(&acc);
        }
        Ok(())
    }
}
