use crate::catalog::collective_module;
use crate::collective::helpers::bytes;
use crate::comm::{Communicator, span, span_mut};
use crate::error::Result;
use crate::types::{CollectiveOp, DataType, ReduceOp};

collective_module! {
    /// Inclusive scan algorithms.
    ScanModule => ScanAlgorithm {
        op: CollectiveOp::Scan,
        rooted: false,
        Default = 0 => "default",
        AsExscanReduceLocal = 1 => "scan_as_exscan_reducelocal",
    }
}

/// Exclusive scan, then fold in the local contribution.
pub(crate) fn as_exscan_reduce_local(
    comm: &mut dyn Communicator,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    let n = bytes(count, dtype);
    let own = span(send, 0, n)?;
    span(recv, 0, n)?;

    comm.exscan(send, recv, count, dtype, op)?;
    if comm.rank() == 0 {
        span_mut(recv, 0, n)?.copy_from_slice(own);
        Ok(())
    } else {
        comm.reduce_local(send, recv, count, dtype, op)
    }
}
