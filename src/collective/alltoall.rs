use crate::arena::{BufferArena, Slot};
use crate::catalog::collective_module;
use crate::collective::helpers::{group_size, uniform_layout};
use crate::comm::Communicator;
use crate::error::Result;
use crate::types::{CollectiveOp, Count, DataType};

collective_module! {
    /// Alltoall algorithms.
    AlltoallModule => AlltoallAlgorithm {
        op: CollectiveOp::Alltoall,
        rooted: false,
        Default = 0 => "default",
        AsAlltoallv = 1 => "alltoall_as_alltoallv",
    }
}

pub(crate) fn as_alltoallv(
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

    comm.alltoallv(send, counts, displs, recv, counts, displs, dtype)
}
