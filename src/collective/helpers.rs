use crate::comm::{Communicator, to_count};
use crate::error::Result;
use crate::types::{Count, DataType};

/// Elements needed to round `count` up to a multiple of `parts`.
pub(crate) fn padding_elems(count: usize, parts: usize) -> usize {
    match count % parts {
        0 => 0,
        rem => parts - rem,
    }
}

pub(crate) fn padded_count(count: usize, parts: usize) -> usize {
    count + padding_elems(count, parts)
}

/// Fill elements `count..padded` of `buf` with copies of element 0.
pub(crate) fn pad_with_first(buf: &mut [u8], count: usize, padded: usize, extent: usize) {
    if count == 0 {
        return;
    }
    for i in count..padded {
        buf.copy_within(0..extent, i * extent);
    }
}

/// Round-robin assignment of `chunk`-element pieces of `count` elements.
///
/// Whole chunks go to ranks 0, 1, ... in turn; the remainder lands on the
/// rank that would have received the next chunk.
pub(crate) fn round_robin_counts(
    counts: &mut [Count],
    count: usize,
    chunk: usize,
) -> Result<()> {
    to_count(count)?;
    let parts = counts.len();
    let chunk = chunk.max(1);
    let nchunks = count / chunk;
    let boundary = nchunks % parts;
    for (i, c) in counts.iter_mut().enumerate() {
        let mut n = chunk * (nchunks / parts);
        if i < boundary {
            n += chunk;
        } else if i == boundary {
            n += count % chunk;
        }
        *c = to_count(n)?;
    }
    Ok(())
}

/// Exclusive prefix sums of `counts`.
pub(crate) fn displacements(counts: &[Count], displs: &mut [Count]) {
    let mut offset = 0;
    for (d, &c) in displs.iter_mut().zip(counts) {
        *d = offset;
        offset += c;
    }
}

/// `count` elements per rank, laid out back to back.
pub(crate) fn uniform_layout(
    counts: &mut [Count],
    displs: &mut [Count],
    count: usize,
) -> Result<()> {
    for (i, (c, d)) in counts.iter_mut().zip(displs.iter_mut()).enumerate() {
        *c = to_count(count)?;
        *d = to_count(i * count)?;
    }
    Ok(())
}

/// Bytes of `count` elements of `dtype`.
pub(crate) fn bytes(count: usize, dtype: DataType) -> usize {
    count * dtype.size_in_bytes()
}

pub(crate) fn group_size(comm: &dyn Communicator) -> usize {
    comm.size() as usize
}
