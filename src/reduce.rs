//! Element-wise reduction kernels over byte slices, used by the in-process
//! transport and by `Communicator::reduce_local`.

use crate::error::{Result, TuneError};
use crate::types::{DataType, ReduceOp};

/// Trait for element types that can be combined by a [`ReduceOp`].
///
/// Returns `None` when the operation is not defined for the type.
pub(crate) trait Reducible: Copy + 'static {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Option<Self>;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Option<Self> {
                    Some(match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                        ReduceOp::BitOr => a | b,
                    })
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Option<Self> {
                    match op {
                        ReduceOp::Sum => Some(a + b),
                        ReduceOp::Prod => Some(a * b),
                        ReduceOp::Min => Some(a.min(b)),
                        ReduceOp::Max => Some(a.max(b)),
                        ReduceOp::BitOr => None,
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i32, i64, u8, u32, u64);
impl_reducible!(float: f32, f64);

/// Check that `op` is defined for `dtype` before any data moves.
pub fn check_reducible(dtype: DataType, op: ReduceOp) -> Result<()> {
    if op == ReduceOp::BitOr && !dtype.is_integer() {
        return Err(TuneError::UnsupportedDType { dtype, op: "bor" });
    }
    Ok(())
}

/// Element-wise `dst = dst op src` on byte slices interpreted as `dtype`.
///
/// Both slices must hold at least `count * dtype.size_in_bytes()` bytes.
pub fn reduce_slice(
    dst: &mut [u8],
    src: &[u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    check_reducible(dtype, op)?;
    let needed = count * dtype.size_in_bytes();
    if dst.len() < needed || src.len() < needed {
        return Err(TuneError::BufferSizeMismatch {
            expected: needed,
            actual: dst.len().min(src.len()),
        });
    }
    match dtype {
        DataType::F32 => reduce_slice_typed::<f32>(dst, src, count, dtype, op),
        DataType::F64 => reduce_slice_typed::<f64>(dst, src, count, dtype, op),
        DataType::I32 => reduce_slice_typed::<i32>(dst, src, count, dtype, op),
        DataType::I64 => reduce_slice_typed::<i64>(dst, src, count, dtype, op),
        DataType::U32 => reduce_slice_typed::<u32>(dst, src, count, dtype, op),
        DataType::U64 => reduce_slice_typed::<u64>(dst, src, count, dtype, op),
        DataType::I8 => reduce_slice_typed::<i8>(dst, src, count, dtype, op),
        DataType::U8 => reduce_slice_typed::<u8>(dst, src, count, dtype, op),
    }
}

/// Alignment-safe little-endian element access.
trait LeBytes: Sized {
    const SIZE: usize;
    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_le_bytes {
    ($($ty:ty),*) => {
        $(
            impl LeBytes for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_le_bytes(raw)
                }
                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_le_bytes!(i8, i32, i64, u8, u32, u64, f32, f64);

fn reduce_slice_typed<T: Reducible + LeBytes>(
    dst: &mut [u8],
    src: &[u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    let t_size = T::SIZE;
    for i in 0..count {
        let off = i * t_size;
        let a = T::read_le(&dst[off..off + t_size]);
        let b = T::read_le(&src[off..off + t_size]);
        let r = T::reduce(a, b, op).ok_or(TuneError::UnsupportedDType {
            dtype,
            op: "reduce",
        })?;
        r.write_le(&mut dst[off..off + t_size]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_bytes(v: &[f64]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn test_reduce_slice_sum_f64() {
        let mut dst = f64_bytes(&[1.0, 2.0, 3.0, 4.0]);
        let src = f64_bytes(&[10.0, 20.0, 30.0, 40.0]);
        reduce_slice(&mut dst, &src, 4, DataType::F64, ReduceOp::Sum).unwrap();
        assert_eq!(dst, f64_bytes(&[11.0, 22.0, 33.0, 44.0]));
    }

    #[test]
    fn test_reduce_slice_min_max_i32() {
        let a: Vec<u8> = [5i32, -3, 7].iter().flat_map(|x| x.to_le_bytes()).collect();
        let b: Vec<u8> = [2i32, 9, 7].iter().flat_map(|x| x.to_le_bytes()).collect();

        let mut min = a.clone();
        reduce_slice(&mut min, &b, 3, DataType::I32, ReduceOp::Min).unwrap();
        let expected: Vec<u8> = [2i32, -3, 7].iter().flat_map(|x| x.to_le_bytes()).collect();
        assert_eq!(min, expected);

        let mut max = a;
        reduce_slice(&mut max, &b, 3, DataType::I32, ReduceOp::Max).unwrap();
        let expected: Vec<u8> = [5i32, 9, 7].iter().flat_map(|x| x.to_le_bytes()).collect();
        assert_eq!(max, expected);
    }

    #[test]
    fn test_reduce_slice_bitor_bytes() {
        let mut dst = vec![0b0001u8, 0, 0xF0];
        let src = vec![0b0100u8, 0, 0x0F];
        reduce_slice(&mut dst, &src, 3, DataType::U8, ReduceOp::BitOr).unwrap();
        assert_eq!(dst, vec![0b0101, 0, 0xFF]);
    }

    #[test]
    fn test_bitor_rejected_for_floats() {
        let mut dst = vec![0u8; 8];
        let src = vec![0u8; 8];
        let err = reduce_slice(&mut dst, &src, 2, DataType::F32, ReduceOp::BitOr).unwrap_err();
        assert!(matches!(err, TuneError::UnsupportedDType { .. }));
        assert!(check_reducible(DataType::F64, ReduceOp::BitOr).is_err());
        assert!(check_reducible(DataType::U64, ReduceOp::BitOr).is_ok());
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut dst = vec![0u8; 4];
        let src = vec![0u8; 8];
        let err = reduce_slice(&mut dst, &src, 2, DataType::I32, ReduceOp::Sum).unwrap_err();
        assert!(matches!(
            err,
            TuneError::BufferSizeMismatch {
                expected: 8,
                actual: 4
            }
        ));
    }
}
