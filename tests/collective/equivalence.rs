//! Every cataloged algorithm must produce exactly the bytes the native
//! operation produces.

use pgtune::{Catalog, CollectiveOp, DataType, LocalComm, ReduceOp, Tuner};

use super::helpers::{f64_bytes, i32_bytes, rank_f64, run_tuned, test_config};

#[derive(Clone, Copy)]
struct Case {
    size: u32,
    count: usize,
    dtype: DataType,
    reduce_op: ReduceOp,
}

impl Case {
    fn root(&self) -> u32 {
        (self.size - 1).min(2)
    }

    fn data(&self, rank: u32, count: usize) -> Vec<u8> {
        match self.dtype {
            DataType::F64 => f64_bytes(&rank_f64(rank, count)),
            DataType::I32 => {
                let v: Vec<i32> = (0..count)
                    .map(|i| {
                        let x = (rank as usize * 31 + i * 7) as i32 % 101;
                        if i % 2 == 0 { x } else { -x }
                    })
                    .collect();
                i32_bytes(&v)
            }
            other => panic!("no generator for {other}"),
        }
    }
}

/// Run `op` on this rank; returns the bytes the caller would observe.
fn call(tuner: &mut Tuner<LocalComm>, op: CollectiveOp, case: Case) -> Vec<u8> {
    let rank = tuner.rank();
    let size = tuner.size() as usize;
    let Case {
        count,
        dtype,
        reduce_op,
        ..
    } = case;
    let root = case.root();
    let is_root = rank == root;
    let n = count * dtype.size_in_bytes();
    let own = case.data(rank, count);
    let wide = case.data(rank, size * count);

    match op {
        CollectiveOp::Bcast => {
            let mut buf = if is_root { own } else { vec![0; n] };
            tuner.bcast(&mut buf, count, dtype, root).unwrap();
            buf
        }
        CollectiveOp::Scatter => {
            let send = if is_root { wide } else { Vec::new() };
            let mut recv = vec![0; n];
            tuner.scatter(&send, &mut recv, count, dtype, root).unwrap();
            recv
        }
        CollectiveOp::Gather => {
            let mut recv = if is_root { vec![0; size * n] } else { Vec::new() };
            tuner.gather(&own, &mut recv, count, dtype, root).unwrap();
            recv
        }
        CollectiveOp::Allgather => {
            let mut recv = vec![0; size * n];
            tuner.allgather(&own, &mut recv, count, dtype).unwrap();
            recv
        }
        CollectiveOp::Alltoall => {
            let mut recv = vec![0; size * n];
            tuner.alltoall(&wide, &mut recv, count, dtype).unwrap();
            recv
        }
        CollectiveOp::Reduce => {
            let mut recv = if is_root { vec![0; n] } else { Vec::new() };
            tuner
                .reduce(&own, &mut recv, count, dtype, reduce_op, root)
                .unwrap();
            recv
        }
        CollectiveOp::Allreduce => {
            let mut recv = vec![0; n];
            tuner
                .allreduce(&own, &mut recv, count, dtype, reduce_op)
                .unwrap();
            recv
        }
        CollectiveOp::ReduceScatterBlock => {
            let mut recv = vec![0; n];
            tuner
                .reduce_scatter_block(&wide, &mut recv, count, dtype, reduce_op)
                .unwrap();
            recv
        }
        CollectiveOp::Scan => {
            let mut recv = vec![0; n];
            tuner.scan(&own, &mut recv, count, dtype, reduce_op).unwrap();
            recv
        }
    }
}

fn check_all_algorithms(case: Case) {
    let catalog = Catalog::register_all();
    let msg_size = (case.count * case.dtype.size_in_bytes()) as u64;

    for op in CollectiveOp::ALL {
        let expected = run_tuned(case.size, &test_config(), |t| call(t, op, case));

        for choice in &catalog.module(op).choices()[1..] {
            let config = test_config().with_module(op.cli_prefix(), choice.name);
            let results = run_tuned(case.size, &config, |t| {
                let out = call(t, op, case);
                let used = t.recorder().and_then(|r| r.recorded(op, msg_size));
                (out, used)
            });

            for (rank, ((out, used), want)) in results.iter().zip(&expected).enumerate() {
                assert_eq!(
                    out, want,
                    "{} differs from native on rank {rank} (size {}, count {})",
                    choice.name, case.size, case.count
                );
                if rank == 0 {
                    assert_eq!(*used, Some(choice.id), "{} fell back", choice.name);
                }
            }
        }
    }
}

#[test]
fn test_all_algorithms_f64_sum_5_ranks_uneven() {
    check_all_algorithms(Case {
        size: 5,
        count: 37,
        dtype: DataType::F64,
        reduce_op: ReduceOp::Sum,
    });
}

#[test]
fn test_all_algorithms_f64_sum_4_ranks_even() {
    check_all_algorithms(Case {
        size: 4,
        count: 64,
        dtype: DataType::F64,
        reduce_op: ReduceOp::Sum,
    });
}

#[test]
fn test_all_algorithms_i32_max_fewer_elements_than_ranks() {
    check_all_algorithms(Case {
        size: 3,
        count: 2,
        dtype: DataType::I32,
        reduce_op: ReduceOp::Max,
    });
}

#[test]
fn test_all_algorithms_zero_count() {
    check_all_algorithms(Case {
        size: 3,
        count: 0,
        dtype: DataType::I32,
        reduce_op: ReduceOp::Sum,
    });
}

#[test]
fn test_all_algorithms_i32_prod_single_rank() {
    check_all_algorithms(Case {
        size: 1,
        count: 10,
        dtype: DataType::I32,
        reduce_op: ReduceOp::Prod,
    });
}
