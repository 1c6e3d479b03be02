//! Calls whose buffers are too short on one rank.

use pgtune::{
    Catalog, CollectiveOp, DataType, LocalComm, Rank, ReduceOp, Result, TuneError, Tuner,
};

use super::helpers::{from_i32_bytes, i32_bytes, run_tuned, test_config};

const COUNT: usize = 8;
const BLOCK: usize = COUNT * 4;
const ROOT: Rank = 1;

/// Run `op` over `COUNT` ints per block. On `victim` the buffer that only
/// matters there (the root's side for rooted operations, the receive side
/// otherwise) is cut to 4 bytes.
fn call_with_short_buffer(t: &mut Tuner<LocalComm>, op: CollectiveOp, victim: Rank) -> Result<()> {
    let size = t.size() as usize;
    let at_root = t.rank() == ROOT;
    let cut = t.rank() == victim;
    let fit = |len: usize| if cut { 4 } else { len };
    let dtype = DataType::I32;
    let sum = ReduceOp::Sum;

    match op {
        CollectiveOp::Bcast => {
            let mut buf = vec![1; fit(BLOCK)];
            t.bcast(&mut buf, COUNT, dtype, ROOT)
        }
        CollectiveOp::Scatter => {
            let send = vec![1; if at_root { fit(size * BLOCK) } else { 0 }];
            let mut recv = vec![0; BLOCK];
            t.scatter(&send, &mut recv, COUNT, dtype, ROOT)
        }
        CollectiveOp::Gather => {
            let mut recv = vec![0; if at_root { fit(size * BLOCK) } else { 0 }];
            t.gather(&[1; BLOCK], &mut recv, COUNT, dtype, ROOT)
        }
        CollectiveOp::Allgather => {
            let mut recv = vec![0; fit(size * BLOCK)];
            t.allgather(&[1; BLOCK], &mut recv, COUNT, dtype)
        }
        CollectiveOp::Alltoall => {
            let mut recv = vec![0; fit(size * BLOCK)];
            t.alltoall(&vec![1; size * BLOCK], &mut recv, COUNT, dtype)
        }
        CollectiveOp::Reduce => {
            let mut recv = vec![0; if at_root { fit(BLOCK) } else { 0 }];
            t.reduce(&[1; BLOCK], &mut recv, COUNT, dtype, sum, ROOT)
        }
        CollectiveOp::Allreduce => {
            let mut recv = vec![0; fit(BLOCK)];
            t.allreduce(&[1; BLOCK], &mut recv, COUNT, dtype, sum)
        }
        CollectiveOp::ReduceScatterBlock => {
            let mut recv = vec![0; fit(BLOCK)];
            t.reduce_scatter_block(&vec![1; size * BLOCK], &mut recv, COUNT, dtype, sum)
        }
        CollectiveOp::Scan => {
            let mut recv = vec![0; fit(BLOCK)];
            t.scan(&[1; BLOCK], &mut recv, COUNT, dtype, sum)
        }
    }
}

#[test]
fn test_short_buffer_fails_only_its_rank_for_every_algorithm() {
    let catalog = Catalog::register_all();

    for op in CollectiveOp::ALL {
        let module = catalog.module(op);
        let victim = if module.is_rooted() { ROOT } else { 2 };

        for choice in module.choices() {
            let config = test_config().with_module(op.cli_prefix(), choice.name);
            let results = run_tuned(3, &config, |t| {
                let outcome = call_with_short_buffer(t, op, victim);

                // The next collective must line up on every rank.
                let mut buf = if t.rank() == 0 {
                    i32_bytes(&[5, 6, 7])
                } else {
                    vec![0; 12]
                };
                t.bcast(&mut buf, 3, DataType::I32, 0).unwrap();

                let used = t.recorder().and_then(|r| r.recorded(op, BLOCK as u64));
                (outcome, from_i32_bytes(&buf), used)
            });

            for (rank, (outcome, after, _)) in results.iter().enumerate() {
                if rank as Rank == victim {
                    assert!(
                        matches!(outcome, Err(TuneError::BufferSizeMismatch { actual: 4, .. })),
                        "{} on rank {rank}: {outcome:?}",
                        choice.name
                    );
                } else {
                    assert!(outcome.is_ok(), "{} on rank {rank}: {outcome:?}", choice.name);
                }
                assert_eq!(after, &vec![5, 6, 7], "{} left rank {rank} behind", choice.name);
            }
            assert_eq!(results[0].2, Some(choice.id), "{} fell back", choice.name);
        }
    }
}

#[test]
fn test_short_root_buffer_in_decomposed_reduce_is_left_untouched() {
    let config = test_config().with_module("reduce", "reduce_as_reducescatterblock_gather");

    let results = run_tuned(3, &config, |t| {
        let send = i32_bytes(&[100 + t.rank() as i32; COUNT]);
        let mut recv = if t.rank() == 0 { vec![0xAB; 4] } else { Vec::new() };
        let outcome = t.reduce(&send, &mut recv, COUNT, DataType::I32, ReduceOp::Sum, 0);

        let mut buf = if t.rank() == 0 {
            i32_bytes(&[100, 0, 0, 0])
        } else {
            vec![0; 16]
        };
        t.bcast(&mut buf, 4, DataType::I32, 0).unwrap();
        (outcome, recv, from_i32_bytes(&buf))
    });

    let (outcome, recv, _) = &results[0];
    assert!(matches!(
        outcome,
        Err(TuneError::BufferSizeMismatch {
            expected: 32,
            actual: 4
        })
    ));
    assert_eq!(recv, &vec![0xAB; 4]);
    for (rank, (outcome, _, bcast)) in results.iter().enumerate().skip(1) {
        assert!(outcome.is_ok(), "rank {rank}: {outcome:?}");
        assert_eq!(bcast, &vec![100, 0, 0, 0], "rank {rank}");
    }
    assert_eq!(results[0].2, vec![100, 0, 0, 0]);
}
