use pgtune::config::{INT_BUFFER_KEY, MSG_BUFFER_KEY};
use pgtune::{CollectiveOp, DataType, LocalComm, ReduceOp, TuneConfig, TuneError, Tuner};

use super::helpers::{f64_bytes, from_f64_bytes, rank_f64, run_tuned, test_config};

fn tiny_arena(config: TuneConfig, msg_bytes: usize, int_bytes: usize) -> TuneConfig {
    let mut config = config;
    config.settings.set(MSG_BUFFER_KEY, msg_bytes.to_string());
    config.settings.set(INT_BUFFER_KEY, int_bytes.to_string());
    config
}

#[test]
fn test_exhausted_message_pool_falls_back_to_native() {
    let config = tiny_arena(
        test_config().with_module("allreduce", "allreduce_as_reducescatterblock_allgather"),
        64,
        4096,
    );

    let results = run_tuned(3, &config, |t| {
        let send = f64_bytes(&rank_f64(t.rank(), 50));
        let mut recv = vec![0; 50 * 8];
        t.allreduce(&send, &mut recv, 50, DataType::F64, ReduceOp::Min)
            .unwrap();
        let used = t.recorder().and_then(|r| r.recorded(CollectiveOp::Allreduce, 400));
        (from_f64_bytes(&recv), used)
    });

    let expected = rank_f64(0, 50);
    for (rank, (out, _)) in results.iter().enumerate() {
        assert_eq!(out, &expected, "rank {rank}");
    }
    assert_eq!(results[0].1, Some(0));
}

#[test]
fn test_exhausted_int_pool_falls_back_to_native() {
    // Three counts fit, a 4-rank count array does not.
    let config = tiny_arena(test_config().with_module("gather", "gather_as_gatherv"), 4096, 12);

    let results = run_tuned(4, &config, |t| {
        let send = f64_bytes(&rank_f64(t.rank(), 3));
        let mut recv = if t.rank() == 0 { vec![0; 4 * 3 * 8] } else { Vec::new() };
        t.gather(&send, &mut recv, 3, DataType::F64, 0).unwrap();
        let used = t.recorder().and_then(|r| r.recorded(CollectiveOp::Gather, 24));
        (recv, used)
    });

    let expected: Vec<f64> = (0..4).flat_map(|r| rank_f64(r, 3)).collect();
    assert_eq!(from_f64_bytes(&results[0].0), expected);
    assert_eq!(results[0].1, Some(0));
}

#[test]
fn test_algorithm_recovers_once_space_suffices() {
    let config = tiny_arena(
        test_config().with_module("bcast", "bcast_as_scatter_allgather"),
        256,
        4096,
    );

    let results = run_tuned(2, &config, |t| {
        let mut used = Vec::new();
        for count in [100usize, 8, 100] {
            let mut buf = if t.rank() == 0 {
                f64_bytes(&rank_f64(0, count))
            } else {
                vec![0; count * 8]
            };
            t.bcast(&mut buf, count, DataType::F64, 0).unwrap();
            assert_eq!(from_f64_bytes(&buf), rank_f64(0, count));
            used.push(
                t.recorder()
                    .and_then(|r| r.recorded(CollectiveOp::Bcast, (count * 8) as u64)),
            );
        }
        used
    });

    assert_eq!(results[0], vec![Some(0), Some(2), Some(0)]);
}

#[test]
fn test_unallocatable_arena_is_fatal() {
    let config = tiny_arena(TuneConfig::default(), usize::MAX, 16);
    let comm = LocalComm::group(1).remove(0);
    let err = Tuner::init(comm, config).unwrap_err();
    assert!(matches!(err, TuneError::AllocationFailure { pool: "msg", .. }));
    assert!(err.is_fatal());
}
