use pgtune::{
    CollectiveOp, Communicator, ContextKind, DataType, LocalComm, ReduceOp, TuneConfig, Tuner,
};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::helpers::{
    f64_bytes, from_i32_bytes, i32_bytes, rank_f64, run_group, run_tuned, test_config,
};

#[test]
fn test_bcast_scatter_allgather_1000_ints() {
    let original: Vec<i32> = (0..1000).map(|i| i * 3 - 500).collect();
    let config = test_config().with_module("bcast", "bcast_as_scatter_allgather");

    let results = run_tuned(4, &config, |t| {
        let mut buf = if t.rank() == 0 {
            i32_bytes(&original)
        } else {
            vec![0; 4000]
        };
        t.bcast(&mut buf, 1000, DataType::I32, 0).unwrap();
        let used = t.recorder().and_then(|r| r.recorded(CollectiveOp::Bcast, 4000));
        (from_i32_bytes(&buf), used)
    });

    for (rank, (buf, _)) in results.iter().enumerate() {
        assert_eq!(buf, &original, "rank {rank}");
    }
    assert_eq!(results[0].1, Some(2));
}

#[test]
fn test_reduce_scatter_gatherv_37_doubles() {
    const ROOT: u32 = 1;
    let config = TuneConfig {
        min_scatter_chunk: 4,
        ..test_config().with_module("reduce", "reduce_as_reducescatter_gatherv")
    };

    let decomposed = run_tuned(5, &config, |t| {
        let send = f64_bytes(&rank_f64(t.rank(), 37));
        let mut recv = if t.rank() == ROOT { vec![0; 37 * 8] } else { Vec::new() };
        t.reduce(&send, &mut recv, 37, DataType::F64, ReduceOp::Sum, ROOT)
            .unwrap();
        let used = t.recorder().and_then(|r| r.recorded(CollectiveOp::Reduce, 37 * 8));
        (recv, used)
    });
    let native = run_group(5, |mut comm| {
        let send = f64_bytes(&rank_f64(comm.rank(), 37));
        let mut recv = if comm.rank() == ROOT { vec![0; 37 * 8] } else { Vec::new() };
        comm.reduce(&send, &mut recv, 37, DataType::F64, ReduceOp::Sum, ROOT)
            .unwrap();
        recv
    });

    let expected: Vec<f64> = (0..37)
        .map(|i| (1..5).fold(rank_f64(0, 37)[i], |acc, r| acc + rank_f64(r, 37)[i]))
        .collect();

    assert_eq!(decomposed[ROOT as usize].0, native[ROOT as usize]);
    assert_eq!(decomposed[ROOT as usize].0, f64_bytes(&expected));
    assert_eq!(decomposed[0].1, Some(3));
}

fn write_profile(dir: &Path, group_size: u32) {
    std::fs::write(
        dir.join("allreduce.prf"),
        format!(
            "# allreduce\nMPI_Allreduce\n{group_size}\n2\n\
             small allreduce_as_reduce_bcast\n\
             large allreduce_as_reducescatterblock_allgather\n\
             2\n1 64 small\n65 1048576 large\n"
        ),
    )
    .unwrap();
}

fn tuned_config(dir: &Path) -> TuneConfig {
    TuneConfig {
        context: ContextKind::Tuned,
        profile_path: Some(dir.to_path_buf()),
        ..test_config()
    }
}

/// Allreduce of `count` ints summing each rank's `rank + 1`.
fn allreduce_ones(t: &mut Tuner<LocalComm>, count: usize) -> (Vec<i32>, Option<i32>) {
    let send = i32_bytes(&vec![t.rank() as i32 + 1; count]);
    let mut recv = vec![0; count * 4];
    t.allreduce(&send, &mut recv, count, DataType::I32, ReduceOp::Sum)
        .unwrap();
    let used = t
        .recorder()
        .and_then(|r| r.recorded(CollectiveOp::Allreduce, (count * 4) as u64));
    (from_i32_bytes(&recv), used)
}

#[test]
fn test_profile_for_other_group_size_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path(), 8);

    let results = run_tuned(4, &tuned_config(dir.path()), |t| {
        assert_eq!(t.context_kind(), ContextKind::Tuned);
        allreduce_ones(t, 10)
    });

    for (rank, (out, _)) in results.iter().enumerate() {
        assert_eq!(out, &vec![10; 10], "rank {rank}");
    }
    assert_eq!(results[0].1, Some(0));
}

#[test]
fn test_profile_ranges_pick_algorithm_by_size() {
    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path(), 4);

    let results = run_tuned(4, &tuned_config(dir.path()), |t| {
        let small = allreduce_ones(t, 10);
        let large = allreduce_ones(t, 100);
        let huge = allreduce_ones(t, 300_000);
        (small, large, huge)
    });

    for (small, large, huge) in &results {
        assert_eq!(small.0, vec![10; 10]);
        assert_eq!(large.0, vec![10; 100]);
        assert_eq!(huge.0.len(), 300_000);
        assert!(huge.0.iter().all(|&x| x == 10));
    }
    let (small, large, huge) = &results[0];
    assert_eq!(small.1, Some(1));
    assert_eq!(large.1, Some(2));
    // 1_200_000 bytes lies past the last range.
    assert_eq!(huge.1, Some(0));
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_unknown_static_name_keeps_default_and_warns() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let config = TuneConfig::from_args(["--module=allgather=alg:allgather_as_carrier_pigeon"]);
    let comm = LocalComm::group(1).remove(0);
    let tuner = tracing::subscriber::with_default(subscriber, || {
        Tuner::init(comm, config).unwrap()
    });

    assert_eq!(tuner.catalog().module(CollectiveOp::Allgather).active(), 0);
    let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("WARN"), "logs: {logs}");
    assert!(logs.contains("allgather_as_carrier_pigeon"), "logs: {logs}");
}
