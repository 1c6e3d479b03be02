use pgtune::{DataType, ReduceOp, TuneConfig, Tuner};

use super::helpers::{i32_bytes, run_group, test_config};

/// Two bcasts and an allreduce, then finalize; returns what each rank wrote.
fn traced_run(config: &TuneConfig) -> Vec<String> {
    run_group(2, |comm| {
        let mut t = Tuner::init(comm, config.clone()).unwrap();
        for count in [100usize, 16] {
            let mut buf = if t.rank() == 0 {
                i32_bytes(&vec![7; count])
            } else {
                vec![0; count * 4]
            };
            t.bcast(&mut buf, count, DataType::I32, 0).unwrap();
        }
        let send = i32_bytes(&[1; 8]);
        let mut recv = vec![0; 32];
        t.allreduce(&send, &mut recv, 8, DataType::I32, ReduceOp::Sum)
            .unwrap();

        let mut out = Vec::new();
        t.finalize(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    })
}

#[test]
fn test_finalize_writes_algorithms_then_settings_on_rank_0() {
    let config = test_config().with_module("bcast", "bcast_as_scatter_allgather");
    let outputs = traced_run(&config);

    assert_eq!(
        outputs[0],
        "#@pgmpi alg MPI_Allreduce 32 default\n\
         #@pgmpi alg MPI_Bcast 64 bcast_as_scatter_allgather\n\
         #@pgmpi alg MPI_Bcast 400 bcast_as_scatter_allgather\n\
         #@pgmpi config size_int_buffer_bytes 4096\n\
         #@pgmpi config size_msg_buffer_bytes 1048576\n"
    );
    assert!(outputs[1].is_empty());
}

#[test]
fn test_settings_file_entries_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pgtune.conf");
    std::fs::write(&path, "# site\nsite_label rack-7\nsize_int_buffer_bytes 2048\n").unwrap();

    let mut config = TuneConfig {
        config_file: Some(path),
        ..test_config()
    };
    config.load_settings_file();
    let outputs = traced_run(&config);

    assert!(outputs[0].contains("#@pgmpi config site_label rack-7\n"));
    assert!(outputs[0].contains("#@pgmpi config size_int_buffer_bytes 2048\n"));
}

#[test]
fn test_no_output_when_recording_disabled() {
    let config = TuneConfig {
        record_algorithms: false,
        ..test_config()
    };
    assert!(traced_run(&config).iter().all(String::is_empty));
}
