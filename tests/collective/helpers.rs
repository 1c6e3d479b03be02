use pgtune::config::{INT_BUFFER_KEY, MSG_BUFFER_KEY};
use pgtune::{LocalComm, TuneConfig, Tuner};

/// Run `f` once per rank of a fresh `size`-rank group, each on its own
/// thread, and collect the results in rank order.
pub fn run_group<T, F>(size: u32, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(LocalComm) -> T + Sync,
{
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::group(size)
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Like [`run_group`], with a tuner built from `config` on every rank.
pub fn run_tuned<T, F>(size: u32, config: &TuneConfig, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&mut Tuner<LocalComm>) -> T + Sync,
{
    run_group(size, |comm| {
        let mut tuner = Tuner::init(comm, config.clone()).unwrap();
        f(&mut tuner)
    })
}

/// Static context, recording on, 1 MiB message arena.
pub fn test_config() -> TuneConfig {
    let mut config = TuneConfig {
        record_algorithms: true,
        ..TuneConfig::default()
    };
    config.settings.set(MSG_BUFFER_KEY, (1 << 20).to_string());
    config.settings.set(INT_BUFFER_KEY, "4096");
    config
}

pub fn f64_bytes(v: &[f64]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn i32_bytes(v: &[i32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn from_f64_bytes(b: &[u8]) -> Vec<f64> {
    b.chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

pub fn from_i32_bytes(b: &[u8]) -> Vec<i32> {
    b.chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// Distinct, non-integral values per rank and position.
pub fn rank_f64(rank: u32, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| (rank as usize * count + i) as f64 * 0.37 + 1.0 / (rank as f64 + 3.0))
        .collect()
}
