mod collective {
    pub mod helpers;

    mod buffers;
    mod equivalence;
    mod fallback;
    mod scenarios;
    mod telemetry;
}
