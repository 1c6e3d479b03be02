//! The tuner: owns the communicator, the algorithm catalog, the scratch
//! arena and the selection context, and routes each collective call.

mod dispatch;
mod recorder;

pub use recorder::AlgorithmRecorder;

use crate::arena::BufferArena;
use crate::catalog::{Catalog, validate_algorithm_id};
use crate::comm::Communicator;
use crate::config::TuneConfig;
use crate::context::{ContextKind, SelectionContext, StaticContext, TunedContext};
use crate::error::Result;
use crate::types::{AlgorithmId, CollectiveOp, Rank};
use std::io::Write;
use tracing::{error, info, trace, warn};

/// Collective entry points with replaceable algorithms.
///
/// Every rank builds its own `Tuner` from identical configuration; all
/// selection inputs are rank-independent, so every rank takes the same
/// branch for every call.
pub struct Tuner<C: Communicator> {
    comm: C,
    catalog: Catalog,
    arena: BufferArena,
    context: Box<dyn SelectionContext>,
    recorder: Option<AlgorithmRecorder>,
    config: TuneConfig,
}

impl<C: Communicator> Tuner<C> {
    /// Build the catalog, allocate the arena and initialize the selection
    /// context. Arena allocation failure and unreadable or malformed
    /// profiles are returned.
    pub fn init(comm: C, config: TuneConfig) -> Result<Self> {
        let mut catalog = Catalog::register_all();

        let arena = BufferArena::new(config.msg_buffer_bytes(), config.int_buffer_bytes())
            .inspect_err(|e| error!(rank = comm.rank(), "cannot allocate scratch arena: {e}"))?;

        let mut context: Box<dyn SelectionContext> = match config.context {
            ContextKind::Static => Box::new(StaticContext::new(config.modules.clone())),
            ContextKind::Tuned => Box::new(TunedContext::new(config.profile_path.clone())),
        };
        context
            .initialize(&mut catalog)
            .inspect_err(|e| error!(rank = comm.rank(), "cannot initialize {} context: {e}", config.context))?;

        let recorder = (config.record_algorithms && comm.rank() == 0).then(AlgorithmRecorder::new);

        info!(
            rank = comm.rank(),
            size = comm.size(),
            context = %config.context,
            msg_buffer_bytes = config.msg_buffer_bytes(),
            int_buffer_bytes = config.int_buffer_bytes(),
            recording = recorder.is_some(),
            "tuner ready"
        );

        Ok(Self {
            comm,
            catalog,
            arena,
            context,
            recorder,
            config,
        })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn comm_mut(&mut self) -> &mut C {
        &mut self.comm
    }

    pub fn rank(&self) -> Rank {
        self.comm.rank()
    }

    pub fn size(&self) -> u32 {
        self.comm.size()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &TuneConfig {
        &self.config
    }

    pub fn context_kind(&self) -> ContextKind {
        self.context.kind()
    }

    /// Present on rank 0 when recording is enabled.
    pub fn recorder(&self) -> Option<&AlgorithmRecorder> {
        self.recorder.as_ref()
    }

    /// Change the stored algorithm of `op`. Must be called identically on
    /// every rank.
    pub fn set_algorithm(&mut self, op: CollectiveOp, id: AlgorithmId) -> Result<()> {
        self.catalog.module_mut(op).set_active(id)
    }

    /// Finalize the context, write telemetry (rank 0, when recording) and
    /// hand the communicator back.
    pub fn finalize(mut self, out: &mut dyn Write) -> Result<C> {
        self.context.finalize();
        if let Some(recorder) = &self.recorder {
            recorder.write_lines(out, &self.catalog)?;
            for (key, value) in self.config.settings.iter() {
                writeln!(out, "#@pgmpi config {key} {value}")?;
            }
            out.flush()?;
        }
        Ok(self.comm)
    }

    /// Algorithm id for one call: the context's per-call choice when it has
    /// one, otherwise the id stored in the module.
    fn select(&self, op: CollectiveOp, msg_size: u64) -> AlgorithmId {
        let module = self.catalog.module(op);
        match self.context.get_algorithm(op, msg_size, self.comm.size()) {
            Ok(id) => match validate_algorithm_id(module.choices(), id) {
                Ok(()) => {
                    trace!(%op, msg_size, alg = id, "context selection");
                    id
                }
                Err(e) => {
                    warn!(%op, msg_size, "{e}, using stored selection");
                    module.active()
                }
            },
            Err(e) => {
                trace!(%op, msg_size, alg = module.active(), "{e}, using stored selection");
                module.active()
            }
        }
    }

    fn record(&mut self, op: CollectiveOp, msg_size: u64, alg: AlgorithmId) {
        if let Some(recorder) = &mut self.recorder {
            recorder.record(op, msg_size, alg);
        }
    }
}

impl<C: Communicator + std::fmt::Debug> std::fmt::Debug for Tuner<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tuner")
            .field("comm", &self.comm)
            .field("context", &self.context.kind())
            .field("recording", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}
