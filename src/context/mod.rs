//! Strategies that decide which algorithm an operation runs.

mod static_ctx;
mod tuned;

pub use static_ctx::StaticContext;
pub use tuned::TunedContext;

use crate::catalog::Catalog;
use crate::error::{Result, TuneError};
use crate::types::{AlgorithmId, CollectiveOp};

/// Which selection strategy a tuner runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextKind {
    /// Operator-chosen algorithms, fixed for the whole run.
    #[default]
    Static,
    /// Per-call lookup in message-size profiles.
    Tuned,
}

impl ContextKind {
    pub const fn name(self) -> &'static str {
        match self {
            ContextKind::Static => "static",
            ContextKind::Tuned => "tuned",
        }
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ContextKind {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(ContextKind::Static),
            "tuned" => Ok(ContextKind::Tuned),
            _ => Err(TuneError::InvalidSetting {
                key: "context".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// A selection strategy.
///
/// Every input to [`get_algorithm`](Self::get_algorithm) is identical on
/// all ranks, and implementations must keep the answer a pure function of
/// those inputs and of state loaded at [`initialize`](Self::initialize).
pub trait SelectionContext: Send {
    fn kind(&self) -> ContextKind;

    /// Prepare the context; may bake fixed choices into `catalog`.
    fn initialize(&mut self, catalog: &mut Catalog) -> Result<()>;

    fn finalize(&mut self) {}

    /// Per-call choice for `op` at `msg_size` bytes in a group of
    /// `group_size` ranks. Failure means "use the module's stored choice".
    fn get_algorithm(
        &self,
        op: CollectiveOp,
        msg_size: u64,
        group_size: u32,
    ) -> Result<AlgorithmId>;
}
