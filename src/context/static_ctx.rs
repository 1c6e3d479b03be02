use super::{ContextKind, SelectionContext};
use crate::catalog::Catalog;
use crate::error::{Result, TuneError};
use crate::types::{AlgorithmId, CollectiveOp, DEFAULT_ALGORITHM};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Applies operator-chosen algorithms once, at initialization.
///
/// Selections are keyed by module prefix (`bcast`, `reduce`, ...) with the
/// module's parameter string as value, as produced by `--module` options.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    selections: BTreeMap<String, String>,
}

impl StaticContext {
    pub fn new(selections: BTreeMap<String, String>) -> Self {
        Self { selections }
    }
}

impl SelectionContext for StaticContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Static
    }

    fn initialize(&mut self, catalog: &mut Catalog) -> Result<()> {
        for (prefix, params) in &self.selections {
            let Some(module) = catalog.module_by_prefix_mut(prefix) else {
                warn!(module = %prefix, "no collective module with this prefix, ignoring");
                continue;
            };
            let id = module.parse(params);
            if let Err(e) = module.set_active(id) {
                warn!(module = %prefix, "{e}, using default");
                module.set_active(DEFAULT_ALGORITHM)?;
            }
            debug!(module = %prefix, alg = module.active(), "static selection");
        }
        Ok(())
    }

    fn get_algorithm(
        &self,
        _op: CollectiveOp,
        _msg_size: u64,
        _group_size: u32,
    ) -> Result<AlgorithmId> {
        Err(TuneError::SelectionUnavailable)
    }
}
