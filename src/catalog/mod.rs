//! Registry of replaceable collectives and their algorithm choices.
//!
//! Every operation contributes one [`CollectiveModule`] implementation
//! (generated by [`collective_module!`] next to its algorithms). The
//! [`Catalog`] owns one [`Module`] handle per operation, which carries the
//! algorithm currently selected for that operation.

mod module;

pub use module::{CollectiveModule, Module};
pub(crate) use module::collective_module;

use crate::collective::{
    AllgatherModule, AllreduceModule, AlltoallModule, BcastModule, GatherModule, ReduceModule,
    ReduceScatterBlockModule, ScanModule, ScatterModule,
};
use crate::error::{Result, TuneError};
use crate::types::{AlgorithmId, CollectiveOp};

/// One selectable implementation of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmChoice {
    pub id: AlgorithmId,
    pub name: &'static str,
}

/// All operation modules, indexed by [`CollectiveOp::index`].
pub struct Catalog {
    modules: Vec<Module>,
}

impl Catalog {
    /// Build one module per operation, each starting at the default
    /// algorithm.
    pub fn register_all() -> Self {
        let descriptors: [Box<dyn CollectiveModule>; CollectiveOp::COUNT] = [
            Box::new(AllgatherModule),
            Box::new(AllreduceModule),
            Box::new(AlltoallModule),
            Box::new(BcastModule),
            Box::new(GatherModule),
            Box::new(ReduceModule),
            Box::new(ReduceScatterBlockModule),
            Box::new(ScanModule),
            Box::new(ScatterModule),
        ];
        let modules: Vec<Module> = descriptors.into_iter().map(Module::new).collect();
        debug_assert!(
            modules
                .iter()
                .enumerate()
                .all(|(i, m)| m.op().index() == i)
        );
        Self { modules }
    }

    pub fn module(&self, op: CollectiveOp) -> &Module {
        &self.modules[op.index()]
    }

    pub fn module_mut(&mut self, op: CollectiveOp) -> &mut Module {
        &mut self.modules[op.index()]
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Module registered under a command-line prefix, e.g. `bcast`.
    pub fn module_by_prefix_mut(&mut self, prefix: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.cli_prefix() == prefix)
    }

    /// Resolve a primitive name as written in profile files
    /// (e.g. `MPI_Bcast`).
    pub fn lookup_operation_id_by_name(&self, name: &str) -> Result<CollectiveOp> {
        self.modules
            .iter()
            .find(|m| m.primitive_name() == name)
            .map(Module::op)
            .ok_or_else(|| TuneError::UnknownOperation(name.to_string()))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::register_all()
    }
}

pub fn lookup_algorithm_id_by_name(choices: &[AlgorithmChoice], name: &str) -> Result<AlgorithmId> {
    choices
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.id)
        .ok_or_else(|| TuneError::InvalidAlgorithmName {
            name: name.to_string(),
        })
}

pub fn lookup_name_by_id(choices: &[AlgorithmChoice], id: AlgorithmId) -> Result<String> {
    choices
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.name.to_string())
        .ok_or(TuneError::InvalidAlgorithmId { id })
}

/// Accept exactly the ids registered in `choices`.
pub fn validate_algorithm_id(choices: &[AlgorithmChoice], id: AlgorithmId) -> Result<()> {
    if choices.iter().any(|c| c.id == id) {
        Ok(())
    } else {
        Err(TuneError::InvalidAlgorithmId { id })
    }
}
