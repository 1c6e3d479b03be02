use crate::catalog::{Catalog, lookup_name_by_id};
use crate::types::{AlgorithmId, CollectiveOp};
use std::collections::BTreeMap;
use std::io::Write;

/// Which algorithm actually ran, per operation and message size in bytes.
///
/// A later call with the same size overwrites the earlier entry.
#[derive(Debug, Clone)]
pub struct AlgorithmRecorder {
    per_op: [BTreeMap<u64, AlgorithmId>; CollectiveOp::COUNT],
}

impl Default for AlgorithmRecorder {
    fn default() -> Self {
        Self {
            per_op: std::array::from_fn(|_| BTreeMap::new()),
        }
    }
}

impl AlgorithmRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, op: CollectiveOp, msg_size: u64, alg: AlgorithmId) {
        self.per_op[op.index()].insert(msg_size, alg);
    }

    pub fn recorded(&self, op: CollectiveOp, msg_size: u64) -> Option<AlgorithmId> {
        self.per_op[op.index()].get(&msg_size).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.per_op.iter().all(BTreeMap::is_empty)
    }

    /// `#@pgmpi alg <op> <bytes> <alg name>` lines, by operation then size.
    pub fn write_lines(&self, out: &mut dyn Write, catalog: &Catalog) -> std::io::Result<()> {
        for op in CollectiveOp::ALL {
            let choices = catalog.module(op).choices();
            for (&size, &alg) in &self.per_op[op.index()] {
                let name = lookup_name_by_id(choices, alg).unwrap_or_else(|_| alg.to_string());
                writeln!(out, "#@pgmpi alg {} {} {}", op.primitive_name(), size, name)?;
            }
        }
        Ok(())
    }
}
