use super::{ContextKind, SelectionContext};
use crate::catalog::{Catalog, validate_algorithm_id};
use crate::error::{Result, TuneError};
use crate::profile::{RangeLookupTable, find_algorithm, parse_profile_directory};
use crate::types::{AlgorithmId, CollectiveOp};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Chooses algorithms per call from message-size profiles.
#[derive(Debug, Clone, Default)]
pub struct TunedContext {
    profile_path: Option<PathBuf>,
    table: RangeLookupTable,
}

impl TunedContext {
    /// Load profiles from `profile_path` at initialization. With no path
    /// the table stays empty and every lookup fails.
    pub fn new(profile_path: Option<PathBuf>) -> Self {
        Self {
            profile_path,
            table: RangeLookupTable::new(),
        }
    }

    /// Use an already populated table.
    pub fn with_table(table: RangeLookupTable) -> Self {
        Self {
            profile_path: None,
            table,
        }
    }

    pub fn table(&self) -> &RangeLookupTable {
        &self.table
    }
}

impl SelectionContext for TunedContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Tuned
    }

    fn initialize(&mut self, catalog: &mut Catalog) -> Result<()> {
        let Some(dir) = self.profile_path.as_ref() else {
            debug!("no profile path configured, tuned lookups will fall back");
            return Ok(());
        };
        for profile in parse_profile_directory(dir, catalog)? {
            let op = profile.op;
            let choices = catalog.module(op).choices();
            if let Some(bad) = profile
                .ranges
                .iter()
                .find(|r| validate_algorithm_id(choices, r.alg).is_err())
            {
                warn!(%op, alg = bad.alg, "profile references an unknown algorithm, skipping it");
                continue;
            }
            if self.table.insert(profile).is_some() {
                warn!(%op, "several profiles for one operation, keeping the last");
            }
        }
        info!(
            path = %dir.display(),
            profiles = self.table.len(),
            "loaded tuning profiles"
        );
        Ok(())
    }

    fn get_algorithm(
        &self,
        op: CollectiveOp,
        msg_size: u64,
        group_size: u32,
    ) -> Result<AlgorithmId> {
        if msg_size == 0 {
            return Err(TuneError::InvalidMessageSize { size: msg_size });
        }
        let profile = self.table.get(op).ok_or(TuneError::ProfileNotFound { op })?;
        if profile.group_size != group_size {
            return Err(TuneError::GroupSizeMismatch {
                op,
                recorded: profile.group_size,
                live: group_size,
            });
        }
        find_algorithm(profile, msg_size)
    }
}
