//! Message-size profiles and the range lookup they drive.

mod reader;

pub use reader::{parse_profile_directory, parse_profile_file, parse_profile_str, PROFILE_SUFFIX};

use crate::error::{Result, TuneError};
use crate::types::{AlgorithmId, CollectiveOp};

/// Inclusive byte interval mapped to one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    pub end: u64,
    pub alg: AlgorithmId,
}

impl Range {
    pub fn contains(&self, size: u64) -> bool {
        self.start <= size && size <= self.end
    }

    fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Algorithm choices for one operation, recorded at one group size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub op: CollectiveOp,
    pub group_size: u32,
    pub ranges: Vec<Range>,
}

impl Profile {
    /// First range containing `size`; ranges are scanned in file order.
    pub fn find_algorithm(&self, size: u64) -> Result<AlgorithmId> {
        find_algorithm(self, size)
    }

    /// Index pairs of ranges that share at least one size.
    pub fn overlapping_ranges(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.ranges.iter().enumerate() {
            for (j, b) in self.ranges.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

pub fn find_algorithm(profile: &Profile, size: u64) -> Result<AlgorithmId> {
    profile
        .ranges
        .iter()
        .find(|r| r.contains(size))
        .map(|r| r.alg)
        .ok_or(TuneError::RangeNotMatched {
            op: profile.op,
            size,
        })
}

/// At most one profile per operation.
#[derive(Debug, Clone, Default)]
pub struct RangeLookupTable {
    profiles: [Option<Profile>; CollectiveOp::COUNT],
}

impl RangeLookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `profile`, returning the one it replaces.
    pub fn insert(&mut self, profile: Profile) -> Option<Profile> {
        let idx = profile.op.index();
        self.profiles[idx].replace(profile)
    }

    pub fn get(&self, op: CollectiveOp) -> Option<&Profile> {
        self.profiles[op.index()].as_ref()
    }

    pub fn len(&self) -> usize {
        self.profiles.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter().flatten()
    }
}
