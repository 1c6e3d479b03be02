//! Profile file format:
//!
//! ```text
//! # comments and blank lines are ignored
//! MPI_Bcast              operation
//! 8                      group size
//! 2                      alias count K, then K lines "<alias> <algorithm>"
//! 0 default
//! 1 bcast_as_scatter_allgather
//! 2                      range count R, then R lines "<start> <end> <alias>"
//! 1 1024 0
//! 1025 1048576 1
//! ```

use super::{Profile, Range};
use crate::catalog::{Catalog, lookup_algorithm_id_by_name};
use crate::error::{Result, TuneError};
use crate::types::AlgorithmId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// File extension of profile files in a profile directory.
pub const PROFILE_SUFFIX: &str = "prf";

struct Lines<'a> {
    path: &'a Path,
    inner: Box<dyn Iterator<Item = (usize, &'a str)> + 'a>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        let inner = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));
        Self {
            path,
            inner: Box::new(inner),
            last: 0,
        }
    }

    fn next_tokens(&mut self, what: &str) -> Result<(usize, Vec<&'a str>)> {
        match self.inner.next() {
            Some((n, line)) => {
                self.last = n;
                Ok((n, line.split_whitespace().collect()))
            }
            None => Err(TuneError::malformed(
                self.path,
                self.last + 1,
                format!("unexpected end of file, expected {what}"),
            )),
        }
    }

    fn next_number<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let (n, tokens) = self.next_tokens(what)?;
        self.number(n, tokens.first().copied(), what)
    }

    fn number<T: FromStr>(&self, line: usize, token: Option<&str>, what: &str) -> Result<T> {
        token
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| TuneError::malformed(self.path, line, format!("expected {what}")))
    }

    fn rest(&mut self) -> usize {
        self.inner.by_ref().count()
    }
}

/// Parse one profile. `path` is only used in diagnostics.
pub fn parse_profile_str(text: &str, path: &Path, catalog: &Catalog) -> Result<Profile> {
    let mut lines = Lines::new(path, text);

    let (n, tokens) = lines.next_tokens("operation name")?;
    let name = tokens.first().copied().unwrap_or_default();
    let op = catalog
        .lookup_operation_id_by_name(name)
        .map_err(|e| TuneError::malformed(path, n, e.to_string()))?;
    let choices = catalog.module(op).choices();

    let group_size: u32 = lines.next_number("group size")?;
    if group_size == 0 {
        return Err(TuneError::malformed(path, lines.last, "group size must be positive"));
    }

    let alias_count: usize = lines.next_number("alias count")?;
    let mut aliases: HashMap<&str, AlgorithmId> = HashMap::with_capacity(alias_count);
    for _ in 0..alias_count {
        let (n, tokens) = lines.next_tokens("alias line")?;
        let &[alias, alg_name, ..] = tokens.as_slice() else {
            return Err(TuneError::malformed(path, n, "expected '<alias> <algorithm>'"));
        };
        match lookup_algorithm_id_by_name(choices, alg_name) {
            Ok(id) => {
                aliases.insert(alias, id);
            }
            Err(e) => warn!(
                profile = %path.display(),
                line = n,
                "{e}, dropping alias '{alias}'"
            ),
        }
    }

    let range_count: usize = lines.next_number("range count")?;
    if range_count == 0 {
        return Err(TuneError::malformed(path, lines.last, "range count must be positive"));
    }

    let mut ranges = Vec::with_capacity(range_count);
    for _ in 0..range_count {
        let (n, tokens) = lines.next_tokens("range line")?;
        if tokens.len() < 3 {
            return Err(TuneError::malformed(path, n, "expected '<start> <end> <alias>'"));
        }
        let start: u64 = lines.number(n, Some(tokens[0]), "range start")?;
        let end: u64 = lines.number(n, Some(tokens[1]), "range end")?;
        if start > end {
            return Err(TuneError::malformed(
                path,
                n,
                format!("range start {start} exceeds end {end}"),
            ));
        }
        match aliases.get(tokens[2]) {
            Some(&alg) => ranges.push(Range { start, end, alg }),
            None => warn!(
                profile = %path.display(),
                line = n,
                "unknown alias '{}', dropping range {start}..={end}",
                tokens[2]
            ),
        }
    }

    let trailing = lines.rest();
    if trailing > 0 {
        debug!(profile = %path.display(), trailing, "ignoring lines after the range table");
    }

    let profile = Profile {
        op,
        group_size,
        ranges,
    };
    for (a, b) in profile.overlapping_ranges() {
        warn!(
            profile = %path.display(),
            "ranges {a} and {b} overlap, the earlier one wins"
        );
    }
    Ok(profile)
}

pub fn parse_profile_file(path: impl AsRef<Path>, catalog: &Catalog) -> Result<Profile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse_profile_str(&text, path, catalog)
}

/// Parse every `*.prf` file in `dir`, in file-name order.
pub fn parse_profile_directory(dir: impl AsRef<Path>, catalog: &Catalog) -> Result<Vec<Profile>> {
    let dir = dir.as_ref();
    let to_dir_error = |source| TuneError::ProfileDirectory {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(to_dir_error)? {
        let path = entry.map_err(to_dir_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == PROFILE_SUFFIX) {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|p| {
            debug!(profile = %p.display(), "loading profile");
            parse_profile_file(p, catalog)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollectiveOp;

    const BCAST: &str = "\
# tuned on 8 nodes
MPI_Bcast
8

2
a default
b bcast_as_scatter_allgather
3
1 1024 a
1025 65536 b
65537 1000000 a
";

    fn parse(text: &str) -> Result<Profile> {
        parse_profile_str(text, Path::new("test.prf"), &Catalog::register_all())
    }

    #[test]
    fn test_parse_profile() {
        let p = parse(BCAST).unwrap();
        assert_eq!(p.op, CollectiveOp::Bcast);
        assert_eq!(p.group_size, 8);
        assert_eq!(
            p.ranges,
            vec![
                Range {
                    start: 1,
                    end: 1024,
                    alg: 0
                },
                Range {
                    start: 1025,
                    end: 65536,
                    alg: 2
                },
                Range {
                    start: 65537,
                    end: 1000000,
                    alg: 0
                },
            ]
        );
    }

    #[test]
    fn test_unresolved_alias_is_dropped() {
        let text = "MPI_Reduce\n4\n2\nx reduce_as_allreduce\ny reduce_as_carrier_pigeon\n2\n1 10 x\n11 20 y\n";
        let p = parse(text).unwrap();
        assert_eq!(
            p.ranges,
            vec![Range {
                start: 1,
                end: 10,
                alg: 1
            }]
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let cases = [
            ("", "empty"),
            ("MPI_Teleport\n4\n0\n1\n1 2 a\n", "unknown operation"),
            ("MPI_Bcast\nfour\n", "group size"),
            ("MPI_Bcast\n0\n", "zero group size"),
            ("MPI_Bcast\n4\n1\na\n", "short alias line"),
            ("MPI_Bcast\n4\n1\na default\n0\n", "zero ranges"),
            ("MPI_Bcast\n4\n1\na default\n1\n5 x a\n", "bad range end"),
            ("MPI_Bcast\n4\n1\na default\n1\n9 3 a\n", "inverted range"),
            ("MPI_Bcast\n4\n1\na default\n2\n1 3 a\n", "truncated"),
        ];
        for (text, what) in cases {
            let err = parse(text).unwrap_err();
            assert!(
                matches!(err, TuneError::MalformedProfile { .. }),
                "{what}: {err}"
            );
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_malformed_reports_line() {
        let err = parse("MPI_Bcast\n# note\n4\n1\na default\n1\n1 x a\n").unwrap_err();
        match err {
            TuneError::MalformedProfile { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_parse_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bcast.prf"), BCAST).unwrap();
        std::fs::write(
            dir.path().join("scan.prf"),
            "MPI_Scan\n8\n1\nz scan_as_exscan_reducelocal\n1\n0 100 z\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a profile").unwrap();

        let profiles = parse_profile_directory(dir.path(), &Catalog::register_all()).unwrap();
        let ops: Vec<_> = profiles.iter().map(|p| p.op).collect();
        assert_eq!(ops, vec![CollectiveOp::Bcast, CollectiveOp::Scan]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = parse_profile_directory(&missing, &Catalog::register_all()).unwrap_err();
        assert!(matches!(err, TuneError::ProfileDirectory { .. }));
    }
}
