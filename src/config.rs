//! Runtime configuration for the tuner.
//!
//! Values come from defaults, then environment variables (prefixed
//! `PGMPI_`), then command-line options, then the settings file named by
//! either of those.

use crate::arena::{DEFAULT_INT_BUFFER_BYTES, DEFAULT_MSG_BUFFER_BYTES};
use crate::cli::CliOptions;
use crate::context::ContextKind;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

pub const MSG_BUFFER_KEY: &str = "size_msg_buffer_bytes";
pub const INT_BUFFER_KEY: &str = "size_int_buffer_bytes";

/// Minimum chunk, in elements, for the round-robin reduce-scatter
/// decompositions.
pub const DEFAULT_MIN_SCATTER_CHUNK: usize = 4;

/// `key value` settings, printed verbatim in telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    entries: BTreeMap<String, String>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        let mut store = Self {
            entries: BTreeMap::new(),
        };
        store.set(MSG_BUFFER_KEY, DEFAULT_MSG_BUFFER_BYTES.to_string());
        store.set(INT_BUFFER_KEY, DEFAULT_INT_BUFFER_BYTES.to_string());
        store
    }
}

impl ConfigStore {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parsed value of `key`; unparsable values are logged and ignored.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(key, value = raw, "unparsable setting, using default");
                None
            }
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `key value` lines. Blank and `#` lines are skipped; lines
    /// without a value are logged and skipped.
    pub fn merge_str(&mut self, text: &str) {
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => {
                    self.set(key, value.trim());
                }
                _ => warn!(line = n + 1, content = line, "faulty settings line"),
            }
        }
    }

    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.merge_str(&text);
        Ok(())
    }
}

/// Tuner configuration.
#[derive(Debug, Clone)]
pub struct TuneConfig {
    /// Selection strategy. Defaults to `Tuned` when a profile path is
    /// configured, otherwise `Static`.
    pub context: ContextKind,

    /// Static selections: module prefix → parameter string.
    pub modules: BTreeMap<String, String>,

    pub config_file: Option<PathBuf>,

    /// Directory holding `*.prf` profiles.
    pub profile_path: Option<PathBuf>,

    /// Record which algorithm ran per operation and message size (rank 0).
    pub record_algorithms: bool,

    pub min_scatter_chunk: usize,

    pub settings: ConfigStore,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            context: ContextKind::Static,
            modules: BTreeMap::new(),
            config_file: None,
            profile_path: None,
            record_algorithms: false,
            min_scatter_chunk: DEFAULT_MIN_SCATTER_CHUNK,
            settings: ConfigStore::default(),
        }
    }
}

impl TuneConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `PGMPI_CONTEXT` (`static` or `tuned`)
    /// - `PGMPI_CONFIG_FILE`
    /// - `PGMPI_PROFILE_PATH`
    /// - `PGMPI_RECORD_ALGORITHMS` (`1`/`true`)
    /// - `PGMPI_MIN_SCATTER_CHUNK`
    pub fn from_env() -> Self {
        Self::from_args(std::iter::empty::<&str>())
    }

    /// Environment, then tuner options found in `args`, then the settings
    /// file.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cfg = Self::default();
        let mut context = None;

        if let Ok(v) = std::env::var("PGMPI_CONTEXT") {
            match v.parse::<ContextKind>() {
                Ok(kind) => context = Some(kind),
                Err(e) => warn!("{e}"),
            }
        }
        if let Ok(v) = std::env::var("PGMPI_CONFIG_FILE") {
            cfg.config_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PGMPI_PROFILE_PATH") {
            cfg.profile_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PGMPI_RECORD_ALGORITHMS") {
            cfg.record_algorithms = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("PGMPI_MIN_SCATTER_CHUNK") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.min_scatter_chunk = n.max(1);
            }
        }

        cfg.apply_cli(CliOptions::parse(args));
        cfg.context = context.unwrap_or(if cfg.profile_path.is_some() {
            ContextKind::Tuned
        } else {
            ContextKind::Static
        });
        cfg.load_settings_file();
        cfg
    }

    pub fn apply_cli(&mut self, cli: CliOptions) {
        self.modules.extend(cli.modules);
        if cli.config_file.is_some() {
            self.config_file = cli.config_file;
        }
        if cli.profile_path.is_some() {
            self.profile_path = cli.profile_path;
        }
    }

    /// Merge the configured settings file; an unreadable file is logged and
    /// the defaults are kept.
    pub fn load_settings_file(&mut self) {
        if let Some(path) = &self.config_file {
            if let Err(e) = self.settings.merge_file(path) {
                warn!(path = %path.display(), "cannot read settings file: {e}");
            }
        }
    }

    pub fn msg_buffer_bytes(&self) -> usize {
        self.settings
            .get_parsed(MSG_BUFFER_KEY)
            .unwrap_or(DEFAULT_MSG_BUFFER_BYTES)
    }

    pub fn int_buffer_bytes(&self) -> usize {
        self.settings
            .get_parsed(INT_BUFFER_KEY)
            .unwrap_or(DEFAULT_INT_BUFFER_BYTES)
    }

    /// Select `alg_name` for the module with `prefix`.
    pub fn with_module(mut self, prefix: &str, alg_name: &str) -> Self {
        self.modules
            .insert(prefix.to_string(), format!("alg:{alg_name}"));
        self
    }
}
