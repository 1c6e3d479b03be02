//! Recognizes the tuner's options among a program's arguments.
//!
//! Accepted forms (both `--opt=value` and `--opt value`):
//! - `--module <prefix>=<params>` selects a static algorithm per module;
//! - `--config <path>` names a settings file;
//! - `--ppath <path>` names a profile directory.
//!
//! Arguments that are not tuner options are left to the application.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Module prefix → parameter string.
    pub modules: BTreeMap<String, String>,
    pub config_file: Option<PathBuf>,
    pub profile_path: Option<PathBuf>,
}

impl CliOptions {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            let Some((name, inline)) = split_option(arg) else {
                continue;
            };
            let value = match inline {
                Some(v) => v.to_string(),
                None => match args.next() {
                    Some(v) => v.as_ref().to_string(),
                    None => {
                        warn!(option = name.flag(), "missing value");
                        continue;
                    }
                },
            };
            match name {
                TuneOption::Module => opts.add_module(&value),
                TuneOption::Config => opts.config_file = Some(PathBuf::from(value)),
                TuneOption::ProfilePath => opts.profile_path = Some(PathBuf::from(value)),
            }
        }
        opts
    }

    fn add_module(&mut self, value: &str) {
        match value.split_once('=') {
            Some((prefix, params)) if !prefix.trim().is_empty() => {
                self.modules
                    .insert(prefix.trim().to_string(), params.trim().to_string());
            }
            _ => warn!(value, "expected --module <prefix>=<params>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TuneOption {
    Module,
    Config,
    ProfilePath,
}

impl TuneOption {
    fn flag(self) -> &'static str {
        match self {
            TuneOption::Module => "--module",
            TuneOption::Config => "--config",
            TuneOption::ProfilePath => "--ppath",
        }
    }
}

/// `--name[=value]` for the options this module owns.
fn split_option(arg: &str) -> Option<(TuneOption, Option<&str>)> {
    let body = arg.strip_prefix("--")?;
    let (name, value) = match body.split_once('=') {
        Some((n, v)) => (n, Some(v)),
        None => (body, None),
    };
    let option = match name {
        "module" => TuneOption::Module,
        "config" => TuneOption::Config,
        "ppath" => TuneOption::ProfilePath,
        _ => return None,
    };
    Some((option, value))
}
