//! Lists every replaceable operation and its algorithms.
//!
//! With `--ppath <dir>` the profiles found there are loaded and printed as
//! well, which makes the tool a quick check for profile files.

use pgtune::catalog::{Catalog, lookup_name_by_id};
use pgtune::profile::parse_profile_directory;
use pgtune::TuneConfig;
use std::io::Write;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = TuneConfig::from_args(std::env::args().skip(1));
    let catalog = Catalog::register_all();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = run(&mut out, &catalog, &config) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(out: &mut dyn Write, catalog: &Catalog, config: &TuneConfig) -> pgtune::Result<()> {
    writeln!(out, "cliname;mpiname;algname;rooted")?;
    for module in catalog.modules() {
        for choice in module.choices() {
            writeln!(
                out,
                "{};{};{};{}",
                module.cli_prefix(),
                module.primitive_name(),
                choice.name,
                u8::from(module.is_rooted())
            )?;
        }
    }

    let Some(dir) = &config.profile_path else {
        return Ok(());
    };
    for profile in parse_profile_directory(dir, catalog)? {
        let choices = catalog.module(profile.op).choices();
        writeln!(out)?;
        writeln!(out, "# {} nprocs={}", profile.op, profile.group_size)?;
        for range in &profile.ranges {
            let name = lookup_name_by_id(choices, range.alg).unwrap_or_else(|_| range.alg.to_string());
            writeln!(out, "{} {} {}", range.start, range.end, name)?;
        }
    }
    Ok(())
}
