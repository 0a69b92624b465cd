use anyhow::{Context, Result};
use clap::Parser;
use pkgcache_core::{
    logging, CacheAction, CacheManager, CacheType, CoreConfig, CoreError, Reporter, Status,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE_EXIT: u8 = 2;

/// Inspect and manage the installer's HTTP and wheel caches.
///
/// Actions: info, list (wheel only), rm <pattern>... (wheel only), purge.
#[derive(Debug, Parser)]
#[command(name = "pkgcache", version)]
struct Cli {
    /// The cache upon which to operate: all, http, wheel [default: wheel]
    #[arg(short = 't', long = "type", value_parser = parse_cache_type)]
    cache_type: Option<CacheType>,

    /// Root directory holding the `http` and `wheels` caches
    #[arg(long, env = "PKGCACHE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// JSON config file with a `cache` section
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log traversal and removal details
    #[arg(short, long)]
    verbose: bool,

    /// One of: info, list, rm, purge
    action: Option<String>,

    /// Wheel filename patterns for `rm`
    targets: Vec<String>,
}

fn parse_cache_type(s: &str) -> std::result::Result<CacheType, String> {
    s.parse().map_err(|e: CoreError| e.to_string())
}

struct ConsoleReporter<O, E> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> Reporter for ConsoleReporter<O, E> {
    fn info(&mut self, message: &str) {
        let _ = writeln!(self.out, "{}", message);
    }

    fn warn(&mut self, message: &str) {
        let _ = writeln!(self.err, "WARNING: {}", message);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(if cli.verbose { "debug" } else { "info" });

    let reporter = ConsoleReporter {
        out: io::stdout().lock(),
        err: io::stderr().lock(),
    };
    match run(&cli, reporter) {
        Ok(status) => ExitCode::from(status.exit_code() as u8),
        Err(err) => {
            let usage = err
                .downcast_ref::<CoreError>()
                .map(CoreError::is_usage)
                .unwrap_or(false);
            eprintln!("ERROR: {:#}", err);
            if usage {
                ExitCode::from(USAGE_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: &Cli, reporter: impl Reporter) -> Result<Status> {
    let action = CacheAction::parse(cli.action.as_deref(), cli.targets.as_slice())?;
    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    let cache_type = cli
        .cache_type
        .or(config.cache.default_type)
        .unwrap_or_default();
    let manager = CacheManager::new(resolve_root(cli, &config)?);
    tracing::debug!(root = %manager.root_dir().display(), cache_type = %cache_type, action = %action, "resolved cache command");
    Ok(manager.run(cache_type, &action, reporter)?)
}

fn resolve_root(cli: &Cli, config: &CoreConfig) -> Result<PathBuf> {
    if let Some(dir) = cli.cache_dir.clone().or_else(|| config.cache.root_dir.clone()) {
        return Ok(dir);
    }
    let base = dirs::cache_dir().context("could not determine the user cache directory")?;
    Ok(base.join("pip"))
}
