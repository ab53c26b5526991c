use clap::Parser;
use dirsort::cli::{Cli, run_cli};
use std::fs::OpenOptions;
use std::process;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: could not open log file: {}", e);
        process::exit(1);
    }

    process::exit(run_cli(&cli));
}

/// Logs go to stderr, or to `--log-file` when given. `RUST_LOG` overrides
/// the default level.
fn init_logging(cli: &Cli) -> std::io::Result<()> {
    let default_level = match (cli.verbose, &cli.log_file) {
        (true, _) => "debug",
        (false, Some(_)) => "info",
        (false, None) => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}
