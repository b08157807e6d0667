//! CLI entry point for evtag-shell
//!
//! Loads a server configuration, builds the rule engine chain once and replays commands
//! against an in-memory catalog.
//!
//! # Examples
//!
//! Batch mode:
//! ```bash
//! ./evtag-shell --config server_config.json --script scenario.txt
//! ```
//!
//! From stdin:
//! ```bash
//! printf 'put f hello\nmeta-ls f\n' | ./evtag-shell --config server_config.json
//! ```

use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use clap::Parser;
use evtag_core::event_handler::{
    infrastructure::config::ServerConfig, services::storage::DEFAULT_RESOURCE,
};
use evtag_shell::{DEFAULT_HOME, Shell};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "evtag-shell")]
#[command(about = "Replay storage commands against an event-tagging stack", long_about = None)]
struct Args {
    /// Server configuration file (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Script of commands to execute, read from stdin when absent
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Home collection relative paths are resolved against
    #[arg(long, default_value = DEFAULT_HOME)]
    home: String,

    /// Resource new objects are created on
    #[arg(long, default_value = DEFAULT_RESOURCE)]
    resource: String,
}

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    evtag_core::logging::init();

    let args = Args::parse();
    let config = ServerConfig::from_path(&args.config)?;
    let (mut shell, report) = Shell::new(&config, &args.home, &args.resource);
    for (instance_name, e) in &report.failed {
        eprintln!("✗ Rule engine instance {instance_name} not started: {e}");
    }
    info!(started = ?report.started, skipped = ?report.skipped, "Rule engine chain built.");

    let lines = match &args.script {
        Some(path) => io::BufReader::new(std::fs::File::open(path)?)
            .lines()
            .collect::<Result<Vec<_>, _>>()?,
        None => io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?,
    };

    let start_time = std::time::Instant::now();
    let failures = shell.run(lines, &mut io::stdout(), &mut io::stderr()).await?;
    info!(execution_time = ?start_time.elapsed(), failures, "Script execution completed.");

    if failures > 0 {
        anyhow::bail!("{failures} command(s) failed");
    }
    Ok(())
}
