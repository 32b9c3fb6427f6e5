//! djiconnect - permission-gated SDK registration with debounced connection tracking
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use djiconnect::{HeadlessEvent, HeadlessOptions};
use djiconnect_app::config::{init_config_dir, load_settings, load_settings_file};
use djiconnect_sdk::Scenario;

/// djiconnect - permission-gated SDK registration with debounced connection tracking
#[derive(Parser, Debug)]
#[command(name = "djiconnect")]
#[command(about = "Register with the device SDK and report connectivity as NDJSON", long_about = None)]
struct Args {
    /// Settings file (defaults to .djiconnect/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Simulated SDK scenario (defaults to a successful connect)
    #[arg(long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// Quit after this many milliseconds
    #[arg(long, value_name = "MS")]
    exit_after_ms: Option<u64>,

    /// Permission the simulated user refuses (repeatable)
    #[arg(long = "deny", value_name = "PERMISSION")]
    denied: Vec<String>,

    /// Simulate a platform without runtime permission requests
    #[arg(long)]
    no_runtime_requests: bool,

    /// Write a default .djiconnect/config.toml and exit
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    djiconnect_core::logging::init()?;

    let cwd = std::env::current_dir()?;
    if args.init {
        init_config_dir(&cwd)?;
        eprintln!("Wrote default configuration to {}", cwd.join(".djiconnect").display());
        return Ok(());
    }

    let settings = match &args.config {
        Some(path) => load_settings_file(path)?,
        None => load_settings(&cwd),
    };
    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };

    let options = HeadlessOptions {
        settings,
        scenario,
        denied: args.denied,
        no_runtime_requests: args.no_runtime_requests,
        exit_after: args.exit_after_ms.map(Duration::from_millis),
    };

    if let Err(e) = djiconnect::run_headless(options).await {
        HeadlessEvent::error(e.to_string(), e.is_fatal()).emit();
        return Err(e.into());
    }
    Ok(())
}
