//! MECHSIM CLI - Command-line interface
//!
//! Commands:
//! - simulate: Play one engagement and print the outcome
//! - replay: Play one engagement and write its trace as JSON
//! - batch: Median turns-to-defeat over many engagements

mod batch_cmd;
mod scenario;
mod simulate_cmd;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use batch_cmd::BatchArgs;
use simulate_cmd::{ReplayArgs, SimulateArgs};

#[derive(Parser)]
#[command(name = "mechsim")]
#[command(about = "Hex-map mech combat simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single engagement
    Simulate(SimulateArgs),
    /// Play a single engagement and write the replay trace
    Replay(ReplayArgs),
    /// Run many engagements and report the median
    Batch(BatchArgs),
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so --json output stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => simulate_cmd::run(args),
        Commands::Replay(args) => simulate_cmd::run_replay(args),
        Commands::Batch(args) => batch_cmd::run(args),
    }
}
