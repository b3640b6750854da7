//! Ponte CLI
//!
//! Hosts a ponte native library outside an engine: runs it for a number
//! of frames from a `ponte.toml`, or checks its exports.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ponte_cli::commands::{inspect, run};

#[derive(Parser)]
#[command(name = "ponte")]
#[command(about = "Host and inspect ponte native libraries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a native library and drive it for a number of frames
    Run {
        /// Config file (defaults to ./ponte.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Native library path, overrides [library] path
        #[arg(short, long)]
        library: Option<PathBuf>,
        /// Frames to run, overrides `frames`
        #[arg(short, long)]
        frames: Option<u64>,
    },

    /// Check a native library for the exports the bridge needs
    Inspect {
        /// Native library path
        library: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("PONTE_LOG", "info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            library,
            frames,
        } => run::execute(run::RunOptions {
            config,
            library,
            frames,
        }),
        Commands::Inspect { library } => inspect::execute(&library),
    }
}
