mod batch;
mod denoise;
mod filters;
mod normalise;
mod sort;
mod stack;

use clap::{Parser, Subcommand};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "septscreen", about = "septscreen CLI: denoise, normalise, sort")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Denoise(denoise::DenoiseArgs),
    Normalise(normalise::NormaliseArgs),
    Sort(sort::SortArgs),
}

fn progress(prog: f64, msg: &str) {
    let _ = writeln!(
        io::stderr(),
        "{}",
        serde_json::json!({"progress": prog, "message": msg})
    );
    let _ = io::stderr().flush();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Denoise(args) => denoise::run(args, progress)?,
        Commands::Normalise(args) => normalise::run(args, progress)?,
        Commands::Sort(args) => sort::run(args, progress)?,
    }
    Ok(())
}
