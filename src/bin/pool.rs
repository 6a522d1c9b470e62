use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use fphot::{io::{read_master_csv, write_windows_csv}, pool_events};

#[derive(Parser)]
#[command(name = "pool", about = "Cut peri-event windows from an aligned master table")]
struct Args {
    /// Aligned master CSV written by `align`
    #[arg(long)]
    input: PathBuf,

    /// Event window CSV output path
    #[arg(long)]
    output: PathBuf,

    /// Frames before each event (negative)
    #[arg(long, default_value_t = -500, allow_hyphen_values = true)]
    pre: i64,

    /// Frames after each event
    #[arg(long, default_value_t = 500)]
    post: i64,

    /// Regions to keep (comma-separated, default: all)
    #[arg(long)]
    regions: Option<String>,

    /// Skip the pre-event z-score
    #[arg(long)]
    no_normalize: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let master = read_master_csv(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let regions: Vec<String> = match &args.regions {
        Some(s) => s.split(',').map(str::to_string).collect(),
        None => master.regions.clone(),
    };

    let windows = pool_events(&master, (args.pre, args.post), &regions, !args.no_normalize)?;
    println!(
        "Pooled {} events ({} rows)",
        windows.event_ids().len(),
        windows.rows.len()
    );

    write_windows_csv(&windows, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Written → {}", args.output.display());
    Ok(())
}
