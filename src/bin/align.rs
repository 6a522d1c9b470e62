use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use fphot::{
    align_ts,
    io::{read_channel_csv, read_timestamp_file, write_master_csv},
    TimestampSource,
};

#[derive(Parser)]
#[command(name = "align", about = "Align behavior and event timestamps to recording frames")]
struct Args {
    /// Per-channel CSV written by `process`
    #[arg(long)]
    signal: PathBuf,

    /// Headerless timestamp CSVs or workbooks (keydown, behavior, digital I/O, …)
    #[arg(long, num_args = 1..)]
    timestamps: Vec<PathBuf>,

    /// Aligned master CSV output path
    #[arg(long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let master = read_channel_csv(&args.signal)
        .with_context(|| format!("reading {}", args.signal.display()))?;
    let mut sources = Vec::with_capacity(args.timestamps.len());
    for path in &args.timestamps {
        let grid = read_timestamp_file(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sources.push(TimestampSource::new(name, grid));
    }

    let out = align_ts(&master, &sources, &[])?;
    for (name, kind) in &out.kinds {
        println!("{name}: {kind}");
    }
    for (name, _) in &out.residual {
        println!("not merged: {name}");
    }
    println!(
        "{} rows, {} events, {} warning(s)",
        out.master.rows.len(),
        out.master.n_events(),
        out.diagnostics.len()
    );

    write_master_csv(&out.master, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Written → {}", args.output.display());
    Ok(())
}
