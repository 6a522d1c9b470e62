use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use fphot::{io::{read_samples_csv, write_channel_csv}, process, PipelineConfig};

#[derive(Parser)]
#[command(name = "process", about = "Load, debleach and z-score a fiber-photometry recording")]
struct Args {
    /// Raw recording CSV (FrameCounter, SystemTimestamp, LedState, regions…)
    #[arg(long)]
    input: PathBuf,

    /// JSON pipeline configuration
    #[arg(long)]
    config: PathBuf,

    /// Directory for the per-channel CSVs
    #[arg(long)]
    out_dir: PathBuf,

    /// Channels to export (comma-separated); overrides the config
    #[arg(long)]
    channels: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = PipelineConfig::from_json_file(&args.config)
        .with_context(|| format!("reading config {}", args.config.display()))?;
    let raw = read_samples_csv(&args.input)
        .with_context(|| format!("reading recording {}", args.input.display()))?;
    println!("Loaded {} frames × {} regions", raw.rows.len(), raw.regions.len());

    let out = process(&raw, &cfg)?;
    println!(
        "Corrected {} target(s), {} warning(s)",
        out.fits.len(),
        out.diagnostics.len()
    );
    if let Some(peaks) = &out.peaks {
        for r in &peaks.regions {
            println!("  {}: {} peaks", r.region, peaks.peak_rows(&r.region).len());
        }
    }

    let channels: Vec<String> = match &args.channels {
        Some(s) => s.split(',').map(str::to_string).collect(),
        None => cfg.export_channels.clone(),
    };
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    for ch in &channels {
        let path = args.out_dir.join(format!("{stem}_{ch}.csv"));
        write_channel_csv(&out.table, ch, out.peaks.as_ref(), &path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Written → {}", path.display());
    }
    Ok(())
}
