//! Size distributions of saved segmentations.
//!
//! Each archive written by `bubble_sizes --output` carries its own filling
//! fraction and voxel scale, so boxes of different resolution can be compared
//! directly.
//!
//! Usage:
//! ```
//! cargo run --bin size_hist -- z008.json z010.json --bins 25
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bubble_tools::shared_args::{print_distribution, write_json, BinningArgs, RuntimeArgs};
use bubbles::{size_distribution, SegmentationArchive, SizeDistribution};
use clap::Parser;
use log::debug;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "size_hist",
    about = "Bubble size distributions from segmentation archives",
    long_about = None
)]
struct Args {
    /// Segmentation archives
    #[arg(required = true)]
    archives: Vec<PathBuf>,

    #[command(flatten)]
    binning: BinningArgs,

    /// Override the voxel scale stored in the archives
    #[arg(long)]
    scale: Option<f64>,

    /// Write all distributions as JSON here
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    runtime: RuntimeArgs,
}

#[derive(Serialize)]
struct ArchiveDistribution {
    archive: PathBuf,
    filling_fraction: f64,
    regions: usize,
    distribution: SizeDistribution,
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.runtime.init()?;

    let binning = args.binning.resolve(bubbles::Binning::default());
    let mut results = Vec::with_capacity(args.archives.len());

    for path in &args.archives {
        let archive = SegmentationArchive::load_from_file(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let scale = args.scale.unwrap_or(archive.scale);
        debug!("{}: scale {scale}", path.display());

        let distribution = size_distribution(
            &archive.labels.view(),
            archive.filling_fraction,
            scale,
            binning,
        )
        .with_context(|| format!("No size distribution for {}", path.display()))?;
        let regions = archive.labels.iter().copied().max().unwrap_or(0) as usize;

        println!("{}", path.display());
        println!(
            "  Q = {:.4}, {} regions, scale {}",
            archive.filling_fraction, regions, scale
        );
        print_distribution(&distribution);
        println!();

        results.push(ArchiveDistribution {
            archive: path.clone(),
            filling_fraction: archive.filling_fraction,
            regions,
            distribution,
        });
    }

    if let Some(path) = &args.output {
        write_json(&results, path)?;
        println!("Distributions written to {}", path.display());
    }
    Ok(())
}
