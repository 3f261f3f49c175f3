//! Segment an ionization box into bubbles and report their size distribution.
//!
//! The input is either a raw little-endian `f32` box (`--format raw`, with
//! `--dims`) or a JSON field archive that may carry its own mask.
//!
//! Usage:
//! ```
//! cargo run --release --bin bubble_sizes -- xH_z008.raw --dims 200,200,200 --box-size 100 --invert
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bubble_tools::shared_args::{
    parse_dims, print_distribution, write_json, BinningArgs, ConnectivityArg, RuntimeArgs,
    StrategyArg,
};
use bubbles::{
    read_raw_box, BubblePipeline, FieldArchive, PipelineConfig, SegmentationArchive, Smoothing,
};
use clap::{Parser, ValueEnum};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// Little-endian f32 voxels in [z, y, x] order
    Raw,
    /// JSON field archive
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SmoothingArg {
    /// H-maximum transform
    Hmax,
    /// Grow raw maxima by dilation
    Dilation,
    /// Seed from raw maxima
    None,
}

#[derive(Parser, Debug)]
#[command(
    name = "bubble_sizes",
    about = "Watershed segmentation of ionized bubbles",
    long_about = None
)]
struct Args {
    /// Input box
    input: PathBuf,

    /// Input file format
    #[arg(long, value_enum, default_value_t = InputFormat::Raw)]
    format: InputFormat,

    /// Box dimensions for raw input (format: "nz,ny,nx")
    #[arg(long, value_parser = parse_dims)]
    dims: Option<[usize; 3]>,

    /// JSON pipeline configuration; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// H-transform height
    #[arg(long)]
    h: Option<f64>,

    /// Neighbour connectivity
    #[arg(long, value_enum)]
    connectivity: Option<ConnectivityArg>,

    /// H-transform engine (implies --smoothing hmax)
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Smoothing applied to the distance field before seeding
    #[arg(long, value_enum)]
    smoothing: Option<SmoothingArg>,

    /// Voxels at or above this value are ionized
    #[arg(long)]
    threshold: Option<f64>,

    /// Treat the input as a neutral fraction and use 1 - value
    #[arg(long, default_value_t = false)]
    invert: bool,

    /// Fail when the region merge does not reach its fixed point
    #[arg(long, default_value_t = false)]
    require_convergence: bool,

    /// Comoving length of the box along its last axis; 1 voxel = 1 unit if absent
    #[arg(long)]
    box_size: Option<f64>,

    #[command(flatten)]
    binning: BinningArgs,

    /// Write the segmentation archive here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the size distribution as JSON here
    #[arg(long)]
    distribution: Option<PathBuf>,

    #[command(flatten)]
    runtime: RuntimeArgs,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(h) = self.h {
            config.hmax.h = h;
        }
        if let Some(connectivity) = self.connectivity {
            config.connectivity = connectivity.into();
        }
        if let Some(threshold) = self.threshold {
            config.ionized_threshold = threshold;
        }
        if self.invert {
            config.invert = true;
        }
        if self.require_convergence {
            config.require_convergence = true;
        }
        match (self.smoothing, self.strategy) {
            (Some(SmoothingArg::Dilation), None) => config.smoothing = Smoothing::Dilation,
            (Some(SmoothingArg::None), None) => config.smoothing = Smoothing::None,
            (Some(SmoothingArg::Hmax) | None, Some(strategy)) => {
                config.smoothing = Smoothing::HMax {
                    strategy: strategy.into(),
                }
            }
            (Some(SmoothingArg::Hmax), None) => {
                if !matches!(config.smoothing, Smoothing::HMax { .. }) {
                    config.smoothing = Smoothing::default();
                }
            }
            (None, None) => {}
            (Some(other), Some(_)) => {
                bail!("--strategy cannot be combined with --smoothing {other:?}")
            }
        }
        config.binning = self.binning.resolve(config.binning);
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.runtime.init()?;

    let config = args.pipeline_config()?;
    let pipeline = BubblePipeline::new(config.clone()).context("Invalid pipeline configuration")?;

    println!("Bubble segmentation");
    println!("===================");
    println!("Input: {}", args.input.display());
    println!(
        "Threshold: {} (invert: {})",
        config.ionized_threshold, config.invert
    );
    println!("Connectivity: {:?}", config.connectivity);
    println!("Smoothing: {:?} (h = {})", config.smoothing, config.hmax.h);

    let output = match args.format {
        InputFormat::Raw => {
            let Some(dims) = args.dims else {
                bail!("--dims is required for raw input");
            };
            let field = read_raw_box(&args.input, dims)
                .with_context(|| format!("Failed to read {}", args.input.display()))?;
            pipeline.run(&field.view())?
        }
        InputFormat::Json => {
            let archive = FieldArchive::load_from_file(&args.input)
                .with_context(|| format!("Failed to read {}", args.input.display()))?;
            match &archive.mask {
                Some(mask) => pipeline.run_masked(&archive.field.view(), &mask.view())?,
                None => pipeline.run(&archive.field.view())?,
            }
        }
    };

    let last_axis = output.labels.shape()[2];
    let scale = args.box_size.map_or(1.0, |size| size / last_axis as f64);
    info!("Voxel scale {scale}");

    println!();
    println!("Filling fraction: {:.4}", output.filling_fraction);
    println!("Regions: {}", output.region_count());
    println!();

    let distribution = output
        .size_distribution(scale, config.binning)
        .context("Failed to build the size distribution")?;
    print_distribution(&distribution);

    if let Some(path) = &args.distribution {
        write_json(&distribution, path)?;
        println!("\nSize distribution written to {}", path.display());
    }
    if let Some(path) = &args.output {
        SegmentationArchive::from_output(output, scale)
            .save_to_file(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Segmentation written to {}", path.display());
    }

    Ok(())
}
