use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use bubbles::{Binning, Connectivity, SizeDistribution, Strategy};
use clap::{Args, ValueEnum};
use serde::Serialize;

/// Parse box dimensions in format "nz,ny,nx"
pub fn parse_dims(s: &str) -> Result<[usize; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("Dimensions must be in format 'nz,ny,nx'".to_string());
    }

    let mut dims = [0usize; 3];
    for (dim, part) in dims.iter_mut().zip(&parts) {
        *dim = part
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid dimension '{}'", part.trim()))?;
        if *dim == 0 {
            return Err("Dimensions must be positive".to_string());
        }
    }
    Ok(dims)
}

/// Neighbour connectivity as a command-line value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectivityArg {
    /// 6 neighbours in 3-D
    Face,
    /// 18 neighbours in 3-D
    Edge,
    /// 26 neighbours in 3-D
    Vertex,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Face => Connectivity::Face,
            ConnectivityArg::Edge => Connectivity::Edge,
            ConnectivityArg::Vertex => Connectivity::Vertex,
        }
    }
}

/// H-transform engine as a command-line value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    NeighborFlood,
    RegionMerge,
    FloodThenMerge,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::NeighborFlood => Strategy::NeighborFlood,
            StrategyArg::RegionMerge => Strategy::RegionMerge,
            StrategyArg::FloodThenMerge => Strategy::FloodThenMerge,
        }
    }
}

/// Bin count used when switching to linear binning without `--bins`.
pub const LINEAR_BINS: usize = 100;

/// Histogram options shared by the size-distribution tools
#[derive(Args, Debug, Clone)]
pub struct BinningArgs {
    /// Number of histogram bins
    #[arg(long)]
    pub bins: Option<usize>,

    /// Bin linearly in radius instead of in ln(radius)
    #[arg(long, default_value_t = false)]
    pub linear: bool,
}

impl BinningArgs {
    /// Resolve against a fallback binning, usually the configured one.
    pub fn resolve(&self, fallback: Binning) -> Binning {
        match (self.linear, fallback) {
            (_, Binning::Linear { bins }) if self.bins.is_none() => Binning::Linear { bins },
            (true, _) => Binning::Linear {
                bins: self.bins.unwrap_or(LINEAR_BINS),
            },
            (false, _) => Binning::Log {
                bins: self.bins.unwrap_or(fallback.bins()),
            },
        }
    }
}

/// Runtime options common to every binary
#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Worker threads for parallel stages (0 = rayon default)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl RuntimeArgs {
    /// Initialize logging and the global thread pool.
    pub fn init(&self) -> Result<()> {
        let default_level = if self.debug { "debug" } else { "info" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .init();

        if self.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build_global()
                .context("Failed to configure the rayon thread pool")?;
        }
        Ok(())
    }
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Print a size distribution as a two-column table.
pub fn print_distribution(distribution: &SizeDistribution) {
    let header = match distribution.binning {
        Binning::Log { .. } => "dP/dlnR",
        Binning::Linear { .. } => "dn/dR",
    };
    println!("{:>14} {:>14}", "R", header);
    for (radius, density) in distribution.radii.iter().zip(&distribution.density) {
        println!("{radius:>14.6e} {density:>14.6e}");
    }
}
