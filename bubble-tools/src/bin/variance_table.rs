//! Tabulate σ(R) of a power spectrum over log-spaced radii.
//!
//! Without `--spectrum` a power law `Δ² = A k^n` is used. The spectrum is
//! rescaled to the σ_8 of the cosmology unless `--raw` is given.
//!
//! Usage:
//! ```
//! cargo run --release --bin variance_table -- --r-min 0.04 --r-max 50 --count 1000 --output sig0.json
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use bubble_tools::shared_args::{write_json, RuntimeArgs};
use clap::Parser;
use cosmo_math::{
    CosmologyParams, PowerLaw, PowerSpectrum, TabulatedSpectrum, VarianceIntegrator,
};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "variance_table",
    about = "Top-hat mass variance σ(R) over a range of radii",
    long_about = None
)]
struct Args {
    /// Smallest radius in Mpc
    #[arg(long, default_value_t = 0.04)]
    r_min: f64,

    /// Largest radius in Mpc
    #[arg(long, default_value_t = 50.0)]
    r_max: f64,

    /// Number of log-spaced radii
    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Tabulated spectrum JSON: { "k": [...], "delta_squared": [...] }
    #[arg(long)]
    spectrum: Option<PathBuf>,

    /// Power-law amplitude A
    #[arg(long, default_value_t = 1.0)]
    amplitude: f64,

    /// Power-law index n of Δ²
    #[arg(long, default_value_t = 1.0)]
    index: f64,

    /// Cosmology JSON; Planck 2015 if absent
    #[arg(long)]
    cosmology: Option<PathBuf>,

    /// Skip the σ_8 normalization
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Output JSON
    #[arg(long, default_value = "sigma0.json")]
    output: PathBuf,

    #[command(flatten)]
    runtime: RuntimeArgs,
}

#[derive(Deserialize)]
struct SpectrumFile {
    k: Vec<f64>,
    delta_squared: Vec<f64>,
}

#[derive(Serialize)]
struct VarianceTable {
    radius: Vec<f64>,
    mass: Vec<f64>,
    sigma: Vec<f64>,
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn log_spaced(r_min: f64, r_max: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![r_min];
    }
    let (lo, hi) = (r_min.ln(), r_max.ln());
    (0..count)
        .map(|i| (lo + (hi - lo) * i as f64 / (count - 1) as f64).exp())
        .collect()
}

fn tabulate<P: PowerSpectrum>(
    integrator: VarianceIntegrator<P>,
    cosmology: &CosmologyParams,
    radii: Vec<f64>,
) -> Result<VarianceTable> {
    let variance = integrator.variance_curve(&radii)?;
    Ok(VarianceTable {
        mass: radii.iter().map(|&r| cosmology.radius_to_mass(r)).collect(),
        sigma: variance.into_iter().map(f64::sqrt).collect(),
        radius: radii,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.runtime.init()?;

    ensure!(
        args.r_min > 0.0 && args.r_max >= args.r_min,
        "radii must satisfy 0 < r_min <= r_max"
    );
    ensure!(args.count > 0, "--count must be positive");

    let cosmology = match &args.cosmology {
        Some(path) => load_json::<CosmologyParams>(path)?,
        None => CosmologyParams::default(),
    };
    cosmology.validate()?;
    let radii = log_spaced(args.r_min, args.r_max, args.count);

    println!("Variance table");
    println!("==============");
    println!(
        "Radii: {} from {} to {} Mpc",
        args.count, args.r_min, args.r_max
    );
    println!("sigma_8: {} (normalize: {})", cosmology.sigma_8, !args.raw);

    let table = match &args.spectrum {
        Some(path) => {
            let file: SpectrumFile = load_json(path)?;
            let spectrum = TabulatedSpectrum::new(&file.k, &file.delta_squared)
                .with_context(|| format!("Invalid spectrum table {}", path.display()))?;
            let (k_lo, k_hi) = spectrum.k_range();
            info!("Tabulated spectrum over k in [{k_lo:.3e}, {k_hi:.3e}]");
            let spectrum = if args.raw {
                spectrum
            } else {
                let factor = VarianceIntegrator::new(spectrum.clone()).sigma_8_factor(&cosmology)?;
                info!("Spectrum rescaled by {factor:.6e}");
                spectrum.scaled(factor)
            };
            tabulate(VarianceIntegrator::new(spectrum), &cosmology, radii)?
        }
        None => {
            let mut spectrum = PowerLaw::new(args.amplitude, args.index);
            if !args.raw {
                let factor = VarianceIntegrator::new(spectrum).sigma_8_factor(&cosmology)?;
                info!("Power-law amplitude rescaled by {factor:.6e}");
                spectrum = spectrum.scaled(factor);
            }
            tabulate(VarianceIntegrator::new(spectrum), &cosmology, radii)?
        }
    };

    write_json(&table, &args.output)?;
    println!("Table written to {}", args.output.display());
    Ok(())
}
