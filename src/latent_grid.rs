#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Context, bail};
use burn_wgpu::{Wgpu, WgpuDevice};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vae_gen::ARTIFACT_DIR;
use vae_gen::artifacts::load_decoder;
use vae_gen::generation::{GridSpec, decode_grid};

// --- CLI DEFINITION ---

/// Decodes a `size × size` grid of latent points into one PNG mosaic.
///
/// Grid coordinates are the inverse standard-normal CDF of evenly spaced
/// percentiles, so the grid covers the prior's bulk. The first two latent
/// dimensions vary across the grid; any further dimensions stay fixed.
///
/// Example:
/// ```bash
/// cargo run --release --bin latent_grid -- --size 15 --low 0.05 --high 0.95
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about = "VAE Latent Grid Generator")]
struct Args {
    /// Directory holding the trained config and decoder.
    #[arg(long, default_value = ARTIFACT_DIR)]
    artifact_dir: PathBuf,

    /// Cells per side.
    #[arg(long, default_value_t = 15)]
    size: usize,

    /// Lowest percentile on both axes.
    #[arg(long, default_value_t = 0.05)]
    low: f64,

    /// Highest percentile on both axes.
    #[arg(long, default_value_t = 0.95)]
    high: f64,

    /// Values for latent dimensions 2.. (only used when latent_dim > 2).
    #[arg(long, value_delimiter = ' ', num_args = 1.., allow_hyphen_values = true)]
    rest: Option<Vec<f32>>,

    /// File path for the saved mosaic.
    #[arg(short, long, default_value = "latent_grid.png")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    type InferenceBackend = Wgpu;
    let device = WgpuDevice::DefaultDevice;

    let (config, decoder) = load_decoder::<InferenceBackend>(&args.artifact_dir, &device)
        .with_context(|| {
            format!(
                "failed to load decoder from {}. Did you train the model?",
                args.artifact_dir.display()
            )
        })?;
    info!("Decoder loaded successfully.");

    let mut base = vec![0.0; config.latent_dim];
    if let Some(rest) = &args.rest {
        if rest.len() + 2 != config.latent_dim {
            bail!(
                "--rest has {} values, but latent_dim={} needs {}",
                rest.len(),
                config.latent_dim,
                config.latent_dim.saturating_sub(2)
            );
        }
        base[2..].copy_from_slice(rest);
    }

    let spec = GridSpec {
        size: args.size,
        low: args.low,
        high: args.high,
    };
    info!(
        "Generating {}x{} grid over percentiles [{}, {}]",
        spec.size, spec.size, spec.low, spec.high
    );

    let canvas = decode_grid(&decoder, &spec, &base, config.batch_size, &device)?;
    canvas.save_png(&args.output)?;

    info!(
        width = canvas.width,
        height = canvas.height,
        "Saved grid to {}",
        args.output.display()
    );
    Ok(())
}
