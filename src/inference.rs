#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Context, bail};
use burn::tensor::{Tensor, TensorData};
use burn_wgpu::{Wgpu, WgpuDevice};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vae_gen::artifacts::load_decoder;
use vae_gen::generation::{Canvas, decode_point};
use vae_gen::{ARTIFACT_DIR, LatentSampler, SeededNoise};

// --- CLI DEFINITION ---

/// Command-line interface for single-image generation.
///
/// - Provide a latent mean vector (`--mu`) to decode that exact point
/// - Add a log-variance vector (`--log-var`) to sample around it instead
/// - Omit both to sample the latent point from the standard normal prior
#[derive(Parser, Debug)]
#[command(author, version, about = "VAE Inference Generator")]
struct Args {
    /// Directory holding the trained config and decoder.
    #[arg(long, default_value = ARTIFACT_DIR)]
    artifact_dir: PathBuf,

    /// Mean (μ) of the latent distribution. Must contain exactly `latent_dim` values.
    ///
    /// Example:
    /// `--mu 0.5 -1.2`
    #[arg(long, value_delimiter = ' ', num_args = 1.., allow_hyphen_values = true)]
    mu: Option<Vec<f32>>,

    /// Log-variance entries, used only together with `--mu`.
    ///
    /// When supplied the sampler draws:
    /// ```text
    /// z = mu + exp(log_var) * eps
    /// ```
    #[arg(long, value_delimiter = ' ', num_args = 1.., allow_hyphen_values = true)]
    log_var: Option<Vec<f32>>,

    /// Seed for the noise source; fresh entropy when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// File path for the saved output image.
    #[arg(short, long, default_value = "generated_digit.png")]
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

    let mut noise = match args.seed {
        Some(seed) => SeededNoise::new(seed),
        None => SeededNoise::from_entropy(),
    };
    let latent_dim = config.latent_dim;

    let to_row = |values: Vec<f32>| {
        Tensor::<InferenceBackend, 2>::from_floats(
            TensorData::new(values, vec![1, latent_dim]),
            &device,
        )
    };

    // Two modes:
    // - MANUAL INPUT: --mu [and optionally --log-var]
    // - RANDOM MODE: z ~ N(0, 1)
    let z: Vec<f32> = match (args.mu, args.log_var) {
        (Some(mu), log_var) => {
            if mu.len() != latent_dim {
                bail!(
                    "--mu has {} elements, but the model requires latent_dim={latent_dim}",
                    mu.len()
                );
            }
            match log_var {
                Some(log_var) => {
                    if log_var.len() != latent_dim {
                        bail!(
                            "--log-var has {} elements, but the model requires \
                             latent_dim={latent_dim}",
                            log_var.len()
                        );
                    }
                    info!("Sampling around the provided mu with the provided log-variance.");
                    LatentSampler::new()
                        .sample(to_row(mu), to_row(log_var), &mut noise)?
                        .into_data()
                        .to_vec()
                        .map_err(|e| anyhow::anyhow!("failed to read latent sample: {e:?}"))?
                }
                None => {
                    info!("No log-variance provided. Decoding mu deterministically.");
                    mu
                }
            }
        }
        (None, Some(_)) => bail!("--log-var requires --mu"),
        (None, None) => {
            info!("No inputs provided. Sampling from the standard normal prior.");
            LatentSampler::new()
                .sample(
                    to_row(vec![0.0; latent_dim]),
                    to_row(vec![0.0; latent_dim]),
                    &mut noise,
                )?
                .into_data()
                .to_vec()
                .map_err(|e| anyhow::anyhow!("failed to read latent sample: {e:?}"))?
        }
    };
    info!(?z, "latent point");

    let image = decode_point(&decoder, &z, &device)?;
    let canvas = Canvas::assemble(&[image], decoder.img_shape(), 1)?;
    canvas.save_png(&args.output)?;

    info!("Saved image to {}", args.output.display());
    Ok(())
}
