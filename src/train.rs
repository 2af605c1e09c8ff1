#![recursion_limit = "256"]

use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::{
    config::Config,
    data::{dataloader::DataLoaderBuilder, dataset::vision::MnistDataset},
    optim::Optimizer,
    tensor::backend::AutodiffBackend,
};
use burn_wgpu::{Wgpu, WgpuDevice};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vae_gen::artifacts::save_artifacts;
use vae_gen::data::ImageBatcher;
use vae_gen::trainer::{Trainer, adam_optimizer, rmsprop_optimizer};
use vae_gen::{ARTIFACT_DIR, OptimizerKind, SeededNoise, VaeConfig, VaeModel};

// --- CLI DEFINITION ---

/// Trains the convolutional VAE on MNIST and writes the config, the full model
/// and the decoder snapshot into the artifact directory.
#[derive(Parser, Debug)]
#[command(author, version, about = "VAE Trainer")]
struct Args {
    /// Start from a saved JSON config instead of the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    latent_dim: Option<usize>,

    /// Weight of the KL term, in (0, 1).
    #[arg(long)]
    kl_weight: Option<f64>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long, value_parser = parse_optimizer)]
    optimizer: Option<OptimizerKind>,

    /// Clip gradients to this L2 norm.
    #[arg(long)]
    grad_clip_norm: Option<f32>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    num_workers: Option<usize>,

    /// Where the trained artifacts are written.
    #[arg(short, long, default_value = ARTIFACT_DIR)]
    artifact_dir: PathBuf,
}

fn parse_optimizer(value: &str) -> Result<OptimizerKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "rmsprop" => Ok(OptimizerKind::RmsProp),
        "adam" => Ok(OptimizerKind::Adam),
        other => Err(format!("unknown optimizer `{other}` (expected rmsprop or adam)")),
    }
}

impl Args {
    fn to_config(&self) -> anyhow::Result<VaeConfig> {
        let mut config = match &self.config {
            Some(path) => VaeConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => VaeConfig::new(),
        };

        if let Some(v) = self.epochs {
            config.num_epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.latent_dim {
            config.latent_dim = v;
        }
        if let Some(v) = self.kl_weight {
            config.kl_weight = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.optimizer {
            config.optimizer = v;
        }
        if self.grad_clip_norm.is_some() {
            config.grad_clip_norm = self.grad_clip_norm;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.num_workers {
            config.num_workers = v;
        }

        config.validate()?;
        Ok(config)
    }
}

// --- Training Loop ---

/// Builds the model and data loaders, trains, then saves the artifacts.
fn training_loop<B, O>(
    config: &VaeConfig,
    optimizer: O,
    device: B::Device,
    artifact_dir: &Path,
) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    O: Optimizer<VaeModel<B>, B>,
{
    info!("Configuration: {config:?}");
    info!("Using Device: {device:?}");

    let model = VaeModel::<B>::new(config, &device)?;

    let batcher = ImageBatcher::mnist();
    let train_loader = DataLoaderBuilder::new(batcher.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(MnistDataset::train());
    let valid_loader = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .set_device(device.clone())
        .build(MnistDataset::test());

    let mut trainer = Trainer::new(model, optimizer, SeededNoise::new(config.seed), config)?;

    info!("Starting training...");
    let summaries = trainer
        .fit(train_loader, Some(valid_loader), config.num_epochs)
        .context("training failed")?;

    if let Some(last) = summaries.last() {
        info!(
            epochs = summaries.len(),
            train_loss = last.train_loss,
            valid_loss = ?last.valid_loss,
            "training finished"
        );
    }

    save_artifacts(trainer.model(), config, artifact_dir)
        .with_context(|| format!("failed to save artifacts to {}", artifact_dir.display()))?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.to_config()?;

    // Autodiff wrapper is required for training to enable gradient tracking.
    type TrainBackend = burn::backend::Autodiff<Wgpu>;
    let device = WgpuDevice::DefaultDevice;

    match config.optimizer {
        OptimizerKind::RmsProp => training_loop::<TrainBackend, _>(
            &config,
            rmsprop_optimizer::<TrainBackend>(&config),
            device,
            &args.artifact_dir,
        ),
        OptimizerKind::Adam => training_loop::<TrainBackend, _>(
            &config,
            adam_optimizer::<TrainBackend>(&config),
            device,
            &args.artifact_dir,
        ),
    }
}
