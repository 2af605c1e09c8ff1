use std::sync::Arc;

use burn::{
    data::dataloader::DataLoader,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig, decay::WeightDecayConfig},
    prelude::ElementConversion,
    tensor::{Tensor, backend::AutodiffBackend, backend::Backend},
};
use tracing::{debug, info};

use crate::config::VaeConfig;
use crate::data::ImageBatch;
use crate::error::{Result, VaeError};
use crate::loss::ensure_finite;
use crate::model::VaeModel;
use crate::sampler::NoiseSource;

// --- Optimizers ---

/// RMSprop settings matching Keras' defaults (`rho = 0.9`, `epsilon = 1e-7`), plus the
/// configured gradient clipping.
pub fn rmsprop_config(config: &VaeConfig) -> RmsPropConfig {
    RmsPropConfig::new()
        .with_alpha(0.9)
        .with_epsilon(1e-7)
        .with_grad_clipping(config.grad_clip_norm.map(GradientClippingConfig::Norm))
}

pub fn rmsprop_optimizer<B: AutodiffBackend>(
    config: &VaeConfig,
) -> impl Optimizer<VaeModel<B>, B> {
    rmsprop_config(config).init::<B, VaeModel<B>>()
}

/// Adam with weight decay (L2 regularization), plus the configured gradient clipping.
pub fn adam_optimizer<B: AutodiffBackend>(
    config: &VaeConfig,
) -> impl Optimizer<VaeModel<B>, B> {
    AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig { penalty: 1e-5 }))
        .with_grad_clipping(config.grad_clip_norm.map(GradientClippingConfig::Norm))
        .init::<B, VaeModel<B>>()
}

// --- Metrics ---

/// Host-side values of one training step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetrics {
    pub loss: f64,
    pub reconstruction: f64,
    pub kl: f64,
    /// Latent mean of the batch's first image, to spot a diverging encoder.
    pub first_z_mean: Vec<f32>,
    /// Latent log-variance of the batch's first image.
    pub first_z_log_var: Vec<f32>,
}

/// Aggregated result of one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean training loss over the epoch's batches.
    pub train_loss: f64,
    /// Mean validation loss, when a validation loader was supplied.
    pub valid_loss: Option<f64>,
    pub batches: usize,
}

// --- Trainer ---

/// Owns the model, its optimizer and the sampler's noise source for one run.
///
/// Every [`Trainer::step`] computes the loss against the current parameters and
/// either applies one full optimizer update or leaves the model as it was.
pub struct Trainer<B: AutodiffBackend, O, N> {
    model: VaeModel<B>,
    optimizer: O,
    noise: N,
    learning_rate: f64,
    kl_weight: f64,
}

impl<B, O, N> Trainer<B, O, N>
where
    B: AutodiffBackend,
    O: Optimizer<VaeModel<B>, B>,
    N: NoiseSource,
{
    pub fn new(model: VaeModel<B>, optimizer: O, noise: N, config: &VaeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            optimizer,
            noise,
            learning_rate: config.learning_rate,
            kl_weight: config.kl_weight,
        })
    }

    pub fn model(&self) -> &VaeModel<B> {
        &self.model
    }

    pub fn into_model(self) -> VaeModel<B> {
        self.model
    }

    /// One optimization step on a batch of images.
    ///
    /// # Errors
    /// * [`VaeError::Shape`] when the batch does not match the model.
    /// * [`VaeError::NumericInstability`] when the loss is not finite. The update
    ///   is skipped and the parameters stay unchanged.
    pub fn step(&mut self, images: Tensor<B, 4>) -> Result<StepMetrics> {
        let (output, loss) = self
            .model
            .forward_with_loss(images, &mut self.noise, self.kl_weight)?;

        let value = ensure_finite(loss.total.clone(), "training loss")?;
        let reconstruction = loss.reconstruction.into_scalar().elem::<f64>();
        let kl = loss.kl.into_scalar().elem::<f64>();
        let first_z_mean = first_row(output.z_mean)?;
        let first_z_log_var = first_row(output.z_log_var)?;

        // Backward pass & optimization step
        let grads = loss.total.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);

        Ok(StepMetrics {
            loss: value,
            reconstruction,
            kl,
            first_z_mean,
            first_z_log_var,
        })
    }

    /// Runs `num_epochs` passes over `train`, validating after each epoch when a
    /// validation loader is given.
    ///
    /// Stops at the first error; the model keeps every update applied before it.
    pub fn fit(
        &mut self,
        train: Arc<dyn DataLoader<B, ImageBatch<B>>>,
        valid: Option<Arc<dyn DataLoader<B::InnerBackend, ImageBatch<B::InnerBackend>>>>,
        num_epochs: usize,
    ) -> Result<Vec<EpochSummary>> {
        let mut summaries = Vec::with_capacity(num_epochs);

        for epoch in 1..=num_epochs {
            let mut total_loss = 0.0;
            let mut batch_count = 0;

            for (batch_num, batch) in train.iter().enumerate() {
                let metrics = self.step(batch.images)?;
                debug!(
                    epoch,
                    batch = batch_num,
                    loss = metrics.loss,
                    reconstruction = metrics.reconstruction,
                    kl = metrics.kl,
                    z_mean = ?metrics.first_z_mean,
                    z_log_var = ?metrics.first_z_log_var,
                    "train step"
                );
                total_loss += metrics.loss;
                batch_count += 1;
            }

            if batch_count == 0 {
                return Err(VaeError::config("training loader produced no batches"));
            }
            let train_loss = total_loss / batch_count as f64;

            let valid_loss = match &valid {
                Some(loader) => Some(evaluate(
                    &self.model.valid(),
                    loader.clone(),
                    &mut self.noise,
                    self.kl_weight,
                )?),
                None => None,
            };

            match valid_loss {
                Some(v) => info!(
                    "Epoch [{epoch}/{num_epochs}], Loss: {train_loss:.4}, Validation Loss: {v:.4}"
                ),
                None => info!("Epoch [{epoch}/{num_epochs}], Loss: {train_loss:.4}"),
            }

            summaries.push(EpochSummary {
                epoch,
                train_loss,
                valid_loss,
                batches: batch_count,
            });
        }

        Ok(summaries)
    }
}

/// Mean loss of `model` over every batch of `loader`. No parameters change.
pub fn evaluate<B: Backend, N: NoiseSource + ?Sized>(
    model: &VaeModel<B>,
    loader: Arc<dyn DataLoader<B, ImageBatch<B>>>,
    noise: &mut N,
    kl_weight: f64,
) -> Result<f64> {
    let mut total_loss = 0.0;
    let mut num_batches = 0;

    for batch in loader.iter() {
        let loss = model.loss(batch.images, noise, kl_weight)?;
        total_loss += ensure_finite(loss.total, "validation loss")?;
        num_batches += 1;
    }

    if num_batches == 0 {
        return Err(VaeError::config("validation loader produced no batches"));
    }
    Ok(total_loss / num_batches as f64)
}

fn first_row<B: Backend>(values: Tensor<B, 2>) -> Result<Vec<f32>> {
    values
        .slice([0..1])
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| VaeError::TensorData(format!("{e:?}")))
}
