use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};

use crate::config::VaeConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::loss::{LossBreakdown, vae_loss};
use crate::sampler::{LatentSampler, NoiseSource};

/// Everything one forward pass produces.
#[derive(Debug, Clone)]
pub struct VaeOutput<B: Backend> {
    /// Decoded images, `[Batch, C, H, W]`.
    pub reconstruction: Tensor<B, 4>,
    pub z_mean: Tensor<B, 2>,
    pub z_log_var: Tensor<B, 2>,
    /// The sampled latent points fed to the decoder.
    pub z: Tensor<B, 2>,
}

// --- VAE MODULE ---

/// Full convolutional VAE: encoder → latent sampler → decoder.
///
/// Only the encoder and decoder carry parameters. The decoder is public so it can
/// be taken out after training and used for generation on its own.
#[derive(Module, Debug)]
pub struct VaeModel<B: Backend> {
    /// Encoder producing latent mean and log-variance.
    pub encoder: Encoder<B>,
    /// Decoder generating images from latent points.
    pub decoder: Decoder<B>,
}

impl<B: Backend> VaeModel<B> {
    /// Construct a VAE from a configuration.
    ///
    /// # Errors
    /// [`crate::VaeError::Configuration`] if the configuration does not validate.
    pub fn new(config: &VaeConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            encoder: Encoder::new(config, device),
            decoder: Decoder::new(config, device),
        })
    }

    /// Full forward pass.
    ///
    /// # Arguments
    /// * `images` – Input images `[Batch, C, H, W]`
    /// * `noise` – Source of the sampler's standard-normal noise
    pub fn forward<N: NoiseSource + ?Sized>(
        &self,
        images: Tensor<B, 4>,
        noise: &mut N,
    ) -> Result<VaeOutput<B>> {
        let (z_mean, z_log_var) = self.encoder.forward(images)?;

        let z = LatentSampler::new().sample(z_mean.clone(), z_log_var.clone(), noise)?;

        let reconstruction = self.decoder.forward(z.clone())?;

        Ok(VaeOutput {
            reconstruction,
            z_mean,
            z_log_var,
            z,
        })
    }

    /// Forward pass followed by the composite loss. The images are their own target.
    pub fn loss<N: NoiseSource + ?Sized>(
        &self,
        images: Tensor<B, 4>,
        noise: &mut N,
        kl_weight: f64,
    ) -> Result<LossBreakdown<B>> {
        self.forward_with_loss(images, noise, kl_weight)
            .map(|(_, loss)| loss)
    }

    /// Like [`VaeModel::loss`], but also returns the forward pass it was computed from.
    pub fn forward_with_loss<N: NoiseSource + ?Sized>(
        &self,
        images: Tensor<B, 4>,
        noise: &mut N,
        kl_weight: f64,
    ) -> Result<(VaeOutput<B>, LossBreakdown<B>)> {
        let output = self.forward(images.clone(), noise)?;
        let loss = vae_loss(
            images,
            output.reconstruction.clone(),
            output.z_mean.clone(),
            output.z_log_var.clone(),
            kl_weight,
        )?;
        Ok((output, loss))
    }

    pub fn decoder(&self) -> &Decoder<B> {
        &self.decoder
    }

    /// Hands over the trained decoder, dropping the encoder.
    pub fn into_decoder(self) -> Decoder<B> {
        self.decoder
    }
}
