use burn::tensor::{Tensor, TensorData, backend::Backend};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Result, VaeError};

// --- NOISE SOURCE ---

/// Capability to draw fresh standard-normal noise.
///
/// Whoever samples owns the source, so there is no hidden global RNG and tests can
/// replay a run from a seed.
pub trait NoiseSource {
    /// Returns `len` independent draws from `N(0, 1)`.
    fn standard_normal(&mut self, len: usize) -> Vec<f32>;
}

/// Standard-normal noise backed by a seedable `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    /// Deterministic source: the same seed replays the same draws.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Non-reproducible source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn standard_normal(&mut self, len: usize) -> Vec<f32> {
        (0..len)
            .map(|_| StandardNormal.sample(&mut self.rng))
            .collect()
    }
}

// --- REPARAMETERIZATION ---

/// The reparameterization trick.
///
/// ```text
/// z = z_mean + exp(z_log_var) * epsilon
/// ```
///
/// `exp(z_log_var)` is used directly as the standard-deviation multiplier; the KL
/// term in [`crate::loss::kl_term`] is paired with exactly this form. All randomness
/// lives in `epsilon`, so gradients reach `z_mean` and `z_log_var` untouched.
pub fn reparameterize<B: Backend>(
    z_mean: Tensor<B, 2>,
    z_log_var: Tensor<B, 2>,
    epsilon: Tensor<B, 2>,
) -> Tensor<B, 2> {
    z_mean + z_log_var.exp() * epsilon
}

/// Stochastic latent layer. Holds no trainable parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatentSampler;

impl LatentSampler {
    pub fn new() -> Self {
        Self
    }

    /// Draws one latent point per row of `(z_mean, z_log_var)`.
    ///
    /// Noise is drawn fresh on every call, sized from the incoming batch, so the
    /// batch size may differ between training and generation.
    pub fn sample<B: Backend, N: NoiseSource + ?Sized>(
        &self,
        z_mean: Tensor<B, 2>,
        z_log_var: Tensor<B, 2>,
        noise: &mut N,
    ) -> Result<Tensor<B, 2>> {
        let dims = z_mean.dims();
        if z_log_var.dims() != dims {
            return Err(VaeError::shape(format!(
                "z_mean {:?} and z_log_var {:?} must have the same shape",
                dims,
                z_log_var.dims()
            )));
        }

        let [batch, latent_dim] = dims;
        let epsilon = Tensor::from_floats(
            TensorData::new(noise.standard_normal(batch * latent_dim), vec![batch, latent_dim]),
            &z_mean.device(),
        );

        Ok(reparameterize(z_mean, z_log_var, epsilon))
    }
}
