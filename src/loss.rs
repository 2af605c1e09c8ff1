use burn::prelude::ElementConversion;
use burn::tensor::{Tensor, backend::Backend};

use crate::error::{Result, VaeError};

/// Predictions are clamped to `[EPSILON, 1 - EPSILON]` before any `log`.
pub const EPSILON: f64 = 1e-7;

// --- Loss Terms ---

/// Per-sample reconstruction error.
///
/// Binary cross-entropy between flattened input and flattened reconstruction,
/// averaged over pixels (each pixel intensity is treated as an independent
/// Bernoulli parameter):
/// ```text
/// BCE = -[ x*log(x̂) + (1−x)*log(1−x̂) ]
/// ```
///
/// Returns a tensor of shape `[batch]`.
pub fn reconstruction_term<B: Backend>(x: Tensor<B, 4>, z_decoded: Tensor<B, 4>) -> Tensor<B, 1> {
    let x = x.flatten::<2>(1, 3);
    let recon = z_decoded.flatten::<2>(1, 3).clamp(EPSILON, 1.0 - EPSILON);

    let bce = (x.clone() * recon.clone().log()
        + x.neg().add_scalar(1.0) * recon.neg().add_scalar(1.0).log())
    .neg();

    bce.mean_dim(1).squeeze::<1>(1)
}

/// Per-sample KL regularization against the standard normal prior.
///
/// ```text
/// KL = -kl_weight * mean_latent( 1 + z_log_var − z_mean² − exp(z_log_var) )
/// ```
///
/// The bracket is never positive, so the term is `>= 0` for `kl_weight > 0`, and
/// exactly zero when `z_mean = z_log_var = 0`.
///
/// Returns a tensor of shape `[batch]`.
pub fn kl_term<B: Backend>(
    z_mean: Tensor<B, 2>,
    z_log_var: Tensor<B, 2>,
    kl_weight: f64,
) -> Tensor<B, 1> {
    (z_log_var.clone().add_scalar(1.0) - z_mean.powf_scalar(2.0) - z_log_var.exp())
        .mean_dim(1)
        .squeeze::<1>(1)
        .mul_scalar(-kl_weight)
}

// --- Composite Loss ---

/// Training objective broken into its parts. Every field has shape `[1]`.
#[derive(Debug, Clone)]
pub struct LossBreakdown<B: Backend> {
    /// Batch mean of `reconstruction + kl`; the scalar to differentiate.
    pub total: Tensor<B, 1>,
    /// Batch mean of the reconstruction term.
    pub reconstruction: Tensor<B, 1>,
    /// Batch mean of the KL term.
    pub kl: Tensor<B, 1>,
}

/// Computes the VAE objective for one batch.
///
/// The input is its own target, and the loss additionally needs the encoder's
/// `z_mean` and `z_log_var`, so it takes all four tensors explicitly instead of a
/// `(prediction, target)` pair.
///
/// # Arguments
///
/// * `x` — Original images `[batch, C, H, W]`
/// * `z_decoded` — Reconstructions, same shape as `x`
/// * `z_mean` — Latent mean `[batch, latent_dim]`
/// * `z_log_var` — Latent log-variance `[batch, latent_dim]`
/// * `kl_weight` — Scale of the KL term
///
/// # Errors
///
/// [`VaeError::Shape`] when the image pair or the latent pair disagree in shape, or
/// their batch sizes differ.
pub fn vae_loss<B: Backend>(
    x: Tensor<B, 4>,
    z_decoded: Tensor<B, 4>,
    z_mean: Tensor<B, 2>,
    z_log_var: Tensor<B, 2>,
    kl_weight: f64,
) -> Result<LossBreakdown<B>> {
    if x.dims() != z_decoded.dims() {
        return Err(VaeError::shape(format!(
            "reconstruction {:?} does not match input {:?}",
            z_decoded.dims(),
            x.dims()
        )));
    }
    if z_mean.dims() != z_log_var.dims() {
        return Err(VaeError::shape(format!(
            "z_mean {:?} and z_log_var {:?} must have the same shape",
            z_mean.dims(),
            z_log_var.dims()
        )));
    }
    if x.dims()[0] != z_mean.dims()[0] {
        return Err(VaeError::shape(format!(
            "image batch {} and latent batch {} differ",
            x.dims()[0],
            z_mean.dims()[0]
        )));
    }

    let recon = reconstruction_term(x, z_decoded);
    let kl = kl_term(z_mean, z_log_var, kl_weight);

    Ok(LossBreakdown {
        total: (recon.clone() + kl.clone()).mean(),
        reconstruction: recon.mean(),
        kl: kl.mean(),
    })
}

/// Reads a one-element tensor back to the host and rejects NaN or infinity.
pub fn ensure_finite<B: Backend>(value: Tensor<B, 1>, context: &str) -> Result<f64> {
    let value = value.into_scalar().elem::<f64>();
    if value.is_finite() {
        Ok(value)
    } else {
        tracing::warn!(context, value, "non-finite loss");
        Err(VaeError::NumericInstability {
            context: context.to_string(),
            value,
        })
    }
}
