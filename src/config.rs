use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::VaeError;
use crate::{MNIST_DIM_X, MNIST_DIM_Y};

// --- IMAGE SHAPE ---

/// Fixed shape of every image the model sees.
///
/// Tensors use burn's `[batch, channels, height, width]` layout; this struct only
/// carries the per-image part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    /// 28×28 single-channel MNIST digits.
    pub const MNIST: ImageShape = ImageShape {
        height: MNIST_DIM_Y as usize,
        width: MNIST_DIM_X as usize,
        channels: 1,
    };

    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Number of scalar values in one image.
    pub fn num_values(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Spatial size after the encoder's single stride-2 convolution.
    pub fn downsampled(&self) -> (usize, usize) {
        (self.height / 2, self.width / 2)
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

// --- OPTIMIZER CHOICE ---

/// Which burn optimizer drives the training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// RMSprop with Keras' smoothing constant and epsilon.
    RmsProp,
    /// Adam with a small L2 weight decay.
    Adam,
}

// --- CONFIG ---

/// Hyperparameters of the convolutional VAE and its training run.
///
/// Saved next to the trained weights as JSON so generation can rebuild the exact
/// same decoder shape.
#[derive(Config, Debug)]
pub struct VaeConfig {
    /// Shape of one input image.
    #[config(default = "ImageShape::MNIST")]
    pub img_shape: ImageShape,
    /// Dimensionality of the latent space (a plane by default).
    #[config(default = 2)]
    pub latent_dim: usize,
    /// Scale of the KL term relative to the reconstruction term. Must lie in (0, 1).
    #[config(default = 5e-4)]
    pub kl_weight: f64,
    /// Channels of the first convolution.
    #[config(default = 32)]
    pub base_filters: usize,
    /// Channels of the downsampled convolution block (and of the decoder's reshaped volume).
    #[config(default = 64)]
    pub deep_filters: usize,
    /// Width of the dense layer in front of the latent heads.
    #[config(default = 32)]
    pub hidden_units: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 16)]
    pub batch_size: usize,
    /// Data loader worker threads.
    #[config(default = 4)]
    pub num_workers: usize,
    /// Seed for data shuffling and for the latent noise source.
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = "OptimizerKind::RmsProp")]
    pub optimizer: OptimizerKind,
    /// Optional L2-norm gradient clipping applied by the optimizer.
    pub grad_clip_norm: Option<f32>,
}

impl VaeConfig {
    /// Checks every hyperparameter the model and the training loop rely on.
    pub fn validate(&self) -> crate::error::Result<()> {
        let shape = self.img_shape;
        if shape.height == 0 || shape.width == 0 || shape.channels == 0 {
            return Err(VaeError::config(format!(
                "image shape must be non-empty, got {}x{}x{}",
                shape.height, shape.width, shape.channels
            )));
        }
        if shape.height % 2 != 0 || shape.width % 2 != 0 {
            return Err(VaeError::config(format!(
                "image height and width must be even, got {}x{}",
                shape.height, shape.width
            )));
        }
        if self.latent_dim == 0 {
            return Err(VaeError::config("latent_dim must be positive"));
        }
        if !(self.kl_weight > 0.0 && self.kl_weight < 1.0) {
            return Err(VaeError::config(format!(
                "kl_weight must lie in (0, 1), got {}",
                self.kl_weight
            )));
        }
        if self.base_filters == 0 || self.deep_filters == 0 || self.hidden_units == 0 {
            return Err(VaeError::config("layer widths must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(VaeError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.num_epochs == 0 {
            return Err(VaeError::config("num_epochs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(VaeError::config("batch_size must be positive"));
        }
        match self.grad_clip_norm {
            Some(norm) if !(norm > 0.0) => {
                return Err(VaeError::config(format!(
                    "grad_clip_norm must be positive, got {norm}"
                )));
            }
            _ => {}
        }
        Ok(())
    }

    /// Flattened size of the feature volume between the conv stack and the dense layers.
    pub fn flattened_dim(&self) -> usize {
        let (h, w) = self.img_shape.downsampled();
        self.deep_filters * h * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = VaeConfig::new();
        assert_eq!(config.img_shape, ImageShape::MNIST);
        assert_eq!(config.latent_dim, 2);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.kl_weight, 5e-4);
        assert_eq!(config.optimizer, OptimizerKind::RmsProp);
        assert!(config.validate().is_ok());
        assert_eq!(config.flattened_dim(), 64 * 14 * 14);
    }

    #[test]
    fn rejects_zero_latent_dim() {
        let err = VaeConfig::new().with_latent_dim(0).validate().unwrap_err();
        assert!(matches!(err, VaeError::Configuration(_)));
    }

    #[test]
    fn rejects_kl_weight_outside_unit_interval() {
        for weight in [0.0, -1e-3, 1.0, 2.5, f64::NAN] {
            let err = VaeConfig::new().with_kl_weight(weight).validate().unwrap_err();
            assert!(matches!(err, VaeError::Configuration(_)), "weight {weight}");
        }
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = VaeConfig::new().with_batch_size(0).validate().unwrap_err();
        assert!(matches!(err, VaeError::Configuration(_)));
    }

    #[test]
    fn rejects_odd_image_sides() {
        let err = VaeConfig::new()
            .with_img_shape(ImageShape::new(27, 28, 1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, VaeError::Configuration(_)));
    }

    #[test]
    fn rejects_non_positive_clip_norm() {
        let err = VaeConfig::new()
            .with_grad_clip_norm(Some(0.0))
            .validate()
            .unwrap_err();
        assert!(matches!(err, VaeError::Configuration(_)));
    }

    #[test]
    fn config_json_round_trip() {
        let config = VaeConfig::new()
            .with_latent_dim(3)
            .with_optimizer(OptimizerKind::Adam);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        config.save(&path).unwrap();
        let back = VaeConfig::load(&path).unwrap();
        assert_eq!(back.latent_dim, 3);
        assert_eq!(back.optimizer, OptimizerKind::Adam);
        assert_eq!(back.img_shape, ImageShape::MNIST);
    }
}
