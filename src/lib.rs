//! Convolutional variational autoencoder: train on a fixed-shape image dataset,
//! then synthesize new images by decoding latent points.
//!
//! Data flow:
//! ```text
//! image → Encoder → (z_mean, z_log_var) → LatentSampler → z → Decoder → reconstruction
//!                                                                    ↓
//!                       vae_loss(image, reconstruction, z_mean, z_log_var) → scalar
//! ```

pub mod artifacts;
pub mod config;
pub mod data;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod generation;
pub mod loss;
pub mod model;
pub mod sampler;
pub mod trainer;

pub use config::{ImageShape, OptimizerKind, VaeConfig};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Result, VaeError};
pub use loss::{LossBreakdown, vae_loss};
pub use model::{VaeModel, VaeOutput};
pub use sampler::{LatentSampler, NoiseSource, SeededNoise, reparameterize};

/// Width of MNIST images in pixels (28).
pub const MNIST_DIM_X: u32 = 28;

/// Height of MNIST images in pixels (28).
pub const MNIST_DIM_Y: u32 = 28;

/// Default directory for the trained config, model and decoder records.
pub const ARTIFACT_DIR: &str = "vae_model";
