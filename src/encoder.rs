use burn::{
    module::Module,
    nn::{
        Linear, LinearConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig},
    },
    tensor::{Tensor, backend::Backend},
};

use crate::config::{ImageShape, VaeConfig};
use crate::error::{Result, VaeError};

// --- CONV ENCODER ---

/// Convolutional encoder.
///
/// Structure:
/// - 3×3 conv keeping the input resolution
/// - 3×3 conv with stride 2 halving it (28×28 → 14×14)
/// - two more 3×3 convs at the reduced resolution
/// - flatten, one dense layer, then two linear heads for `z_mean` and `z_log_var`
///
/// The heads carry no activation so `z_log_var` can take any real value.
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    conv4: Conv2d<B>,
    dense: Linear<B>,
    fc_mean: Linear<B>,
    fc_log_var: Linear<B>,
    activation: Relu,
    channels: usize,
    height: usize,
    width: usize,
}

impl<B: Backend> Encoder<B> {
    /// Construct a new encoder from a validated configuration.
    ///
    /// # Arguments
    /// * `config` – VAE configuration (image shape, latent size, filter counts)
    /// * `device` – Backend device where parameters are allocated
    pub fn new(config: &VaeConfig, device: &B::Device) -> Self {
        let shape = config.img_shape;
        let c1 = config.base_filters;
        let c2 = config.deep_filters;

        // [C, H, W] -> [c1, H, W]
        let conv1 = Conv2dConfig::new([shape.channels, c1], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        // [c1, H, W] -> [c2, H/2, W/2]
        let conv2 = Conv2dConfig::new([c1, c2], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let conv3 = Conv2dConfig::new([c2, c2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv4 = Conv2dConfig::new([c2, c2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let dense = LinearConfig::new(config.flattened_dim(), config.hidden_units).init(device);
        let fc_mean = LinearConfig::new(config.hidden_units, config.latent_dim).init(device);
        let fc_log_var = LinearConfig::new(config.hidden_units, config.latent_dim).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            dense,
            fc_mean,
            fc_log_var,
            activation: Relu::new(),
            channels: shape.channels,
            height: shape.height,
            width: shape.width,
        }
    }

    /// Shape of the images this encoder accepts.
    pub fn img_shape(&self) -> ImageShape {
        ImageShape::new(self.height, self.width, self.channels)
    }

    /// Forward pass for the encoder.
    ///
    /// # Arguments
    /// * `x` – Input batch of shape `[Batch, C, H, W]`
    ///
    /// # Returns
    /// `(z_mean, z_log_var)` – tensors of shape `[Batch, latent_dim]`
    ///
    /// # Errors
    /// [`VaeError::Shape`] if the batch is empty or the per-image dims differ from
    /// the configured shape.
    pub fn forward(&self, x: Tensor<B, 4>) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let [batch, channels, height, width] = x.dims();
        if batch == 0 {
            return Err(VaeError::shape("encoder received an empty batch"));
        }
        if [channels, height, width] != self.img_shape().dims() {
            return Err(VaeError::shape(format!(
                "encoder expects images of [C, H, W] = {:?}, got {:?}",
                self.img_shape().dims(),
                [channels, height, width]
            )));
        }

        let x = self.activation.forward(self.conv1.forward(x));
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.activation.forward(self.conv3.forward(x));
        let x = self.activation.forward(self.conv4.forward(x));

        // [B, c2, H/2, W/2] -> [B, c2 * H/2 * W/2]
        let x = x.flatten(1, 3);
        let x = self.activation.forward(self.dense.forward(x));

        let z_mean = self.fc_mean.forward(x.clone());
        let z_log_var = self.fc_log_var.forward(x);

        Ok((z_mean, z_log_var))
    }
}
