use burn::{
    module::Module,
    nn::{
        Linear, LinearConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
    },
    tensor::{Tensor, activation, backend::Backend},
};

use crate::config::{ImageShape, VaeConfig};
use crate::error::{Result, VaeError};

// --- CONV DECODER ---

/// Convolutional decoder.
///
/// Structure:
/// - Linear layer expands the latent vector into the encoder's pre-flatten volume
/// - Reshape to `[Batch, deep_filters, H/2, W/2]`
/// - One stride-2 transposed convolution back to `H×W`
/// - A 3×3 convolution down to the image channels, then a sigmoid
///
/// Usable on its own: generation feeds it latent points that never went through
/// the encoder.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    fc_initial: Linear<B>,
    convt: ConvTranspose2d<B>,
    conv_out: Conv2d<B>,
    activation: Relu,
    latent_dim: usize,
    deep_filters: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl<B: Backend> Decoder<B> {
    /// Construct a new decoder mirroring [`crate::encoder::Encoder`].
    pub fn new(config: &VaeConfig, device: &B::Device) -> Self {
        let shape = config.img_shape;
        let c1 = config.base_filters;
        let c2 = config.deep_filters;

        let fc_initial = LinearConfig::new(config.latent_dim, config.flattened_dim()).init(device);

        // [c2, H/2, W/2] -> [c1, H, W]
        let convt = ConvTranspose2dConfig::new([c2, c1], [3, 3])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_padding_out([1, 1])
            .init(device);

        // [c1, H, W] -> [C, H, W]
        let conv_out = Conv2dConfig::new([c1, shape.channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        Self {
            fc_initial,
            convt,
            conv_out,
            activation: Relu::new(),
            latent_dim: config.latent_dim,
            deep_filters: c2,
            channels: shape.channels,
            height: shape.height,
            width: shape.width,
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    /// Shape of the images this decoder produces.
    pub fn img_shape(&self) -> ImageShape {
        ImageShape::new(self.height, self.width, self.channels)
    }

    /// Forward pass for the decoder.
    ///
    /// # Arguments
    /// * `z` – Latent batch, shape `[Batch, latent_dim]`
    ///
    /// # Returns
    /// Images of shape `[Batch, C, H, W]` with every value in `[0, 1]`.
    pub fn forward(&self, z: Tensor<B, 2>) -> Result<Tensor<B, 4>> {
        let [batch, latent_dim] = z.dims();
        if batch == 0 {
            return Err(VaeError::shape("decoder received an empty latent batch"));
        }
        if latent_dim != self.latent_dim {
            return Err(VaeError::shape(format!(
                "decoder expects latent_dim {}, got {}",
                self.latent_dim, latent_dim
            )));
        }

        let x = self.activation.forward(self.fc_initial.forward(z));

        let x = x.reshape([
            batch,
            self.deep_filters,
            self.height / 2,
            self.width / 2,
        ]);

        let x = self.activation.forward(self.convt.forward(x));

        Ok(activation::sigmoid(self.conv_out.forward(x)))
    }
}
