#![allow(dead_code)]

use burn::backend::{Autodiff, NdArray};
use burn::tensor::{Tensor, TensorData, backend::Backend};
use vae_gen::data::ImageItem;
use vae_gen::{Decoder, ImageShape, NoiseSource, SeededNoise, VaeConfig};

pub type TestBackend = NdArray;
pub type TestAutodiffBackend = Autodiff<TestBackend>;

/// Small model so CPU tests stay fast.
pub fn tiny_config() -> VaeConfig {
    VaeConfig::new()
        .with_img_shape(ImageShape::new(8, 8, 1))
        .with_latent_dim(2)
        .with_base_filters(4)
        .with_deep_filters(8)
        .with_hidden_units(8)
        .with_batch_size(4)
        .with_learning_rate(1e-2)
        .with_num_epochs(2)
}

/// Deterministic pseudo-images with values in [0, 1].
pub fn random_items(count: usize, shape: ImageShape, seed: u64) -> Vec<ImageItem> {
    let mut noise = SeededNoise::new(seed);
    (0..count)
        .map(|_| {
            let pixels = noise
                .standard_normal(shape.num_values())
                .into_iter()
                .map(|v| 1.0 / (1.0 + (-v).exp()))
                .collect();
            ImageItem::new(pixels, shape).unwrap()
        })
        .collect()
}

pub fn images_tensor<B: Backend>(
    items: &[ImageItem],
    shape: ImageShape,
    device: &B::Device,
) -> Tensor<B, 4> {
    let values: Vec<f32> = items.iter().flat_map(|i| i.pixels().to_vec()).collect();
    let [c, h, w] = shape.dims();
    Tensor::from_floats(TensorData::new(values, vec![items.len(), c, h, w]), device)
}

pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().to_vec().unwrap()
}

/// Decodes a fixed pair of latent points; used to detect parameter changes.
pub fn probe_decoder<B: Backend>(decoder: &Decoder<B>, device: &B::Device) -> Vec<f32> {
    let z = Tensor::<B, 2>::from_floats(
        TensorData::new(vec![0.3_f32, -0.7, 1.1, 0.2], vec![2, 2]),
        device,
    );
    to_vec(decoder.forward(z).unwrap())
}
