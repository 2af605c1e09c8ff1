use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    tensor::{Tensor, TensorData, backend::Backend},
};

use crate::config::ImageShape;
use crate::error::{Result, VaeError};

// --- Data Handling ---

/// One already-normalized image, stored channel-major (`C, H, W`) and flat.
///
/// Use this for datasets other than MNIST; the constructor checks length and
/// value range so the batcher never has to.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pixels: Vec<f32>,
}

impl ImageItem {
    /// Wraps pixel values in `[0, 1]` laid out for `shape`.
    pub fn new(pixels: Vec<f32>, shape: ImageShape) -> Result<Self> {
        if pixels.len() != shape.num_values() {
            return Err(VaeError::shape(format!(
                "image item has {} values, shape {:?} needs {}",
                pixels.len(),
                shape.dims(),
                shape.num_values()
            )));
        }
        if let Some(bad) = pixels.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(VaeError::shape(format!(
                "image values must be normalized to [0, 1], found {bad}"
            )));
        }
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }
}

/// A batch of images, `[Batch, C, H, W]`. There are no labels: the VAE
/// reconstructs its own input.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    pub images: Tensor<B, 4>,
}

/// Turns dataset items into [`ImageBatch`]es for a fixed image shape.
///
/// # Normalization
/// MNIST pixels arrive as intensities in `0–255` and are divided by 255.
/// [`ImageItem`]s are expected to be normalized already.
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    shape: ImageShape,
}

impl ImageBatcher {
    pub fn new(shape: ImageShape) -> Self {
        Self { shape }
    }

    /// Batcher for 28×28 MNIST digits.
    pub fn mnist() -> Self {
        Self::new(ImageShape::MNIST)
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    fn make_batch<B: Backend>(
        &self,
        values: Vec<f32>,
        batch_size: usize,
        device: &B::Device,
    ) -> ImageBatch<B> {
        let [c, h, w] = self.shape.dims();
        let images =
            Tensor::from_floats(TensorData::new(values, vec![batch_size, c, h, w]), device);
        ImageBatch { images }
    }
}

impl Default for ImageBatcher {
    fn default() -> Self {
        Self::mnist()
    }
}

impl<B: Backend> Batcher<B, MnistItem, ImageBatch<B>> for ImageBatcher {
    /// Flattens each 28×28 digit row-major and scales it into `[0.0, 1.0]`.
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();

        let images_flattened: Vec<f32> = items
            .iter()
            .flat_map(|item| {
                item.image
                    .iter()
                    .flat_map(|row| row.iter())
                    .map(|&pixel| pixel / 255.0)
            })
            .collect();

        self.make_batch(images_flattened, batch_size, device)
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let values: Vec<f32> = items.into_iter().flat_map(|item| item.pixels).collect();
        self.make_batch(values, batch_size, device)
    }
}
