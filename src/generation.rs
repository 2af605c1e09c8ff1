//! Generation from a trained decoder: a regular latent grid spaced by the
//! inverse Gaussian CDF, decoded and tiled into one canvas.

use std::path::Path;

use burn::tensor::{Tensor, TensorData, backend::Backend};
use image::{GrayImage, Luma, Rgb, RgbImage};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::info;

use crate::config::ImageShape;
use crate::decoder::Decoder;
use crate::error::{Result, VaeError};

// --- GRID ---

/// Side length and percentile range of a square latent grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Number of cells per side.
    pub size: usize,
    /// Lowest percentile, in (0, 1).
    pub low: f64,
    /// Highest percentile, in (0, 1).
    pub high: f64,
}

impl Default for GridSpec {
    /// 15×15 digits over the 5th–95th percentiles.
    fn default() -> Self {
        Self {
            size: 15,
            low: 0.05,
            high: 0.95,
        }
    }
}

impl GridSpec {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(VaeError::config("grid size must be positive"));
        }
        if !(self.low > 0.0 && self.low <= self.high && self.high < 1.0) {
            return Err(VaeError::config(format!(
                "grid percentiles must satisfy 0 < low <= high < 1, got [{}, {}]",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// `size` evenly spaced points from `low` to `high`, both ends included.
fn linspace(low: f64, high: f64, size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![low];
    }
    let step = (high - low) / (size - 1) as f64;
    (0..size).map(|i| low + step * i as f64).collect()
}

/// Axis coordinates `Φ⁻¹(linspace(low, high, size))`.
///
/// The prior over the latent space is a standard normal, so equal steps in
/// probability give a grid that is dense where the prior puts its mass.
pub fn latent_axis(spec: &GridSpec) -> Result<Vec<f64>> {
    spec.validate()?;
    let normal = Normal::new(0.0, 1.0).map_err(|e| VaeError::config(e.to_string()))?;
    Ok(linspace(spec.low, spec.high, spec.size)
        .into_iter()
        .map(|p| normal.inverse_cdf(p))
        .collect())
}

/// Latent points for every grid cell, row-major.
///
/// Cell `(row, col)` gets `axis[col]` in dimension 0 and `axis[row]` in
/// dimension 1. Remaining dimensions are copied from `base`, which must have
/// length `latent_dim >= 2`.
pub fn latent_grid(spec: &GridSpec, base: &[f32]) -> Result<Vec<Vec<f32>>> {
    if base.len() < 2 {
        return Err(VaeError::shape(format!(
            "a 2-D latent grid needs latent_dim >= 2, got {}",
            base.len()
        )));
    }
    let axis = latent_axis(spec)?;

    let mut points = Vec::with_capacity(spec.size * spec.size);
    for &yi in &axis {
        for &xi in &axis {
            let mut z = base.to_vec();
            z[0] = xi as f32;
            z[1] = yi as f32;
            points.push(z);
        }
    }
    Ok(points)
}

// --- CANVAS ---

/// A `rows × cols` mosaic of equally sized images, stored row-major with
/// interleaved channels (`H, W, C`).
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Vec<f32>,
}

impl Canvas {
    /// Tiles `images` (each `[C, H, W]`, flat, channel-major) into a grid with
    /// `cols` cells per row. Cell `i` lands at row `i / cols`, column `i % cols`.
    pub fn assemble(images: &[Vec<f32>], shape: ImageShape, cols: usize) -> Result<Self> {
        if cols == 0 || images.is_empty() || images.len() % cols != 0 {
            return Err(VaeError::shape(format!(
                "cannot tile {} images into rows of {}",
                images.len(),
                cols
            )));
        }
        let rows = images.len() / cols;
        let ImageShape {
            height: h,
            width: w,
            channels: c,
        } = shape;

        let width = cols * w;
        let height = rows * h;
        let mut pixels = vec![0.0; width * height * c];

        for (index, image) in images.iter().enumerate() {
            if image.len() != shape.num_values() {
                return Err(VaeError::shape(format!(
                    "image {index} has {} values, expected {}",
                    image.len(),
                    shape.num_values()
                )));
            }
            let (row, col) = (index / cols, index % cols);
            for ch in 0..c {
                for y in 0..h {
                    for x in 0..w {
                        let src = ch * h * w + y * w + x;
                        let dst = ((row * h + y) * width + col * w + x) * c + ch;
                        pixels[dst] = image[src];
                    }
                }
            }
        }

        Ok(Self {
            width,
            height,
            channels: c,
            pixels,
        })
    }

    /// Pixel value at `(x, y)` for channel `ch`, or `None` outside the canvas.
    pub fn get(&self, x: usize, y: usize, ch: usize) -> Option<f32> {
        if x >= self.width || y >= self.height || ch >= self.channels {
            return None;
        }
        Some(self.at(x, y, ch))
    }

    fn at(&self, x: usize, y: usize, ch: usize) -> f32 {
        self.pixels[(y * self.width + x) * self.channels + ch]
    }

    /// Writes the canvas as an 8-bit PNG (grayscale for one channel, RGB for three).
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let to_u8 = |v: f32| (v * 255.0).clamp(0.0, 255.0) as u8;
        let (w, h) = (self.width as u32, self.height as u32);

        match self.channels {
            1 => {
                let mut img = GrayImage::new(w, h);
                for (x, y, px) in img.enumerate_pixels_mut() {
                    *px = Luma([to_u8(self.at(x as usize, y as usize, 0))]);
                }
                img.save(path.as_ref())?;
            }
            3 => {
                let mut img = RgbImage::new(w, h);
                for (x, y, px) in img.enumerate_pixels_mut() {
                    let (x, y) = (x as usize, y as usize);
                    *px = Rgb([
                        to_u8(self.at(x, y, 0)),
                        to_u8(self.at(x, y, 1)),
                        to_u8(self.at(x, y, 2)),
                    ]);
                }
                img.save(path.as_ref())?;
            }
            other => {
                return Err(VaeError::shape(format!(
                    "PNG export supports 1 or 3 channels, got {other}"
                )));
            }
        }

        info!(path = %path.as_ref().display(), "saved image");
        Ok(())
    }
}

// --- DECODING ---

/// Decodes latent points in chunks of at most `batch_size`, returning one flat
/// `[C, H, W]` vector per point.
pub fn decode_points<B: Backend>(
    decoder: &Decoder<B>,
    points: &[Vec<f32>],
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(VaeError::config("batch_size must be positive"));
    }
    let latent_dim = decoder.latent_dim();
    if let Some(bad) = points.iter().find(|p| p.len() != latent_dim) {
        return Err(VaeError::shape(format!(
            "latent point has {} values, decoder expects {latent_dim}",
            bad.len()
        )));
    }
    let image_len = decoder.img_shape().num_values();

    let mut images = Vec::with_capacity(points.len());
    for chunk in points.chunks(batch_size) {
        let flat: Vec<f32> = chunk.iter().flatten().copied().collect();
        let z = Tensor::<B, 2>::from_floats(
            TensorData::new(flat, vec![chunk.len(), latent_dim]),
            device,
        );

        let decoded: Vec<f32> = decoder
            .forward(z)?
            .into_data()
            .to_vec()
            .map_err(|e| VaeError::TensorData(format!("{e:?}")))?;

        images.extend(decoded.chunks(image_len).map(<[f32]>::to_vec));
    }
    Ok(images)
}

/// Decodes a single latent point into one `[C, H, W]` image.
pub fn decode_point<B: Backend>(
    decoder: &Decoder<B>,
    point: &[f32],
    device: &B::Device,
) -> Result<Vec<f32>> {
    let mut images = decode_points(decoder, &[point.to_vec()], 1, device)?;
    images
        .pop()
        .ok_or_else(|| VaeError::TensorData("decoder returned no image".into()))
}

/// Decodes the whole latent grid and tiles it into one canvas.
///
/// For MNIST and `GridSpec::default()` this yields 225 digits on a 420×420 canvas.
pub fn decode_grid<B: Backend>(
    decoder: &Decoder<B>,
    spec: &GridSpec,
    base: &[f32],
    batch_size: usize,
    device: &B::Device,
) -> Result<Canvas> {
    if base.len() != decoder.latent_dim() {
        return Err(VaeError::shape(format!(
            "base latent vector has {} values, decoder expects {}",
            base.len(),
            decoder.latent_dim()
        )));
    }
    let points = latent_grid(spec, base)?;
    let images = decode_points(decoder, &points, batch_size, device)?;
    Canvas::assemble(&images, decoder.img_shape(), spec.size)
}
