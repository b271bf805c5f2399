//! Image loading and the default pixel-transform factory.
//!
//! The output layout is always `[3, size, size]` NCHW float32, rescaled
//! to `[0, 1]` and normalized per channel.

use crate::pipeline::TransformFactory;
use crate::transform::PixelTransform;
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vistext_core::{Interpolation, Normalization, Result, VisTextError};

/// Raw image input to sample assembly.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file on disk.
    Path(PathBuf),
    /// Encoded image bytes.
    Bytes(Vec<u8>),
    /// Already-decoded pixels.
    Decoded(DynamicImage),
}

impl ImageSource {
    /// Source a path.
    pub fn path<P: AsRef<Path>>(path: P) -> Self {
        ImageSource::Path(path.as_ref().to_path_buf())
    }
}

/// Decode an image from its source.
///
/// Decode failures surface as transform errors naming the source; there
/// is no retry or placeholder substitution.
pub fn load_image(source: ImageSource) -> Result<DynamicImage> {
    match source {
        ImageSource::Path(path) => image::open(&path)
            .map_err(|e| VisTextError::Transform(format!("failed to decode {}: {e}", path.display()))),
        ImageSource::Bytes(bytes) => image::load_from_memory(&bytes)
            .map_err(|e| VisTextError::Transform(format!("failed to decode image bytes: {e}"))),
        ImageSource::Decoded(img) => Ok(img),
    }
}

fn filter_type(interpolation: Interpolation) -> FilterType {
    match interpolation {
        Interpolation::Nearest => FilterType::Nearest,
        Interpolation::Bilinear => FilterType::Triangle,
        Interpolation::Bicubic => FilterType::CatmullRom,
    }
}

/// Train-time augmentation parameters.
struct TrainAugment {
    /// Lower bound on the crop area fraction.
    small_scale: f32,
    /// Apply horizontal flips with probability one half.
    flip: bool,
    /// Base seed; each call derives its own rng from seed + draw count.
    seed: u64,
    draws: AtomicU64,
}

/// Resize/crop/normalize transform bound to one output size.
///
/// Eval path: resize the shorter side to the crop size, center-crop.
/// Train path: square crop with area fraction drawn from
/// `[small_scale, 1]`, resized to the crop size, optionally flipped.
pub struct ImageProcessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    filter: FilterType,
    augment: Option<TrainAugment>,
}

impl ImageProcessor {
    /// Create an eval-time processor.
    pub fn eval(size: u32, normalization: Normalization, interpolation: Interpolation) -> Result<Self> {
        if size == 0 {
            return Err(VisTextError::Config("crop size must be positive".to_string()));
        }
        Ok(Self {
            size,
            mean: normalization.mean(),
            std: normalization.std(),
            filter: filter_type(interpolation),
            augment: None,
        })
    }

    /// Create a train-time processor with random cropping and flipping.
    pub fn train(
        size: u32,
        normalization: Normalization,
        interpolation: Interpolation,
        small_scale: f32,
        flip: bool,
        seed: u64,
    ) -> Result<Self> {
        if size == 0 {
            return Err(VisTextError::Config("crop size must be positive".to_string()));
        }
        if !(0.0 < small_scale && small_scale <= 1.0) {
            return Err(VisTextError::Config(format!(
                "small scale must be in (0, 1], got {small_scale}"
            )));
        }
        Ok(Self {
            size,
            mean: normalization.mean(),
            std: normalization.std(),
            filter: filter_type(interpolation),
            augment: Some(TrainAugment {
                small_scale,
                flip,
                seed,
                draws: AtomicU64::new(0),
            }),
        })
    }

    fn crop_eval(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(VisTextError::Transform("empty image".to_string()));
        }
        let scale = self.size as f32 / w.min(h) as f32;
        let nw = ((w as f32 * scale).round() as u32).max(self.size);
        let nh = ((h as f32 * scale).round() as u32).max(self.size);
        let resized = image.resize_exact(nw, nh, self.filter);
        let x = (nw - self.size) / 2;
        let y = (nh - self.size) / 2;
        Ok(resized.crop_imm(x, y, self.size, self.size))
    }

    fn crop_train(&self, image: &DynamicImage, aug: &TrainAugment) -> Result<DynamicImage> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(VisTextError::Transform("empty image".to_string()));
        }
        let draw = aug.draws.fetch_add(1, Ordering::Relaxed);
        let mut rng = SmallRng::seed_from_u64(aug.seed.wrapping_add(draw));

        let area = aug.small_scale + rng.random::<f32>() * (1.0 - aug.small_scale);
        let side = ((area * (w as f32) * (h as f32)).sqrt() as u32).clamp(1, w.min(h));
        let x = rng.random_range(0..=w - side);
        let y = rng.random_range(0..=h - side);
        let mut cropped = image
            .crop_imm(x, y, side, side)
            .resize_exact(self.size, self.size, self.filter);
        if aug.flip && rng.random_bool(0.5) {
            cropped = cropped.fliph();
        }
        Ok(cropped)
    }
}

impl PixelTransform for ImageProcessor {
    fn apply(&self, image: &DynamicImage) -> Result<Array3<f32>> {
        let cropped = match &self.augment {
            Some(aug) => self.crop_train(image, aug)?,
            None => self.crop_eval(image)?,
        };
        let rgb = cropped.to_rgb8();
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let num_pixels = width * height;
        let pixels = rgb.as_raw();

        // Extract each channel from the interleaved RGB data while
        // rescaling and normalizing in one pass.
        let mut data = Vec::with_capacity(3 * num_pixels);
        for c in 0..3 {
            let mean = self.mean[c];
            let std = self.std[c];
            data.extend((0..num_pixels).map(|i| {
                let v = pixels[i * 3 + c] as f32 / 255.0;
                (v - mean) / std
            }));
        }

        Array3::from_shape_vec((3, height, width), data)
            .map_err(|e| VisTextError::Transform(e.to_string()))
    }

    fn output_size(&self) -> u32 {
        self.size
    }
}

/// Default [`TransformFactory`] backed by [`ImageProcessor`].
#[derive(Debug, Clone)]
pub struct DefaultTransformFactory {
    /// Pixel normalization scheme.
    pub normalization: Normalization,
    /// Resize interpolation mode.
    pub interpolation: Interpolation,
    /// Lower bound on the train-time crop area fraction.
    pub input_small_scale: f32,
    /// Disable train-time horizontal flipping.
    pub no_flip: bool,
    /// Augmentation seed.
    pub seed: u64,
}

impl DefaultTransformFactory {
    /// Build a factory from the pipeline configuration.
    pub fn from_config(config: &vistext_core::PreprocessConfig) -> Self {
        Self {
            normalization: config.normalization,
            interpolation: config.interpolation,
            input_small_scale: config.input_small_scale,
            no_flip: config.no_flip,
            seed: config.seed,
        }
    }
}

impl TransformFactory for DefaultTransformFactory {
    fn build(&self, crop_size: u32, is_train: bool) -> Result<Arc<dyn PixelTransform>> {
        if is_train {
            Ok(Arc::new(ImageProcessor::train(
                crop_size,
                self.normalization,
                self.interpolation,
                self.input_small_scale,
                !self.no_flip,
                self.seed,
            )?))
        } else {
            Ok(Arc::new(ImageProcessor::eval(
                crop_size,
                self.normalization,
                self.interpolation,
            )?))
        }
    }
}
