//! Composable image variant pipelines.
//!
//! A [`VariantPipeline`] is an ordered sequence of tagged steps
//! interpreted by one composition function: a rename step duplicates the
//! decoded image under a new key, a scoped step applies a pixel
//! transform to exactly one key. Rename-then-transform lets the same
//! decoded image be rendered at several resolutions without re-decoding.

use image::DynamicImage;
use ndarray::Array3;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use vistext_core::{Result, VisTextError};

/// Key under which the primary image travels through the pipeline.
pub const PRIMARY_IMAGE_KEY: &str = "image";

/// One image slot: still-decoded pixels, or an already-transformed tensor.
#[derive(Clone)]
pub enum ImageSlot {
    /// Decoded pixels, not yet transformed.
    Raw(DynamicImage),
    /// Transformed `[C, H, W]` tensor.
    Tensor(Array3<f32>),
}

impl ImageSlot {
    /// The tensor, or a transform error if the slot was never transformed.
    pub fn tensor(&self) -> Result<&Array3<f32>> {
        match self {
            ImageSlot::Tensor(t) => Ok(t),
            ImageSlot::Raw(_) => Err(VisTextError::Transform(
                "image slot was not transformed".to_string(),
            )),
        }
    }
}

impl fmt::Debug for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSlot::Raw(img) => write!(f, "Raw({}x{})", img.width(), img.height()),
            ImageSlot::Tensor(t) => write!(f, "Tensor({:?})", t.shape()),
        }
    }
}

/// Named image slots for one sample.
pub type ImageMap = BTreeMap<String, ImageSlot>;

/// Wrap a freshly decoded image under the primary key.
pub fn image_map_from(image: DynamicImage) -> ImageMap {
    let mut map = ImageMap::new();
    map.insert(PRIMARY_IMAGE_KEY.to_string(), ImageSlot::Raw(image));
    map
}

/// Black-box per-image transform producing a `[C, H, W]` tensor.
pub trait PixelTransform: Send + Sync {
    /// Transform decoded pixels into a tensor.
    fn apply(&self, image: &DynamicImage) -> Result<Array3<f32>>;

    /// Side length of the square output, for introspection.
    fn output_size(&self) -> u32;
}

/// One step of a variant pipeline.
#[derive(Clone)]
pub enum TransformStep {
    /// Copy the slot at `from` to `to`, removing `from` unless
    /// `keep_origin`.
    Rename {
        /// Source key.
        from: String,
        /// Destination key.
        to: String,
        /// Keep the source slot in place.
        keep_origin: bool,
    },
    /// Apply `op` to the slot at `key`, leaving other keys untouched.
    Scoped {
        /// Target key.
        key: String,
        /// The pixel transform to run.
        op: Arc<dyn PixelTransform>,
    },
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformStep::Rename {
                from,
                to,
                keep_origin,
            } => write!(f, "Rename({from:?} -> {to:?}, keep_origin: {keep_origin})"),
            TransformStep::Scoped { key, op } => {
                write!(f, "Scoped({key:?}, size: {})", op.output_size())
            }
        }
    }
}

/// A composite transform bound to one crop size.
///
/// Built once at configuration time and shared read-only across workers.
#[derive(Debug, Clone)]
pub struct VariantPipeline {
    crop_size: u32,
    steps: Vec<TransformStep>,
}

impl VariantPipeline {
    /// Create a pipeline from its steps.
    pub fn new(crop_size: u32, steps: Vec<TransformStep>) -> Self {
        Self { crop_size, steps }
    }

    /// The primary crop size this pipeline renders.
    pub fn crop_size(&self) -> u32 {
        self.crop_size
    }

    /// The step sequence, for introspection.
    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Run every step in order over the sample's image slots.
    pub fn apply(&self, mut images: ImageMap) -> Result<ImageMap> {
        for step in &self.steps {
            match step {
                TransformStep::Rename {
                    from,
                    to,
                    keep_origin,
                } => {
                    let slot = if *keep_origin {
                        images.get(from).cloned().ok_or_else(|| {
                            VisTextError::Transform(format!("no image under key {from:?}"))
                        })?
                    } else {
                        images.remove(from).ok_or_else(|| {
                            VisTextError::Transform(format!("no image under key {from:?}"))
                        })?
                    };
                    images.insert(to.clone(), slot);
                }
                TransformStep::Scoped { key, op } => {
                    let slot = images.get(key).ok_or_else(|| {
                        VisTextError::Transform(format!("no image under key {key:?}"))
                    })?;
                    let raw = match slot {
                        ImageSlot::Raw(img) => img,
                        ImageSlot::Tensor(_) => {
                            return Err(VisTextError::Transform(format!(
                                "image under key {key:?} is already transformed"
                            )))
                        }
                    };
                    let tensor = op.apply(raw)?;
                    images.insert(key.clone(), ImageSlot::Tensor(tensor));
                }
            }
        }
        Ok(images)
    }
}
