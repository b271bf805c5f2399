//! Configuration types for vistext.

use serde::{Deserialize, Serialize};

/// Pixel normalization scheme applied after rescaling to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// ImageNet mean/std.
    #[default]
    Default,
    /// OpenAI CLIP mean/std.
    Clip,
}

impl Normalization {
    /// Per-channel RGB mean.
    pub fn mean(self) -> [f32; 3] {
        match self {
            Normalization::Default => [0.485, 0.456, 0.406],
            #[allow(clippy::excessive_precision)]
            Normalization::Clip => [0.48145466, 0.4578275, 0.40821073],
        }
    }

    /// Per-channel RGB standard deviation.
    pub fn std(self) -> [f32; 3] {
        match self {
            Normalization::Default => [0.229, 0.224, 0.225],
            #[allow(clippy::excessive_precision)]
            Normalization::Clip => [0.26862954, 0.26130258, 0.27577711],
        }
    }
}

/// Interpolation mode used when resizing images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest-neighbor sampling.
    Nearest,
    /// Bilinear (triangle) filtering.
    #[default]
    Bilinear,
    /// Bicubic (Catmull-Rom) filtering.
    Bicubic,
}

/// Configuration for the multi-scale image/caption pipeline.
///
/// All fields are read at pipeline-build time and never mutated
/// afterwards; builders receive crop sizes as explicit parameters rather
/// than reading them back out of shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Pixel normalization scheme.
    #[serde(default)]
    pub normalization: Normalization,

    /// Training crop size, used when no size range is given.
    #[serde(default = "default_crop_size")]
    pub train_crop_size: u32,

    /// Evaluation crop size.
    #[serde(default = "default_crop_size")]
    pub test_crop_size: u32,

    /// Optional `[min, max]` crop-size range for multi-scale training.
    ///
    /// When set, the training schedule is `min, min + patch_size, ...,
    /// max`, inclusive of both ends. Both bounds must be multiples of
    /// `patch_size`.
    #[serde(default)]
    pub min_size_range: Option<[u32; 2]>,

    /// Patch size stepping the multi-scale range.
    #[serde(default = "default_patch_size")]
    pub patch_size: u32,

    /// Integer divisors producing auxiliary lower-resolution variants
    /// (`image_0`, `image_1`, ...) alongside the primary image.
    #[serde(default)]
    pub multi_res_factors: Vec<u32>,

    /// Reject resolution factors that do not evenly divide every schedule
    /// entry instead of flooring the division.
    #[serde(default)]
    pub strict_factors: bool,

    /// Resize interpolation mode.
    #[serde(default)]
    pub interpolation: Interpolation,

    /// Lower bound on the random-crop area fraction at train time.
    #[serde(default = "default_small_scale")]
    pub input_small_scale: f32,

    /// Disable train-time horizontal flipping.
    #[serde(default = "default_true")]
    pub no_flip: bool,

    /// Iteration after which multi-scale selection freezes to the largest
    /// scale. Zero keeps round-robin selection forever.
    #[serde(default)]
    pub switch_after: u64,

    /// Maximum caption length in tokens, special tokens included.
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Seed for train-time augmentation.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            train_crop_size: default_crop_size(),
            test_crop_size: default_crop_size(),
            min_size_range: None,
            patch_size: default_patch_size(),
            multi_res_factors: Vec::new(),
            strict_factors: false,
            interpolation: Interpolation::default(),
            input_small_scale: default_small_scale(),
            no_flip: default_true(),
            switch_after: 0,
            max_text_len: default_max_text_len(),
            seed: default_seed(),
        }
    }
}

// Default value functions
fn default_crop_size() -> u32 {
    224
}
fn default_patch_size() -> u32 {
    16
}
fn default_small_scale() -> f32 {
    0.8
}
fn default_true() -> bool {
    true
}
fn default_max_text_len() -> usize {
    40
}
fn default_seed() -> u64 {
    42
}
