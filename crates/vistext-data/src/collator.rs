//! Batch collation: padding, stacking, length bookkeeping.

use crate::sample::Sample;
use ndarray::{Array1, Array2, Array4, Axis};
use std::collections::BTreeMap;
use vistext_core::{Result, VisTextError};

/// A collated batch ready for the model.
#[derive(Debug)]
pub struct CollatedBatch {
    /// Token ids `[N, L]`, padded with the tokenizer pad id.
    pub caption_tokens: Array2<i32>,
    /// Loss mask `[N, L]`, padded with zero.
    pub need_predict: Array2<i32>,
    /// True (unpadded) token count per sample `[N]`.
    pub caption_tokens_length: Array1<i32>,
    /// Stacked image variants `[N, C, H, W]`, keyed by variant name.
    pub images: BTreeMap<String, Array4<f32>>,
    /// Caption metadata per sample, unmerged.
    pub captions: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Number of samples.
    pub batch_size: usize,
    /// Padded sequence length.
    pub seq_len: usize,
}

/// Merges per-sample records into one batch.
pub struct BatchCollator {
    /// Padding token id for `caption_tokens`.
    pub pad_token_id: i32,
}

impl BatchCollator {
    /// Create a collator padding with the given token id.
    pub fn new(pad_token_id: i32) -> Self {
        Self { pad_token_id }
    }

    /// Collate samples into a batch.
    ///
    /// Variable-length fields are padded to the longest sample and
    /// left-aligned. Image variants are stacked along a new leading batch
    /// dimension; every sample must carry the same variant keys with
    /// identical tensor shapes — all samples in one batch are expected to
    /// have resolved to the same scale pipeline, so a mismatch is a
    /// scheduling defect, not a recoverable condition.
    pub fn collate(&self, samples: &[Sample]) -> Result<CollatedBatch> {
        if samples.is_empty() {
            return Err(VisTextError::Config("cannot collate an empty batch".to_string()));
        }
        let batch_size = samples.len();
        let max_len = samples
            .iter()
            .map(|s| s.caption_tokens.len())
            .max()
            .unwrap_or(0);

        let mut caption_tokens = Array2::from_elem((batch_size, max_len), self.pad_token_id);
        let mut need_predict = Array2::zeros((batch_size, max_len));
        let mut lengths = Array1::zeros(batch_size);

        for (i, sample) in samples.iter().enumerate() {
            let len = sample.caption_tokens.len();
            debug_assert_eq!(len, sample.need_predict.len());
            for (j, &id) in sample.caption_tokens.iter().enumerate() {
                caption_tokens[[i, j]] = id;
            }
            for (j, &flag) in sample.need_predict.iter().enumerate() {
                need_predict[[i, j]] = flag;
            }
            lengths[i] = len as i32;
        }

        let images = stack_image_variants(samples)?;
        let captions = samples.iter().map(|s| s.caption.clone()).collect();

        Ok(CollatedBatch {
            caption_tokens,
            need_predict,
            caption_tokens_length: lengths,
            images,
            captions,
            batch_size,
            seq_len: max_len,
        })
    }
}

/// Stack each image variant across the batch.
fn stack_image_variants(samples: &[Sample]) -> Result<BTreeMap<String, Array4<f32>>> {
    let keys: Vec<&String> = samples[0].images.keys().collect();
    for sample in &samples[1..] {
        if sample.images.len() != keys.len()
            || !keys.iter().all(|k| sample.images.contains_key(*k))
        {
            return Err(VisTextError::Transform(
                "image variant keys differ within one batch".to_string(),
            ));
        }
    }

    let mut stacked = BTreeMap::new();
    for key in keys {
        let mut views = Vec::with_capacity(samples.len());
        let mut expected: Option<&[usize]> = None;
        for sample in samples {
            let tensor = sample.images[key].tensor()?;
            match expected {
                None => expected = Some(tensor.shape()),
                Some(shape) if shape != tensor.shape() => {
                    return Err(VisTextError::ShapeMismatch {
                        expected: shape.to_vec(),
                        actual: tensor.shape().to_vec(),
                    });
                }
                _ => {}
            }
            views.push(tensor.view());
        }
        let batched = ndarray::stack(Axis(0), &views)
            .map_err(|e| VisTextError::Transform(e.to_string()))?;
        stacked.insert(key.clone(), batched);
    }
    Ok(stacked)
}
