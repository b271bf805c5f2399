//! Batch iteration over a caption dataset.

use crate::collator::{BatchCollator, CollatedBatch};
use crate::dataset::CaptionDataset;
use crate::image_ops::ImageSource;
use crate::sample::SampleAssembler;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::debug;
use vistext_core::Result;

/// Configuration for the caption loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Batch size.
    pub batch_size: usize,
    /// Shuffle the record order.
    pub shuffle: bool,
    /// Random seed for shuffling.
    pub seed: u64,
    /// Drop the last incomplete batch.
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            shuffle: true,
            seed: 42,
            drop_last: false,
        }
    }
}

/// Yields collated batches from a caption dataset.
///
/// Every sample in one batch is assembled at the same training
/// iteration, so the whole batch resolves to the same scale pipeline and
/// its image tensors share one shape.
pub struct CaptionLoader {
    dataset: CaptionDataset,
    assembler: Arc<SampleAssembler>,
    collator: BatchCollator,
    config: LoaderConfig,
    indices: Vec<usize>,
    position: usize,
}

impl CaptionLoader {
    /// Create a loader over a dataset.
    pub fn new(
        dataset: CaptionDataset,
        assembler: Arc<SampleAssembler>,
        collator: BatchCollator,
        config: LoaderConfig,
    ) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        if config.shuffle {
            let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
            indices.shuffle(&mut rng);
        }
        Self {
            dataset,
            assembler,
            collator,
            config,
            indices,
            position: 0,
        }
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// True when the dataset holds no records.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Number of batches one pass will yield.
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.len() / self.config.batch_size
        } else {
            self.len().div_ceil(self.config.batch_size)
        }
    }

    /// Restart the pass, reshuffling when configured.
    pub fn reset(&mut self, new_seed: Option<u64>) {
        self.position = 0;
        if self.config.shuffle {
            let seed = new_seed.unwrap_or(self.config.seed);
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            self.indices.shuffle(&mut rng);
        }
    }

    /// Assemble and collate the next batch at the given iteration.
    ///
    /// Returns `Ok(None)` when the pass is exhausted. A failing record
    /// fails the whole call; nothing is skipped silently.
    pub fn next_batch(&mut self, iteration: u64) -> Result<Option<CollatedBatch>> {
        if self.position >= self.indices.len() {
            return Ok(None);
        }
        let end = (self.position + self.config.batch_size).min(self.indices.len());
        let slice = &self.indices[self.position..end];
        if self.config.drop_last && slice.len() < self.config.batch_size {
            self.position = self.indices.len();
            return Ok(None);
        }

        let mut samples = Vec::with_capacity(slice.len());
        for &idx in slice {
            let record = self
                .dataset
                .get(idx)
                .expect("indices are built from the dataset length");
            let sample = self.assembler.assemble(
                ImageSource::path(&record.image),
                &record.prefix,
                &record.target,
                iteration,
            )?;
            samples.push(sample);
        }
        self.position = end;

        let batch = self.collator.collate(&samples)?;
        debug!(
            batch_size = batch.batch_size,
            seq_len = batch.seq_len,
            crop_size = self.assembler.crop_size_for(iteration),
            "collated batch"
        );
        Ok(Some(batch))
    }
}
