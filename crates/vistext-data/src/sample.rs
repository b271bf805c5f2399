//! Per-sample assembly: labels, scale selection, image transform.

use crate::image_ops::{load_image, ImageSource};
use crate::pipeline::{build_scale_pipelines, TransformFactory};
use crate::schedule::{select_scale_index, ScaleSchedule};
use crate::text::{build_caption_labels, CaptionLabels};
use crate::tokenizer::TextEncoder;
use crate::transform::{image_map_from, ImageMap, VariantPipeline};
use std::sync::Arc;
use vistext_core::{PreprocessConfig, Result, VisTextError};

/// One constructed training sample.
#[derive(Debug)]
pub struct Sample {
    /// Token ids, BOS first and EOS last.
    pub caption_tokens: Vec<i32>,
    /// Per-token loss mask, aligned with `caption_tokens`.
    pub need_predict: Vec<i32>,
    /// Transformed image variants keyed by name.
    pub images: ImageMap,
    /// Free-form caption metadata (region rects and the like), carried
    /// through collation untouched.
    pub caption: serde_json::Map<String, serde_json::Value>,
    /// Training step at construction time; drives scale selection only
    /// and is not part of the model's numeric input.
    pub iteration: u64,
}

/// Combines caption labels with the scale-selected image transform.
///
/// Holds only read-only shared state; safe to share across worker
/// threads.
pub struct SampleAssembler {
    encoder: Arc<dyn TextEncoder>,
    pipelines: Vec<VariantPipeline>,
    switch_after: u64,
    max_text_len: usize,
}

impl std::fmt::Debug for SampleAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleAssembler")
            .field("pipelines", &self.pipelines)
            .field("switch_after", &self.switch_after)
            .field("max_text_len", &self.max_text_len)
            .finish_non_exhaustive()
    }
}

impl SampleAssembler {
    /// Create an assembler from pre-built pipelines.
    pub fn new(
        encoder: Arc<dyn TextEncoder>,
        pipelines: Vec<VariantPipeline>,
        switch_after: u64,
        max_text_len: usize,
    ) -> Result<Self> {
        if pipelines.is_empty() {
            return Err(VisTextError::Config(
                "at least one scale pipeline is required".to_string(),
            ));
        }
        if max_text_len < 2 {
            return Err(VisTextError::Config(format!(
                "max text length must fit BOS and EOS, got {max_text_len}"
            )));
        }
        Ok(Self {
            encoder,
            pipelines,
            switch_after,
            max_text_len,
        })
    }

    /// Build schedule and pipelines from configuration.
    ///
    /// Training uses the `min_size_range` schedule when present and the
    /// fixed train crop size otherwise; evaluation always uses the fixed
    /// eval crop size.
    pub fn from_config(
        config: &PreprocessConfig,
        encoder: Arc<dyn TextEncoder>,
        factory: &dyn TransformFactory,
        is_train: bool,
    ) -> Result<Self> {
        let schedule = if is_train {
            match config.min_size_range {
                Some([min, max]) => ScaleSchedule::stepped(min, max, config.patch_size)?,
                None => ScaleSchedule::fixed(config.train_crop_size)?,
            }
        } else {
            ScaleSchedule::fixed(config.test_crop_size)?
        };
        let pipelines = build_scale_pipelines(
            &schedule,
            &config.multi_res_factors,
            factory,
            is_train,
            config.strict_factors,
        )?;
        Self::new(encoder, pipelines, config.switch_after, config.max_text_len)
    }

    /// The built pipelines, in schedule order.
    pub fn pipelines(&self) -> &[VariantPipeline] {
        &self.pipelines
    }

    /// The crop size that will be applied at `iteration`.
    pub fn crop_size_for(&self, iteration: u64) -> u32 {
        let idx = select_scale_index(iteration, self.pipelines.len(), self.switch_after);
        self.pipelines[idx].crop_size()
    }

    /// Construct one sample.
    ///
    /// Loader and transform failures surface unchanged; a bad record
    /// fails this sample only.
    pub fn assemble(
        &self,
        source: ImageSource,
        prefix: &str,
        target: &str,
        iteration: u64,
    ) -> Result<Sample> {
        let CaptionLabels {
            tokens,
            need_predict,
        } = build_caption_labels(self.encoder.as_ref(), prefix, target, self.max_text_len)?;

        let image = load_image(source)?;
        let idx = select_scale_index(iteration, self.pipelines.len(), self.switch_after);
        let images = self.pipelines[idx].apply(image_map_from(image))?;

        Ok(Sample {
            caption_tokens: tokens,
            need_predict,
            images,
            caption: serde_json::Map::new(),
            iteration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_ops::DefaultTransformFactory;
    use crate::transform::PRIMARY_IMAGE_KEY;
    use image::{DynamicImage, Rgb, RgbImage};
    use vistext_core::PreprocessConfig;

    struct WordLenEncoder;

    impl TextEncoder for WordLenEncoder {
        fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i32>> {
            let mut ids: Vec<i32> = text
                .split_whitespace()
                .map(|w| 100 + w.len() as i32)
                .collect();
            ids.truncate(max_len);
            Ok(ids)
        }

        fn bos_id(&self) -> i32 {
            1
        }

        fn eos_id(&self) -> i32 {
            2
        }

        fn pad_id(&self) -> i32 {
            0
        }
    }

    fn test_image() -> ImageSource {
        ImageSource::Decoded(DynamicImage::ImageRgb8(RgbImage::from_fn(32, 32, |_, _| {
            Rgb([120, 60, 30])
        })))
    }

    fn multi_scale_assembler(switch_after: u64) -> SampleAssembler {
        let config = PreprocessConfig {
            min_size_range: Some([8, 16]),
            patch_size: 8,
            switch_after,
            ..Default::default()
        };
        let factory = DefaultTransformFactory::from_config(&config);
        SampleAssembler::from_config(&config, Arc::new(WordLenEncoder), &factory, true).unwrap()
    }

    #[test]
    fn eval_config_ignores_size_range() {
        // from_config with is_train = false pins the eval crop size.
        let config = PreprocessConfig {
            min_size_range: Some([8, 16]),
            patch_size: 8,
            test_crop_size: 12,
            ..Default::default()
        };
        let factory = DefaultTransformFactory::from_config(&config);
        let assembler =
            SampleAssembler::from_config(&config, Arc::new(WordLenEncoder), &factory, false)
                .unwrap();
        assert_eq!(assembler.pipelines().len(), 1);
        assert_eq!(assembler.crop_size_for(0), 12);
    }

    #[test]
    fn train_config_builds_the_stepped_schedule() {
        let config = PreprocessConfig {
            min_size_range: Some([160, 224]),
            patch_size: 16,
            ..Default::default()
        };
        let factory = DefaultTransformFactory::from_config(&config);
        let assembler =
            SampleAssembler::from_config(&config, Arc::new(WordLenEncoder), &factory, true)
                .unwrap();
        let sizes: Vec<u32> = assembler
            .pipelines()
            .iter()
            .map(|p| p.crop_size())
            .collect();
        assert_eq!(sizes, vec![160, 176, 192, 208, 224]);
    }

    #[test]
    fn iteration_drives_the_selected_crop_size() {
        let assembler = multi_scale_assembler(0);
        let a = assembler.assemble(test_image(), "", "a cat", 0).unwrap();
        let b = assembler.assemble(test_image(), "", "a cat", 1).unwrap();
        assert_eq!(a.images[PRIMARY_IMAGE_KEY].tensor().unwrap().shape(), &[3, 8, 8]);
        assert_eq!(b.images[PRIMARY_IMAGE_KEY].tensor().unwrap().shape(), &[3, 16, 16]);
    }

    #[test]
    fn selection_freezes_after_the_warm_up_budget() {
        let assembler = multi_scale_assembler(3);
        let late = assembler.assemble(test_image(), "", "a cat", 4).unwrap();
        assert_eq!(
            late.images[PRIMARY_IMAGE_KEY].tensor().unwrap().shape(),
            &[3, 16, 16]
        );
    }

    #[test]
    fn assembled_labels_follow_the_caption() {
        let assembler = multi_scale_assembler(0);
        let sample = assembler.assemble(test_image(), "", "a cat", 0).unwrap();
        assert_eq!(sample.caption_tokens, vec![1, 101, 103, 2]);
        assert_eq!(sample.need_predict, vec![0, 1, 1, 1]);
        assert_eq!(sample.iteration, 0);
        assert!(sample.caption.is_empty());
    }

    #[test]
    fn missing_file_fails_the_sample() {
        let assembler = multi_scale_assembler(0);
        let err = assembler
            .assemble(ImageSource::path("/no/such/image.png"), "", "x", 0)
            .unwrap_err();
        assert!(matches!(err, VisTextError::Transform(_)));
    }

    #[test]
    fn empty_pipeline_set_is_rejected() {
        let err =
            SampleAssembler::new(Arc::new(WordLenEncoder), Vec::new(), 0, 40).unwrap_err();
        assert!(matches!(err, VisTextError::Config(_)));
    }
}
