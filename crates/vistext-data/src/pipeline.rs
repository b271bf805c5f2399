//! Scale-pipeline construction.

use crate::schedule::ScaleSchedule;
use crate::transform::{PixelTransform, TransformStep, VariantPipeline, PRIMARY_IMAGE_KEY};
use std::sync::Arc;
use tracing::debug;
use vistext_core::{Result, VisTextError};

/// Builds primitive resize/crop/normalize transforms for one crop size.
///
/// The crop size arrives as an explicit parameter; implementations must
/// not read it back out of shared mutable configuration.
pub trait TransformFactory {
    /// Build the pixel transform for `crop_size`.
    fn build(&self, crop_size: u32, is_train: bool) -> Result<Arc<dyn PixelTransform>>;
}

/// Build one [`VariantPipeline`] per schedule entry.
///
/// For a target size `s`, each resolution factor `f` (index `i`) adds an
/// auxiliary variant at `s / f` under key `image_{i}` — a rename keeping
/// the original followed by a transform scoped to the new key — and the
/// pipeline finishes with the full-size transform on the primary key.
///
/// A factor that does not evenly divide `s` floors the division; with
/// `strict_factors` it is rejected instead.
pub fn build_scale_pipelines(
    schedule: &ScaleSchedule,
    resolution_factors: &[u32],
    factory: &dyn TransformFactory,
    is_train: bool,
    strict_factors: bool,
) -> Result<Vec<VariantPipeline>> {
    let mut pipelines = Vec::with_capacity(schedule.len());
    for &size in schedule.sizes() {
        let mut steps = Vec::with_capacity(2 * resolution_factors.len() + 1);
        for (i, &factor) in resolution_factors.iter().enumerate() {
            if factor == 0 {
                return Err(VisTextError::Schedule(
                    "resolution factor must be positive".to_string(),
                ));
            }
            if strict_factors && size % factor != 0 {
                return Err(VisTextError::Schedule(format!(
                    "resolution factor {factor} does not divide crop size {size}"
                )));
            }
            let key = format!("image_{i}");
            steps.push(TransformStep::Rename {
                from: PRIMARY_IMAGE_KEY.to_string(),
                to: key.clone(),
                keep_origin: true,
            });
            steps.push(TransformStep::Scoped {
                key,
                op: factory.build(size / factor, is_train)?,
            });
        }
        steps.push(TransformStep::Scoped {
            key: PRIMARY_IMAGE_KEY.to_string(),
            op: factory.build(size, is_train)?,
        });
        debug!(size, steps = steps.len(), "built scale pipeline");
        pipelines.push(VariantPipeline::new(size, steps));
    }
    Ok(pipelines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use ndarray::Array3;

    struct SizeRecorder;

    struct SizedTransform {
        size: u32,
    }

    impl PixelTransform for SizedTransform {
        fn apply(&self, _image: &DynamicImage) -> Result<Array3<f32>> {
            let s = self.size as usize;
            Ok(Array3::zeros((3, s, s)))
        }

        fn output_size(&self) -> u32 {
            self.size
        }
    }

    impl TransformFactory for SizeRecorder {
        fn build(&self, crop_size: u32, _is_train: bool) -> Result<Arc<dyn PixelTransform>> {
            Ok(Arc::new(SizedTransform { size: crop_size }))
        }
    }

    fn scoped_sizes(pipeline: &VariantPipeline) -> Vec<(String, u32)> {
        pipeline
            .steps()
            .iter()
            .filter_map(|step| match step {
                TransformStep::Scoped { key, op } => Some((key.clone(), op.output_size())),
                TransformStep::Rename { .. } => None,
            })
            .collect()
    }

    #[test]
    fn one_pipeline_per_schedule_entry() {
        let schedule = ScaleSchedule::stepped(160, 224, 16).unwrap();
        let pipelines =
            build_scale_pipelines(&schedule, &[], &SizeRecorder, true, false).unwrap();
        assert_eq!(pipelines.len(), 5);
        for (pipeline, &size) in pipelines.iter().zip(schedule.sizes()) {
            assert_eq!(pipeline.crop_size(), size);
            assert_eq!(scoped_sizes(pipeline), vec![("image".to_string(), size)]);
        }
    }

    #[test]
    fn factors_add_named_variants_before_the_primary() {
        let schedule = ScaleSchedule::fixed(224).unwrap();
        let pipelines =
            build_scale_pipelines(&schedule, &[2, 4], &SizeRecorder, true, false).unwrap();
        assert_eq!(
            scoped_sizes(&pipelines[0]),
            vec![
                ("image_0".to_string(), 112),
                ("image_1".to_string(), 56),
                ("image".to_string(), 224),
            ]
        );
        // Rename + scoped per factor, plus the final primary transform.
        assert_eq!(pipelines[0].steps().len(), 5);
    }

    #[test]
    fn non_dividing_factor_floors_by_default() {
        let schedule = ScaleSchedule::fixed(224).unwrap();
        let pipelines =
            build_scale_pipelines(&schedule, &[3], &SizeRecorder, true, false).unwrap();
        assert_eq!(
            scoped_sizes(&pipelines[0]),
            vec![("image_0".to_string(), 74), ("image".to_string(), 224)]
        );
    }

    #[test]
    fn strict_mode_rejects_non_dividing_factor() {
        let schedule = ScaleSchedule::fixed(224).unwrap();
        let err =
            build_scale_pipelines(&schedule, &[3], &SizeRecorder, true, true).unwrap_err();
        assert!(matches!(err, VisTextError::Schedule(_)));
    }

    #[test]
    fn zero_factor_is_rejected() {
        let schedule = ScaleSchedule::fixed(224).unwrap();
        let err =
            build_scale_pipelines(&schedule, &[0], &SizeRecorder, true, false).unwrap_err();
        assert!(matches!(err, VisTextError::Schedule(_)));
    }
}
