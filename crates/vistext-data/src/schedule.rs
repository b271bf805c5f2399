//! Crop-size schedules and iteration-driven scale selection.

use vistext_core::{Result, VisTextError};

/// Ordered list of candidate crop sizes for multi-scale training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleSchedule {
    sizes: Vec<u32>,
}

impl ScaleSchedule {
    /// Single-scale schedule.
    pub fn fixed(size: u32) -> Result<Self> {
        if size == 0 {
            return Err(VisTextError::Config("crop size must be positive".to_string()));
        }
        Ok(Self { sizes: vec![size] })
    }

    /// Schedule stepping from `min` to `max` inclusive by `patch_size`.
    ///
    /// Both bounds must be positive multiples of `patch_size`.
    pub fn stepped(min: u32, max: u32, patch_size: u32) -> Result<Self> {
        if patch_size == 0 {
            return Err(VisTextError::Config("patch size must be positive".to_string()));
        }
        if min == 0 {
            return Err(VisTextError::Config("minimum crop size must be positive".to_string()));
        }
        if max < min {
            return Err(VisTextError::Config(format!(
                "crop size range is inverted: [{min}, {max}]"
            )));
        }
        if min % patch_size != 0 || max % patch_size != 0 {
            return Err(VisTextError::Config(format!(
                "crop size range [{min}, {max}] is not aligned to patch size {patch_size}"
            )));
        }
        let sizes: Vec<u32> = (min..=max).step_by(patch_size as usize).collect();
        Ok(Self { sizes })
    }

    /// The candidate sizes, strictly increasing.
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Number of candidate sizes.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false: a schedule holds at least one size.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// The largest candidate size.
    pub fn largest(&self) -> u32 {
        *self.sizes.last().expect("schedule is never empty")
    }
}

/// Select which scale pipeline to run for a given training iteration.
///
/// Pure function of its arguments, invoked once per sample with that
/// sample's own `iteration` field so that samples drawn for different
/// logical steps in one process schedule independently.
///
/// With `switch_after == 0` the selection round-robins across the
/// schedule forever; otherwise it round-robins through iteration
/// `switch_after` (the multi-scale warm-up) and then freezes to the
/// last, largest scale.
pub fn select_scale_index(iteration: u64, schedule_len: usize, switch_after: u64) -> usize {
    debug_assert!(schedule_len > 0);
    if switch_after == 0 {
        if schedule_len == 1 {
            0
        } else {
            (iteration % schedule_len as u64) as usize
        }
    } else if iteration <= switch_after {
        (iteration % schedule_len as u64) as usize
    } else {
        schedule_len - 1
    }
}
