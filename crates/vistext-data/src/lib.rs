//! Sample construction and batching for image/caption training.
//!
//! This crate turns raw (image, prefix, target) records into batched
//! tensors ready for a sequence-generation model:
//!
//! - Caption tokenization with a per-token loss mask
//! - Multi-scale image transforms selected per training iteration
//! - Batch collation with padding for variable-length fields
//! - JSONL dataset loading and batch iteration
//!
//! The model itself, the tokenizer's wordpiece algorithm, and the
//! training loop are external collaborators; this crate only prepares
//! their input.

#![warn(missing_docs)]

pub mod collator;
pub mod dataset;
pub mod image_ops;
pub mod loader;
pub mod pipeline;
pub mod sample;
pub mod schedule;
pub mod text;
pub mod tokenizer;
pub mod transform;

pub use collator::*;
pub use dataset::*;
pub use image_ops::*;
pub use loader::*;
pub use pipeline::*;
pub use sample::*;
pub use schedule::*;
pub use text::*;
pub use tokenizer::*;
pub use transform::*;
