//! vistext CLI - inspect schedules and run the preprocessing pipeline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use vistext_core::{Normalization, PreprocessConfig, Result, VisTextError};
use vistext_data::{
    select_scale_index, BatchCollator, CaptionDataset, CaptionLoader, DefaultTransformFactory,
    HfTextEncoder, LoaderConfig, SampleAssembler, ScaleSchedule, TextEncoder,
};

#[derive(Parser)]
#[command(name = "vistext")]
#[command(author, version, about = "Multi-scale image/caption preprocessing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the crop-size schedule and its per-iteration selection
    Schedule {
        /// Minimum crop size
        #[arg(long, default_value = "160")]
        min_size: u32,

        /// Maximum crop size
        #[arg(long, default_value = "224")]
        max_size: u32,

        /// Patch size stepping the range
        #[arg(long, default_value = "16")]
        patch_size: u32,

        /// Iteration after which selection freezes to the largest scale
        #[arg(long, default_value = "0")]
        switch_after: u64,

        /// Number of iterations to preview
        #[arg(long, default_value = "12")]
        iterations: u64,
    },

    /// Assemble and collate batches from a JSONL caption dataset
    Preprocess {
        /// Dataset path (JSONL with image/prefix/target fields)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Path to a tokenizer.json file
        #[arg(short, long)]
        tokenizer: PathBuf,

        /// Batch size
        #[arg(short, long, default_value = "16")]
        batch_size: usize,

        /// Training crop size (single-scale when no range is given)
        #[arg(long, default_value = "224")]
        crop_size: u32,

        /// Optional minimum crop size enabling multi-scale training
        #[arg(long)]
        min_size: Option<u32>,

        /// Patch size stepping the multi-scale range
        #[arg(long, default_value = "16")]
        patch_size: u32,

        /// Auxiliary resolution factors (image_0, image_1, ...)
        #[arg(long, value_delimiter = ',')]
        factors: Vec<u32>,

        /// Normalization scheme: default or clip
        #[arg(long, default_value = "default")]
        normalize: String,

        /// Iteration after which selection freezes to the largest scale
        #[arg(long, default_value = "0")]
        switch_after: u64,

        /// Number of batches to emit
        #[arg(long, default_value = "4")]
        batches: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Schedule {
            min_size,
            max_size,
            patch_size,
            switch_after,
            iterations,
        } => run_schedule(min_size, max_size, patch_size, switch_after, iterations),
        Commands::Preprocess {
            dataset,
            tokenizer,
            batch_size,
            crop_size,
            min_size,
            patch_size,
            factors,
            normalize,
            switch_after,
            batches,
        } => {
            let normalization = parse_normalization(&normalize)?;
            let config = PreprocessConfig {
                normalization,
                train_crop_size: crop_size,
                min_size_range: min_size.map(|min| [min, crop_size]),
                patch_size,
                multi_res_factors: factors,
                switch_after,
                ..Default::default()
            };
            run_preprocess(&dataset, &tokenizer, batch_size, config, batches)
        }
    }
}

fn parse_normalization(name: &str) -> Result<Normalization> {
    match name {
        "default" => Ok(Normalization::Default),
        "clip" => Ok(Normalization::Clip),
        other => Err(VisTextError::Config(format!(
            "unsupported normalization scheme: {other}"
        ))),
    }
}

fn run_schedule(
    min_size: u32,
    max_size: u32,
    patch_size: u32,
    switch_after: u64,
    iterations: u64,
) -> Result<()> {
    let schedule = ScaleSchedule::stepped(min_size, max_size, patch_size)?;
    println!("schedule: {:?}", schedule.sizes());
    for iteration in 0..iterations {
        let idx = select_scale_index(iteration, schedule.len(), switch_after);
        println!(
            "iteration {iteration:>4} -> crop size {}",
            schedule.sizes()[idx]
        );
    }
    Ok(())
}

fn run_preprocess(
    dataset: &PathBuf,
    tokenizer: &PathBuf,
    batch_size: usize,
    config: PreprocessConfig,
    batches: u64,
) -> Result<()> {
    let dataset = CaptionDataset::from_jsonl(dataset)?;
    info!(records = dataset.len(), "loaded dataset");

    let encoder = Arc::new(HfTextEncoder::from_file(tokenizer)?);
    let pad_id = encoder.pad_id();
    let factory = DefaultTransformFactory::from_config(&config);
    let assembler = SampleAssembler::from_config(&config, encoder, &factory, true)?;

    let mut loader = CaptionLoader::new(
        dataset,
        Arc::new(assembler),
        BatchCollator::new(pad_id),
        LoaderConfig {
            batch_size,
            ..Default::default()
        },
    );

    for iteration in 0..batches {
        match loader.next_batch(iteration)? {
            Some(batch) => {
                let image_shapes: Vec<String> = batch
                    .images
                    .iter()
                    .map(|(key, tensor)| format!("{key}: {:?}", tensor.shape()))
                    .collect();
                println!(
                    "batch {iteration}: {} samples, seq len {}, images [{}]",
                    batch.batch_size,
                    batch.seq_len,
                    image_shapes.join(", ")
                );
            }
            None => {
                info!("dataset exhausted");
                break;
            }
        }
    }
    Ok(())
}
