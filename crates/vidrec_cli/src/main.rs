//! vidrec CLI for environment reports, config inspection and smoke runs.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use vidrec::prelude::*;

/// Backend type for training.
type TrainBackend = Autodiff<NdArray>;

/// Backend type for inspection.
type InferBackend = NdArray;

#[derive(Parser)]
#[command(name = "vidrec")]
#[command(author, version)]
#[command(about = "Video action recognition CLI - inspect and smoke-test recognizers")]
#[command(long_about = "vidrec: recognizers, backbones and heads for video action recognition.

EXAMPLES:
  # Print the environment report
  vidrec env

  # Show what a config builds
  vidrec inspect --config configs/recognizer2d_frame_cnn.json

  # Run one train step, one SGD update and one val step on synthetic clips
  vidrec smoke --config configs/recognizer3d_r2plus1d.json --clips 2 --frames 8 --lr 0.05

AVAILABLE COMPONENTS:
  Recognizers: Recognizer2D, Recognizer3D
  Backbones:   FrameCNN, R2Plus1D
  Heads:       TSNHead, I3DHead")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print platform, toolchain and backend information
    Env,
    /// Build a recognizer from a config and describe it
    Inspect {
        /// Path to a recognizer config (JSON)
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
    },
    /// Run one train step, one SGD update and one val step on a synthetic batch
    Smoke {
        /// Path to a recognizer config (JSON)
        #[arg(long, value_name = "FILE")]
        config: PathBuf,

        /// Number of videos in the batch
        #[arg(long, default_value = "2", value_name = "N")]
        batch_size: usize,

        /// Clips (or segments) per video
        #[arg(long, default_value = "3", value_name = "K")]
        clips: usize,

        /// Frames per clip
        #[arg(long, default_value = "4", value_name = "T")]
        frames: usize,

        /// Frame size as HEIGHTxWIDTH
        #[arg(long, default_value = "32x32", value_name = "HxW")]
        size: String,

        /// Random seed for the synthetic batch
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,

        /// Learning rate of the SGD update
        #[arg(long, default_value = "0.01", value_name = "LR")]
        lr: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Env => handle_env(),
        Commands::Inspect { config } => handle_inspect(&config),
        Commands::Smoke {
            config,
            batch_size,
            clips,
            frames,
            size,
            seed,
            lr,
        } => handle_smoke(&config, batch_size, clips, frames, &size, seed, lr),
    }
}

fn handle_env() -> Result<()> {
    for (name, value) in collect_env() {
        println!("{}: {}", name, value);
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<RecognizerConfig> {
    if !path.exists() {
        bail!("Config file not found at {:?}", path);
    }
    RecognizerConfig::from_file(path).context(format!("Failed to parse config {:?}", path))
}

fn describe_policy(config: &RecognizerConfig) -> String {
    match AverageClips::from_test_cfg(config.test_cfg.as_ref()) {
        Ok(Some(policy)) => policy.to_string(),
        Ok(None) => "None (clip scores returned as is)".to_string(),
        Err(e) => format!("unusable ({})", e),
    }
}

fn handle_inspect(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let device = Default::default();
    let registry = default_registry::<InferBackend>();

    let recognizer = build_recognizer(&config, &registry, &device)
        .context(format!("Failed to build recognizer from {:?}", path))?;

    let core = recognizer.core();
    let backbone = core.backbone();
    let head = core.cls_head();

    println!("=== vidrec Recognizer ===\n");
    println!("Variant: {}", recognizer.name());
    println!("Backbone: {}", backbone.name());
    println!("  Output channels: {}", backbone.out_channels());
    println!("  Parameters: {}", backbone.num_params());
    println!("Head: {}", head.name());
    println!("  Classes: {}", head.num_classes());
    println!("  Parameters: {}", head.num_params());
    println!("Total parameters: {}", backbone.num_params() + head.num_params());
    println!("Init seed: {}", core.seed().value());
    println!("average_clips: {}", describe_policy(&config));

    Ok(())
}

fn parse_size(size: &str) -> Result<(usize, usize)> {
    let Some((h, w)) = size.split_once('x') else {
        bail!("Invalid size '{}', expected HEIGHTxWIDTH (e.g. 32x32)", size);
    };
    let h = h.trim().parse().context(format!("Invalid height in '{}'", size))?;
    let w = w.trim().parse().context(format!("Invalid width in '{}'", size))?;
    if h == 0 || w == 0 {
        bail!("Frame size must be positive, got {}", size);
    }
    Ok((h, w))
}

/// Create a synthetic batch with class-dependent brightness.
fn synthetic_batch<B: Backend>(
    shape: [usize; 6],
    n_classes: usize,
    seed: Seed,
    device: &B::Device,
) -> Result<ClipBatch<B>> {
    let [batch_size, ..] = shape;
    let per_sample: usize = shape[1..].iter().product();
    let mut rng = seed.to_rng();

    let mut x_data = Vec::with_capacity(batch_size * per_sample);
    let mut y_data = Vec::with_capacity(batch_size);
    for i in 0..batch_size {
        let class = i % n_classes;
        y_data.push(class as i64);
        for _ in 0..per_sample {
            x_data.push(class as f32 / n_classes as f32 + rng.gen::<f32>() * 0.1);
        }
    }

    let imgs = Tensor::<B, 6>::from_data(TensorData::new(x_data, shape), device);
    let label = Tensor::<B, 1, Int>::from_data(TensorData::new(y_data, [batch_size]), device);
    Ok(ClipBatch::with_label(imgs, label)?)
}

fn handle_smoke(
    path: &Path,
    batch_size: usize,
    clips: usize,
    frames: usize,
    size: &str,
    seed: u64,
    lr: f64,
) -> Result<()> {
    if batch_size == 0 || clips == 0 || frames == 0 {
        bail!("batch-size, clips and frames must be positive");
    }
    if !(lr.is_finite() && lr > 0.0) {
        bail!("Learning rate must be positive, got {}", lr);
    }
    let (height, width) = parse_size(size)?;

    let config = load_config(path)?;
    let in_channels = config
        .backbone
        .get("in_channels")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(3) as usize;

    println!("=== vidrec Smoke Run ===\n");
    println!("Configuration:");
    println!("  Config: {}", path.display());
    println!("  Variant: {}", config.kind);
    println!(
        "  Batch shape: ({}, {}, {}, {}, {}, {})",
        batch_size, clips, in_channels, frames, height, width
    );
    println!("  Seed: {}", seed);
    println!("  Learning rate: {}\n", lr);

    let device = Default::default();
    let registry = default_registry::<TrainBackend>();
    let mut recognizer = build_recognizer(&config, &registry, &device)
        .context(format!("Failed to build recognizer from {:?}", path))?;
    let mut optim = SgdConfig::new().init();

    let n_classes = recognizer.core().cls_head().num_classes();
    let batch = synthetic_batch::<TrainBackend>(
        [batch_size, clips, in_channels, frames, height, width],
        n_classes,
        Seed::new(seed),
        &device,
    )?;

    // Training step
    let out = recognizer.train_step(&batch).context("train_step failed")?;
    let loss: f32 = out.loss.clone().into_scalar().elem();

    println!("train_step ({} samples):", out.num_samples);
    for (name, value) in &out.log_vars {
        println!("  {:<12} {:.4}", name, value);
    }

    // Optimizer step
    let grads = GradientsParams::from_grads(out.loss.backward(), &recognizer);
    recognizer = optim.step(lr, recognizer, grads);
    println!("  sgd step: ok (loss {:.4}, lr {})", loss, lr);

    let after: f32 = recognizer
        .train_step(&batch)
        .context("train_step failed")?
        .loss
        .into_scalar()
        .elem();
    println!("  loss after step: {:.4}\n", after);

    // Validation step
    let results = recognizer.val_step(&batch).context("val_step failed")?.results;
    println!("val_step:");
    println!("  results shape: {:?}", results.dims());

    Ok(())
}
