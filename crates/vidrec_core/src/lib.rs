//! # vidrec_core
//!
//! Core types for vidrec video action recognition.
//!
//! This crate provides:
//! - [`ClipBatch`] for batches of video clips with optional labels
//! - [`RecognizerConfig`] and the [`AverageClips`] test-time policy
//! - [`Seed`] for deterministic weight initialization
//! - [`collect_env`] for environment reports
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Clip batches follow `(N, K, C, T, H, W)`:
//! - `N`: batch size (number of videos)
//! - `K`: clips or segments per video
//! - `C`: channels
//! - `T`: frames per clip
//! - `H`, `W`: spatial size

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod config;
mod env;
mod error;
mod seed;

pub use batch::ClipBatch;
pub use config::{
    seed_from_train_cfg, AverageClips, RecognizerConfig, AVERAGE_CLIPS_KEY, SEED_KEY,
};
pub use env::{collect_env, BURN_VERSION};
pub use error::{CoreError, Result};
pub use seed::Seed;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;
}
