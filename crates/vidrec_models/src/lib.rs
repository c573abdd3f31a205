//! # vidrec_models
//!
//! Recognizers, backbones and classification heads for vidrec.
//!
//! ## Recognizers
//! - [`Recognizer`] - shared contract: routing, clip averaging, train/val steps
//! - [`Recognizer2D`] - segment-based recognizer with head consensus
//! - [`Recognizer3D`] - clip-level recognizer with test-time clip averaging
//!
//! ## Backbones
//! - [`FrameCNN`] - per-frame 2D CNN with temporal mean
//! - [`R2Plus1D`] - factorized spatial / temporal convolutions
//!
//! ## Heads
//! - [`TSNHead`] - linear classifier with segment consensus
//! - [`I3DHead`] - linear classifier, one score row per clip
//!
//! Components are resolved by name through a [`ComponentRegistry`]. All of
//! them are burn modules; [`ForwardMode`] selects training or inference
//! behaviour per call.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backbone;
pub mod error;
pub mod head;
pub mod losses;
pub mod metrics;
pub mod mode;
pub mod recognizer;
pub mod registry;

pub use backbone::{
    Backbone, BackboneModel, ConvBlock2d, FrameCNN, FrameCNNConfig, R2Plus1D, R2Plus1DConfig,
};
pub use error::{RecognizerError, Result};
pub use head::{ClsLossConfig, Head, HeadModel, I3DHead, I3DHeadConfig, TSNHead, TSNHeadConfig};
pub use losses::{parse_losses, CrossEntropyLoss, LogVars, LossMap};
pub use metrics::top_k_accuracy;
pub use mode::ForwardMode;
pub use recognizer::{
    build_recognizer, ForwardOutput, Recognizer, Recognizer2D, Recognizer3D, RecognizerCore,
    RecognizerModel, TrainStepOutput, ValStepOutput, RECOGNIZER_TYPES,
};
pub use registry::{default_registry, ComponentRegistry, RegistryError};
