//! # vidrec
//!
//! Video action recognition in Rust.
//!
//! vidrec provides the recognizer layer of an action recognition toolkit:
//!
//! - **Recognizer contract**: forward routing, clip-score averaging, train/val steps
//! - **Variants**: TSN-style 2D recognizer, clip-level 3D recognizer
//! - **Components**: backbones and classification heads resolved by name
//! - **Losses**: cross entropy with top-k metrics and loss aggregation
//! - **Utilities**: seeded initialization, environment report
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vidrec::prelude::*;
//!
//! let config = RecognizerConfig::from_file("configs/recognizer3d_r2plus1d.json")?;
//! let registry = default_registry::<Autodiff<NdArray>>();
//! let mut recognizer = build_recognizer(&config, &registry, &device)?;
//! let mut optim = SgdConfig::new().init();
//!
//! let out = recognizer.train_step(&batch)?;
//! let grads = GradientsParams::from_grads(out.loss.backward(), &recognizer);
//! recognizer = optim.step(0.01, recognizer, grads);
//!
//! let scores = recognizer.val_step(&batch)?.results;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub use vidrec_core as core;
pub use vidrec_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use vidrec::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use vidrec_core::{
        collect_env, AverageClips, ClipBatch, CoreError, RecognizerConfig, Result, Seed,
    };

    // Recognizers
    pub use vidrec_models::{
        build_recognizer, ForwardMode, ForwardOutput, Recognizer, Recognizer2D, Recognizer3D,
        RecognizerError, RecognizerModel, TrainStepOutput, ValStepOutput,
    };

    // Components
    pub use vidrec_models::{
        default_registry, Backbone, BackboneModel, ComponentRegistry, FrameCNNConfig, Head,
        HeadModel, I3DHeadConfig, R2Plus1DConfig, TSNHeadConfig,
    };

    // Losses
    pub use vidrec_models::{parse_losses, LogVars, LossMap};
}

/// All module for importing everything.
pub mod all {
    pub use super::prelude::*;

    pub use vidrec_core::backend;
    pub use vidrec_core::{seed_from_train_cfg, AVERAGE_CLIPS_KEY, BURN_VERSION, SEED_KEY};
    pub use vidrec_models::{
        top_k_accuracy, ClsLossConfig, CrossEntropyLoss, FrameCNN, I3DHead, R2Plus1D,
        RecognizerCore, RegistryError, TSNHead, RECOGNIZER_TYPES,
    };
}
