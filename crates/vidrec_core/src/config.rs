//! Configuration records.
//!
//! Recognizers are described by a JSON document of the form
//!
//! ```json
//! {
//!     "type": "Recognizer3D",
//!     "backbone": { "type": "R2Plus1D", "in_channels": 3 },
//!     "cls_head": { "type": "I3DHead", "num_classes": 10, "in_channels": 64 },
//!     "train_cfg": { "seed": 0 },
//!     "test_cfg": { "average_clips": "prob" }
//! }
//! ```
//!
//! `train_cfg` and `test_cfg` stay opaque mappings: they are only interpreted
//! by the recognizer contract and by the variants, when the related operation
//! is actually requested.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::seed::Seed;

/// Key of the clip-averaging policy inside `test_cfg`.
pub const AVERAGE_CLIPS_KEY: &str = "average_clips";

/// Key of the weight-initialization seed inside `train_cfg`.
pub const SEED_KEY: &str = "seed";

/// Policy used to merge the scores of several clips of the same sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageClips {
    /// Mean of the raw (pre-softmax) scores.
    Score,
    /// Mean of the per-clip softmax probabilities.
    Prob,
}

impl AverageClips {
    /// Read the policy from a `test_cfg` record.
    ///
    /// Returns `Ok(None)` when the key holds `null`, meaning no aggregation.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingConfigKey`] when `test_cfg` is absent or has no
    ///   `average_clips` key.
    /// - [`CoreError::UnsupportedAverageClips`] for any value other than
    ///   `"score"`, `"prob"` or `null`.
    pub fn from_test_cfg(test_cfg: Option<&Value>) -> Result<Option<Self>> {
        let value = test_cfg
            .and_then(|cfg| cfg.get(AVERAGE_CLIPS_KEY))
            .ok_or_else(|| CoreError::missing_key(AVERAGE_CLIPS_KEY, "test_cfg"))?;

        match value {
            Value::Null => Ok(None),
            Value::String(s) if s == "score" => Ok(Some(Self::Score)),
            Value::String(s) if s == "prob" => Ok(Some(Self::Prob)),
            Value::String(s) => Err(CoreError::UnsupportedAverageClips(s.clone())),
            other => Err(CoreError::UnsupportedAverageClips(other.to_string())),
        }
    }

    /// Policy name as written in configs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Prob => "prob",
        }
    }
}

impl fmt::Display for AverageClips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the initialization seed from a `train_cfg` record.
///
/// A missing record or key falls back to [`Seed::default`].
///
/// # Errors
///
/// [`CoreError::InvalidConfig`] when `seed` is present but not an unsigned integer.
pub fn seed_from_train_cfg(train_cfg: Option<&Value>) -> Result<Seed> {
    match train_cfg.and_then(|cfg| cfg.get(SEED_KEY)) {
        None | Some(Value::Null) => Ok(Seed::default()),
        Some(value) => value.as_u64().map(Seed::new).ok_or_else(|| {
            CoreError::InvalidConfig(format!(
                "train_cfg.{} must be an unsigned integer, got {}",
                SEED_KEY, value
            ))
        }),
    }
}

/// Full description of a recognizer: variant, components and run configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Registered recognizer variant (e.g. `Recognizer2D`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Backbone record; must carry a `type` key.
    pub backbone: Value,
    /// Classification head record; must carry a `type` key.
    pub cls_head: Value,
    /// Training-time config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_cfg: Option<Value>,
    /// Test-time config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cfg: Option<Value>,
}

impl RecognizerConfig {
    /// Create a config without train/test records.
    pub fn new(kind: impl Into<String>, backbone: Value, cls_head: Value) -> Self {
        Self {
            kind: kind.into(),
            backbone,
            cls_head,
            train_cfg: None,
            test_cfg: None,
        }
    }

    /// Set the training config record.
    #[must_use]
    pub fn with_train_cfg(mut self, train_cfg: Value) -> Self {
        self.train_cfg = Some(train_cfg);
        self
    }

    /// Set the test config record.
    #[must_use]
    pub fn with_test_cfg(mut self, test_cfg: Value) -> Self {
        self.test_cfg = Some(test_cfg);
        self
    }

    /// Parse a config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded recognizer config from {:?}", path.as_ref());
        Self::from_json_str(&text)
    }
}
