//! Component registry for building backbones and heads by name.
//!
//! Component configs are JSON mappings whose `type` key names a registered
//! variant; the remaining keys are constructor arguments. The registry is an
//! explicit value: build one with [`default_registry`], add custom components
//! with [`ComponentRegistry::register_backbone`] /
//! [`ComponentRegistry::register_head`], and pass it to the recognizers.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidrec_models::registry::default_registry;
//! use serde_json::json;
//!
//! let registry = default_registry::<NdArray>();
//! let backbone = registry.build_backbone(&json!({ "type": "FrameCNN" }), &device)?;
//! let head = registry.build_head(
//!     &json!({ "type": "TSNHead", "num_classes": 10, "in_channels": 32 }),
//!     &device,
//! )?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use burn::tensor::backend::Backend;
use serde_json::Value;
use thiserror::Error;

use crate::backbone::{BackboneModel, FrameCNNConfig, R2Plus1DConfig};
use crate::head::{ClsLossConfig, HeadModel, I3DHeadConfig, TSNHeadConfig};

/// Error type for component registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No constructor registered under the requested name.
    #[error("{kind} '{name}' not found in registry")]
    UnknownVariant {
        /// Component kind (`backbone` or `head`).
        kind: &'static str,
        /// Requested variant name.
        name: String,
    },

    /// The component config has no string `type` key.
    #[error("Missing 'type' in {0} config")]
    MissingType(&'static str),

    /// Invalid constructor arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Type alias for backbone constructors.
pub type BackboneConstructor<B> =
    Arc<dyn Fn(&Value, &<B as Backend>::Device) -> Result<BackboneModel<B>> + Send + Sync>;

/// Type alias for head constructors.
pub type HeadConstructor<B> =
    Arc<dyn Fn(&Value, &<B as Backend>::Device) -> Result<HeadModel<B>> + Send + Sync>;

/// Name -> constructor tables for backbones and heads.
pub struct ComponentRegistry<B: Backend> {
    backbones: HashMap<String, BackboneConstructor<B>>,
    heads: HashMap<String, HeadConstructor<B>>,
}

impl<B: Backend> Default for ComponentRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> ComponentRegistry<B> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            backbones: HashMap::new(),
            heads: HashMap::new(),
        }
    }

    /// Register a backbone constructor, replacing any previous one with the same name.
    pub fn register_backbone<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value, &<B as Backend>::Device) -> Result<BackboneModel<B>> + Send + Sync + 'static,
    {
        self.backbones.insert(name.to_string(), Arc::new(constructor));
    }

    /// Register a head constructor, replacing any previous one with the same name.
    pub fn register_head<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value, &<B as Backend>::Device) -> Result<HeadModel<B>> + Send + Sync + 'static,
    {
        self.heads.insert(name.to_string(), Arc::new(constructor));
    }

    /// Build a backbone from a config with a `type` key.
    pub fn build_backbone(
        &self,
        config: &Value,
        device: &<B as Backend>::Device,
    ) -> Result<BackboneModel<B>> {
        let name = component_type(config, "backbone")?;
        let constructor = self
            .backbones
            .get(name)
            .ok_or_else(|| RegistryError::UnknownVariant {
                kind: "backbone",
                name: name.to_string(),
            })?;
        tracing::debug!("Building backbone '{}'", name);
        constructor(config, device)
    }

    /// Build a head from a config with a `type` key.
    pub fn build_head(
        &self,
        config: &Value,
        device: &<B as Backend>::Device,
    ) -> Result<HeadModel<B>> {
        let name = component_type(config, "head")?;
        let constructor = self
            .heads
            .get(name)
            .ok_or_else(|| RegistryError::UnknownVariant {
                kind: "head",
                name: name.to_string(),
            })?;
        tracing::debug!("Building head '{}'", name);
        constructor(config, device)
    }

    /// Registered backbone names, sorted.
    pub fn backbones(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backbones.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered head names, sorted.
    pub fn heads(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.heads.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check if a backbone is registered.
    pub fn contains_backbone(&self, name: &str) -> bool {
        self.backbones.contains_key(name)
    }

    /// Check if a head is registered.
    pub fn contains_head(&self, name: &str) -> bool {
        self.heads.contains_key(name)
    }
}

// ============================================================================
// Helper functions for parsing configs
// ============================================================================

fn component_type<'a>(config: &'a Value, kind: &'static str) -> Result<&'a str> {
    config
        .get("type")
        .and_then(Value::as_str)
        .ok_or(RegistryError::MissingType(kind))
}

fn get_usize(config: &Value, key: &str) -> Result<usize> {
    config
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| RegistryError::InvalidConfig(format!("Missing or invalid '{}'", key)))
}

fn get_usize_or(config: &Value, key: &str, default: usize) -> Result<usize> {
    match config.get(key) {
        None => Ok(default),
        Some(_) => get_usize(config, key),
    }
}

fn get_f64_or(config: &Value, key: &str, default: f64) -> Result<f64> {
    match config.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| RegistryError::InvalidConfig(format!("Invalid '{}': {}", key, v))),
    }
}

fn get_usize_list_or(config: &Value, key: &str, default: Vec<usize>) -> Result<Vec<usize>> {
    let Some(value) = config.get(key) else {
        return Ok(default);
    };
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_u64().map(|v| v as usize))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| {
            RegistryError::InvalidConfig(format!("'{}' must be a list of unsigned integers", key))
        })
}

fn get_loss_config(config: &Value) -> Result<ClsLossConfig> {
    let defaults = ClsLossConfig::default();
    let label_smoothing = match config.get("label_smoothing") {
        None | Some(Value::Null) => None,
        Some(_) => Some(get_f64_or(config, "label_smoothing", 0.0)? as f32),
    };

    Ok(ClsLossConfig {
        loss_weight: get_f64_or(config, "loss_weight", f64::from(defaults.loss_weight))? as f32,
        label_smoothing,
        topk: get_usize_list_or(config, "topk", defaults.topk)?,
    })
}

fn check(result: std::result::Result<(), String>) -> Result<()> {
    result.map_err(RegistryError::InvalidConfig)
}

// ============================================================================
// Default registry with all components
// ============================================================================

/// Create a registry with the built-in components pre-registered.
///
/// # Backbones
///
/// - `FrameCNN` - `in_channels` (3), `channels` ([16, 32]), `kernel_size` (3)
/// - `R2Plus1D` - `in_channels` (3), `spatial_channels` ([16, 32]),
///   `spatial_kernel` (3), `temporal_channels` (64), `temporal_kernel` (3)
///
/// # Heads
///
/// - `TSNHead` - segment consensus head
/// - `I3DHead` - clip-level head
///
/// Heads require `num_classes` and `in_channels`, and accept `dropout_ratio`,
/// `init_std`, `loss_weight`, `label_smoothing` and `topk`.
pub fn default_registry<B: Backend>() -> ComponentRegistry<B> {
    let mut registry = ComponentRegistry::new();

    // FrameCNN
    registry.register_backbone("FrameCNN", |config, device| {
        let defaults = FrameCNNConfig::default();
        let model_config = FrameCNNConfig::new(get_usize_or(config, "in_channels", defaults.in_channels)?)
            .with_channels(get_usize_list_or(config, "channels", defaults.channels)?)
            .with_kernel_size(get_usize_or(config, "kernel_size", defaults.kernel_size)?);
        check(model_config.validate())?;

        Ok(model_config.init::<B>(device).into())
    });

    // R2Plus1D
    registry.register_backbone("R2Plus1D", |config, device| {
        let defaults = R2Plus1DConfig::default();
        let model_config = R2Plus1DConfig::new(get_usize_or(config, "in_channels", defaults.in_channels)?)
            .with_spatial_channels(get_usize_list_or(
                config,
                "spatial_channels",
                defaults.spatial_channels,
            )?)
            .with_spatial_kernel(get_usize_or(config, "spatial_kernel", defaults.spatial_kernel)?)
            .with_temporal_channels(get_usize_or(
                config,
                "temporal_channels",
                defaults.temporal_channels,
            )?)
            .with_temporal_kernel(get_usize_or(config, "temporal_kernel", defaults.temporal_kernel)?);
        check(model_config.validate())?;

        Ok(model_config.init::<B>(device).into())
    });

    // TSNHead
    registry.register_head("TSNHead", |config, device| {
        let num_classes = get_usize(config, "num_classes")?;
        let in_channels = get_usize(config, "in_channels")?;
        let defaults = TSNHeadConfig::new(num_classes, in_channels);

        let head_config = TSNHeadConfig::new(num_classes, in_channels)
            .with_dropout_ratio(get_f64_or(config, "dropout_ratio", defaults.dropout_ratio)?)
            .with_init_std(get_f64_or(config, "init_std", defaults.init_std)?)
            .with_loss(get_loss_config(config)?);
        check(head_config.validate())?;

        Ok(head_config.init::<B>(device).into())
    });

    // I3DHead
    registry.register_head("I3DHead", |config, device| {
        let num_classes = get_usize(config, "num_classes")?;
        let in_channels = get_usize(config, "in_channels")?;
        let defaults = I3DHeadConfig::new(num_classes, in_channels);

        let head_config = I3DHeadConfig::new(num_classes, in_channels)
            .with_dropout_ratio(get_f64_or(config, "dropout_ratio", defaults.dropout_ratio)?)
            .with_init_std(get_f64_or(config, "init_std", defaults.init_std)?)
            .with_loss(get_loss_config(config)?);
        check(head_config.validate())?;

        Ok(head_config.init::<B>(device).into())
    });

    registry
}
