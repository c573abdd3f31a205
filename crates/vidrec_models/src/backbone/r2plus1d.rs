//! (2+1)D backbone for clip-level 3D recognizers.
//!
//! Convolution over space and time is factorized: a spatial Conv2d stack
//! encodes each frame, then a temporal Conv1d mixes the frame features of
//! the clip before global pooling.

use burn::module::Ignored;
use burn::nn::{
    conv::{Conv1d, Conv1dConfig},
    pool::{AdaptiveAvgPool1d, AdaptiveAvgPool1dConfig, AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    BatchNorm, BatchNormConfig, PaddingConfig1d, Relu,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{conv_stack, validate_conv_stack, Backbone, ConvBlock2d};
use crate::mode::{batch_norm, ForwardMode};

/// Configuration for the [`R2Plus1D`] backbone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R2Plus1DConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Output channels of each spatial conv block.
    pub spatial_channels: Vec<usize>,
    /// Spatial kernel size, must be odd.
    pub spatial_kernel: usize,
    /// Output channels of the temporal conv (feature width).
    pub temporal_channels: usize,
    /// Temporal kernel size, must be odd.
    pub temporal_kernel: usize,
}

impl Default for R2Plus1DConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            spatial_channels: vec![16, 32],
            spatial_kernel: 3,
            temporal_channels: 64,
            temporal_kernel: 3,
        }
    }
}

impl R2Plus1DConfig {
    /// Create a new config for the given number of input channels.
    pub fn new(in_channels: usize) -> Self {
        Self {
            in_channels,
            ..Default::default()
        }
    }

    /// Set the spatial conv block widths.
    #[must_use]
    pub fn with_spatial_channels(mut self, channels: Vec<usize>) -> Self {
        self.spatial_channels = channels;
        self
    }

    /// Set the spatial kernel size.
    #[must_use]
    pub fn with_spatial_kernel(mut self, kernel: usize) -> Self {
        self.spatial_kernel = kernel;
        self
    }

    /// Set the temporal conv width.
    #[must_use]
    pub fn with_temporal_channels(mut self, channels: usize) -> Self {
        self.temporal_channels = channels;
        self
    }

    /// Set the temporal kernel size.
    #[must_use]
    pub fn with_temporal_kernel(mut self, kernel: usize) -> Self {
        self.temporal_kernel = kernel;
        self
    }

    /// Check the config before building a model from it.
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_conv_stack(self.in_channels, &self.spatial_channels, self.spatial_kernel)?;
        if self.temporal_channels == 0 {
            return Err("temporal_channels must be positive".to_string());
        }
        if self.temporal_kernel % 2 == 0 {
            return Err(format!(
                "temporal_kernel must be odd, got {}",
                self.temporal_kernel
            ));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> R2Plus1D<B> {
        let spatial = conv_stack(
            self.in_channels,
            &self.spatial_channels,
            self.spatial_kernel,
            device,
        );
        let spatial_out = self
            .spatial_channels
            .last()
            .copied()
            .unwrap_or(self.in_channels);

        let temporal = Conv1dConfig::new(spatial_out, self.temporal_channels, self.temporal_kernel)
            .with_padding(PaddingConfig1d::Same)
            .with_bias(false)
            .init(device);

        R2Plus1D {
            spatial,
            spatial_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            temporal,
            temporal_bn: BatchNormConfig::new(self.temporal_channels).init(device),
            temporal_pool: AdaptiveAvgPool1dConfig::new(1).init(),
            config: Ignored(self.clone()),
        }
    }
}

/// Factorized spatio-temporal backbone.
///
/// Architecture:
/// - per-frame Conv2d -> BatchNorm -> ReLU blocks, spatial average pooling
/// - Conv1d over time -> BatchNorm -> ReLU
/// - temporal average pooling
#[derive(Module, Debug)]
pub struct R2Plus1D<B: Backend> {
    spatial: Vec<ConvBlock2d<B>>,
    spatial_pool: AdaptiveAvgPool2d,
    temporal: Conv1d<B>,
    temporal_bn: BatchNorm<B, 1>,
    temporal_pool: AdaptiveAvgPool1d,
    config: Ignored<R2Plus1DConfig>,
}

impl<B: Backend> R2Plus1D<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `imgs` - Input of shape (clips, channels, frames, height, width)
    ///
    /// # Returns
    ///
    /// Features of shape (clips, temporal_channels)
    pub fn forward(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2> {
        let [n, c, t, h, w] = imgs.dims();

        let mut x = imgs.swap_dims(1, 2).reshape([n * t, c, h, w]);
        for block in &self.spatial {
            x = block.forward(x, mode);
        }
        let x = self.spatial_pool.forward(x);
        let d = x.dims()[1];

        // (n, t, d) -> (n, d, t) for the temporal conv
        let x = x.reshape([n, t, d]).swap_dims(1, 2);
        let x = self.temporal.forward(x);
        let x = batch_norm(&self.temporal_bn, x, mode);
        let x = Relu::new().forward(x);

        let x = self.temporal_pool.forward(x);
        let [_, channels, _] = x.dims();
        x.reshape([n, channels])
    }
}

impl<B: Backend> Backbone<B> for R2Plus1D<B> {
    fn forward(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2> {
        self.forward(imgs, mode)
    }

    fn init_weights(&mut self, device: &B::Device) {
        *self = self.config.init(device);
    }

    fn out_channels(&self) -> usize {
        self.config.temporal_channels
    }

    fn name(&self) -> &str {
        "R2Plus1D"
    }
}
