//! Frame-level 2D CNN backbone.
//!
//! Every frame is encoded independently by a stack of Conv2d blocks followed
//! by global average pooling; frame features of a clip are then averaged over
//! time. This is the backbone shape TSN-style 2D recognizers expect.

use burn::module::Ignored;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{conv_stack, validate_conv_stack, Backbone, ConvBlock2d};
use crate::mode::ForwardMode;

/// Configuration for the [`FrameCNN`] backbone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameCNNConfig {
    /// Number of input channels (3 for RGB, 2 for optical flow).
    pub in_channels: usize,
    /// Output channels of each conv block.
    pub channels: Vec<usize>,
    /// Square kernel size, must be odd.
    pub kernel_size: usize,
}

impl Default for FrameCNNConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            channels: vec![16, 32],
            kernel_size: 3,
        }
    }
}

impl FrameCNNConfig {
    /// Create a new config for the given number of input channels.
    pub fn new(in_channels: usize) -> Self {
        Self {
            in_channels,
            ..Default::default()
        }
    }

    /// Set the conv block widths.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<usize>) -> Self {
        self.channels = channels;
        self
    }

    /// Set the kernel size.
    #[must_use]
    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Check the config before building a model from it.
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_conv_stack(self.in_channels, &self.channels, self.kernel_size)
    }

    /// Width of the features produced by the backbone.
    #[must_use]
    pub fn out_channels(&self) -> usize {
        self.channels.last().copied().unwrap_or(self.in_channels)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FrameCNN<B> {
        FrameCNN {
            blocks: conv_stack(self.in_channels, &self.channels, self.kernel_size, device),
            gap: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            config: Ignored(self.clone()),
        }
    }
}

/// Per-frame 2D CNN with temporal mean pooling.
///
/// # Example
///
/// ```rust,ignore
/// let backbone = FrameCNNConfig::new(3).init::<NdArray>(&device);
/// let imgs = Tensor::zeros([8, 3, 1, 32, 32], &device);
/// let features = backbone.forward(imgs, ForwardMode::Inference);
/// // features shape: [8, 32]
/// ```
#[derive(Module, Debug)]
pub struct FrameCNN<B: Backend> {
    blocks: Vec<ConvBlock2d<B>>,
    gap: AdaptiveAvgPool2d,
    config: Ignored<FrameCNNConfig>,
}

impl<B: Backend> FrameCNN<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `imgs` - Input of shape (clips, channels, frames, height, width)
    /// * `mode` - Training or inference behaviour of the batch norms
    ///
    /// # Returns
    ///
    /// Features of shape (clips, out_channels)
    pub fn forward(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2> {
        let [n, c, t, h, w] = imgs.dims();

        // Fold time into the batch dimension
        let mut x = imgs.swap_dims(1, 2).reshape([n * t, c, h, w]);
        for block in &self.blocks {
            x = block.forward(x, mode);
        }

        let x = self.gap.forward(x);
        let d = x.dims()[1];
        x.reshape([n, t, d]).mean_dim(1).reshape([n, d])
    }
}

impl<B: Backend> Backbone<B> for FrameCNN<B> {
    fn forward(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2> {
        self.forward(imgs, mode)
    }

    fn init_weights(&mut self, device: &B::Device) {
        *self = self.config.init(device);
    }

    fn out_channels(&self) -> usize {
        self.config.out_channels()
    }

    fn name(&self) -> &str {
        "FrameCNN"
    }
}
