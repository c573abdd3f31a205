//! Backbones: feature extractors turning clips into dense features.

mod frame_cnn;
mod r2plus1d;

pub use frame_cnn::{FrameCNN, FrameCNNConfig};
pub use r2plus1d::{R2Plus1D, R2Plus1DConfig};

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;

use crate::mode::{batch_norm, ForwardMode};

/// Capability every backbone provides to a recognizer.
///
/// Backbones are burn modules; the optimizer reaches their parameters
/// through the recognizer that owns them.
pub trait Backbone<B: Backend>: Module<B> {
    /// Extract features.
    ///
    /// # Arguments
    ///
    /// * `imgs` - Clips of shape (clips, channels, frames, height, width)
    /// * `mode` - Training or inference behaviour of normalization layers
    ///
    /// # Returns
    ///
    /// Features of shape (clips, out_channels)
    fn forward(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2>;

    /// Re-create all parameters from the backbone config.
    ///
    /// Draws from the backend RNG, so the caller seeds the backend first.
    fn init_weights(&mut self, device: &B::Device);

    /// Width of the produced features.
    fn out_channels(&self) -> usize;

    /// Registered name of the backbone.
    fn name(&self) -> &str;
}

/// Any of the built-in backbones.
#[derive(Module, Debug)]
pub enum BackboneModel<B: Backend> {
    /// Per-frame 2D CNN.
    FrameCNN(FrameCNN<B>),
    /// Factorized (2+1)D CNN.
    R2Plus1D(R2Plus1D<B>),
}

impl<B: Backend> From<FrameCNN<B>> for BackboneModel<B> {
    fn from(model: FrameCNN<B>) -> Self {
        Self::FrameCNN(model)
    }
}

impl<B: Backend> From<R2Plus1D<B>> for BackboneModel<B> {
    fn from(model: R2Plus1D<B>) -> Self {
        Self::R2Plus1D(model)
    }
}

impl<B: Backend> Backbone<B> for BackboneModel<B> {
    fn forward(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2> {
        match self {
            Self::FrameCNN(model) => Backbone::forward(model, imgs, mode),
            Self::R2Plus1D(model) => Backbone::forward(model, imgs, mode),
        }
    }

    fn init_weights(&mut self, device: &B::Device) {
        match self {
            Self::FrameCNN(model) => model.init_weights(device),
            Self::R2Plus1D(model) => model.init_weights(device),
        }
    }

    fn out_channels(&self) -> usize {
        match self {
            Self::FrameCNN(model) => model.out_channels(),
            Self::R2Plus1D(model) => model.out_channels(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::FrameCNN(model) => model.name(),
            Self::R2Plus1D(model) => model.name(),
        }
    }
}

/// Conv2d -> BatchNorm -> ReLU, applied frame by frame.
#[derive(Module, Debug)]
pub struct ConvBlock2d<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock2d<B> {
    /// Create a new block with "same" padding.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    /// Forward pass on (batch, channels, height, width).
    pub fn forward(&self, x: Tensor<B, 4>, mode: ForwardMode) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = batch_norm(&self.bn, out, mode);
        Relu::new().forward(out)
    }
}

/// Stack per-frame conv blocks following `channels`.
pub(crate) fn conv_stack<B: Backend>(
    in_channels: usize,
    channels: &[usize],
    kernel_size: usize,
    device: &B::Device,
) -> Vec<ConvBlock2d<B>> {
    let mut blocks = Vec::with_capacity(channels.len());
    let mut c_in = in_channels;
    for &c_out in channels {
        blocks.push(ConvBlock2d::new(c_in, c_out, kernel_size, device));
        c_in = c_out;
    }
    blocks
}

/// Shared checks for the conv-stack settings of a backbone config.
pub(crate) fn validate_conv_stack(
    in_channels: usize,
    channels: &[usize],
    kernel_size: usize,
) -> std::result::Result<(), String> {
    if in_channels == 0 {
        return Err("in_channels must be positive".to_string());
    }
    if channels.is_empty() || channels.contains(&0) {
        return Err(format!("channels must be non-empty and positive, got {:?}", channels));
    }
    if kernel_size % 2 == 0 {
        return Err(format!("kernel_size must be odd, got {}", kernel_size));
    }
    Ok(())
}
