//! I3D head: linear classifier scoring each clip.

use burn::module::Ignored;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ClsLossConfig, Head};
use crate::losses::LossMap;
use crate::mode::{dropout, ForwardMode};

/// Configuration for the [`I3DHead`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I3DHeadConfig {
    /// Number of classes.
    pub num_classes: usize,
    /// Width of the incoming features.
    pub in_channels: usize,
    /// Dropout probability before the classifier.
    pub dropout_ratio: f64,
    /// Std of the normal initializer of the classifier.
    pub init_std: f64,
    /// Loss settings.
    pub loss: ClsLossConfig,
}

impl I3DHeadConfig {
    /// Create a new config.
    pub fn new(num_classes: usize, in_channels: usize) -> Self {
        Self {
            num_classes,
            in_channels,
            dropout_ratio: 0.5,
            init_std: 0.01,
            loss: ClsLossConfig::default(),
        }
    }

    /// Set the dropout probability.
    #[must_use]
    pub fn with_dropout_ratio(mut self, dropout_ratio: f64) -> Self {
        self.dropout_ratio = dropout_ratio;
        self
    }

    /// Set the initializer std.
    #[must_use]
    pub fn with_init_std(mut self, init_std: f64) -> Self {
        self.init_std = init_std;
        self
    }

    /// Set the loss settings.
    #[must_use]
    pub fn with_loss(mut self, loss: ClsLossConfig) -> Self {
        self.loss = loss;
        self
    }

    /// Check the config before building a head from it.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.num_classes == 0 || self.in_channels == 0 {
            return Err("num_classes and in_channels must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout_ratio) {
            return Err(format!("dropout_ratio must be in [0, 1), got {}", self.dropout_ratio));
        }
        self.loss.validate()
    }

    /// Initialize the head.
    pub fn init<B: Backend>(&self, device: &B::Device) -> I3DHead<B> {
        let fc = LinearConfig::new(self.in_channels, self.num_classes)
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: self.init_std,
            })
            .init(device);

        I3DHead {
            fc,
            dropout: DropoutConfig::new(self.dropout_ratio).init(),
            config: Ignored(self.clone()),
        }
    }
}

/// Dropout -> Linear, one score row per clip.
#[derive(Module, Debug)]
pub struct I3DHead<B: Backend> {
    fc: Linear<B>,
    dropout: Dropout,
    config: Ignored<I3DHeadConfig>,
}

impl<B: Backend> I3DHead<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `features` - Clip features of shape (clips, in_channels)
    /// * `mode` - Dropout is only applied in training mode
    ///
    /// # Returns
    ///
    /// Scores of shape (clips, num_classes)
    pub fn forward(&self, features: Tensor<B, 2>, mode: ForwardMode) -> Tensor<B, 2> {
        let x = dropout(&self.dropout, features, mode);
        self.fc.forward(x)
    }
}

impl<B: Backend> Head<B> for I3DHead<B> {
    // Clip-level head: segments are not merged here, recognizers average
    // clips at test time instead.
    fn forward(
        &self,
        features: Tensor<B, 2>,
        _num_segs: usize,
        mode: ForwardMode,
    ) -> Tensor<B, 2> {
        self.forward(features, mode)
    }

    fn loss(&self, cls_score: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> LossMap<B> {
        self.config.loss.compute(cls_score, labels)
    }

    fn init_weights(&mut self, device: &B::Device) {
        *self = self.config.init(device);
    }

    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn in_channels(&self) -> usize {
        self.config.in_channels
    }

    fn name(&self) -> &str {
        "I3DHead"
    }
}
