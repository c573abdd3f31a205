//! TSN head: linear classifier with segment consensus.
//!
//! Scores every segment of a sample independently and averages them, so a
//! 2D recognizer returns one row per video.

use burn::module::Ignored;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ClsLossConfig, Head};
use crate::losses::LossMap;
use crate::mode::{dropout, ForwardMode};

/// Configuration for the [`TSNHead`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TSNHeadConfig {
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

impl TSNHeadConfig {
    /// Create a new config.
    pub fn new(num_classes: usize, in_channels: usize) -> Self {
        Self {
            num_classes,
            in_channels,
            dropout_ratio: 0.4,
            init_std: 0.001,
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
    pub fn init<B: Backend>(&self, device: &B::Device) -> TSNHead<B> {
        let fc = LinearConfig::new(self.in_channels, self.num_classes)
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: self.init_std,
            })
            .init(device);

        TSNHead {
            fc,
            dropout: DropoutConfig::new(self.dropout_ratio).init(),
            config: Ignored(self.clone()),
        }
    }
}

/// Dropout -> Linear per segment, then mean over segments.
#[derive(Module, Debug)]
pub struct TSNHead<B: Backend> {
    fc: Linear<B>,
    dropout: Dropout,
    config: Ignored<TSNHeadConfig>,
}

impl<B: Backend> TSNHead<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `features` - Features of shape (batch * num_segs, in_channels)
    /// * `num_segs` - Segments per sample; must divide the number of rows
    /// * `mode` - Dropout is only applied in training mode
    ///
    /// # Returns
    ///
    /// Scores of shape (batch, num_classes)
    pub fn forward(
        &self,
        features: Tensor<B, 2>,
        num_segs: usize,
        mode: ForwardMode,
    ) -> Tensor<B, 2> {
        let [rows, _] = features.dims();
        let num_segs = num_segs.max(1);
        let batch = rows / num_segs;

        let x = dropout(&self.dropout, features, mode);
        let scores = self.fc.forward(x);

        // Segment consensus
        let n_classes = self.config.num_classes;
        scores
            .reshape([batch, num_segs, n_classes])
            .mean_dim(1)
            .reshape([batch, n_classes])
    }
}

impl<B: Backend> Head<B> for TSNHead<B> {
    fn forward(
        &self,
        features: Tensor<B, 2>,
        num_segs: usize,
        mode: ForwardMode,
    ) -> Tensor<B, 2> {
        self.forward(features, num_segs, mode)
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
        "TSNHead"
    }
}
