//! Classification heads.

mod i3d_head;
mod tsn_head;

pub use i3d_head::{I3DHead, I3DHeadConfig};
pub use tsn_head::{TSNHead, TSNHeadConfig};

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::losses::{CrossEntropyLoss, LossMap};
use crate::metrics::top_k_accuracy;
use crate::mode::ForwardMode;

/// Capability every classification head provides to a recognizer.
pub trait Head<B: Backend>: Module<B> {
    /// Class scores from backbone features.
    ///
    /// # Arguments
    ///
    /// * `features` - Features of shape (batch * num_segs, in_channels)
    /// * `num_segs` - Number of segments per sample
    /// * `mode` - Dropout is only applied in training mode
    ///
    /// # Returns
    ///
    /// Raw (pre-softmax) scores. Shape depends on the head: one row per
    /// sample for segment-consensus heads, one row per clip otherwise.
    fn forward(&self, features: Tensor<B, 2>, num_segs: usize, mode: ForwardMode)
        -> Tensor<B, 2>;

    /// Training losses and metrics for scores produced by [`Head::forward`].
    fn loss(&self, cls_score: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> LossMap<B>;

    /// Re-create all parameters from the head config.
    fn init_weights(&mut self, device: &B::Device);

    /// Number of classes scored by the head.
    fn num_classes(&self) -> usize;

    /// Expected feature width.
    fn in_channels(&self) -> usize;

    /// Registered name of the head.
    fn name(&self) -> &str;
}

/// Any of the built-in classification heads.
#[derive(Module, Debug)]
pub enum HeadModel<B: Backend> {
    /// Segment-consensus head.
    TSNHead(TSNHead<B>),
    /// Clip-level head.
    I3DHead(I3DHead<B>),
}

impl<B: Backend> From<TSNHead<B>> for HeadModel<B> {
    fn from(head: TSNHead<B>) -> Self {
        Self::TSNHead(head)
    }
}

impl<B: Backend> From<I3DHead<B>> for HeadModel<B> {
    fn from(head: I3DHead<B>) -> Self {
        Self::I3DHead(head)
    }
}

impl<B: Backend> Head<B> for HeadModel<B> {
    fn forward(
        &self,
        features: Tensor<B, 2>,
        num_segs: usize,
        mode: ForwardMode,
    ) -> Tensor<B, 2> {
        match self {
            Self::TSNHead(head) => Head::forward(head, features, num_segs, mode),
            Self::I3DHead(head) => Head::forward(head, features, num_segs, mode),
        }
    }

    fn loss(&self, cls_score: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> LossMap<B> {
        match self {
            Self::TSNHead(head) => head.loss(cls_score, labels),
            Self::I3DHead(head) => head.loss(cls_score, labels),
        }
    }

    fn init_weights(&mut self, device: &B::Device) {
        match self {
            Self::TSNHead(head) => head.init_weights(device),
            Self::I3DHead(head) => head.init_weights(device),
        }
    }

    fn num_classes(&self) -> usize {
        match self {
            Self::TSNHead(head) => head.num_classes(),
            Self::I3DHead(head) => head.num_classes(),
        }
    }

    fn in_channels(&self) -> usize {
        match self {
            Self::TSNHead(head) => head.in_channels(),
            Self::I3DHead(head) => head.in_channels(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::TSNHead(head) => head.name(),
            Self::I3DHead(head) => head.name(),
        }
    }
}

/// Loss settings shared by the classification heads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClsLossConfig {
    /// Multiplier applied to `loss_cls`.
    pub loss_weight: f32,
    /// Optional label smoothing for the cross entropy.
    pub label_smoothing: Option<f32>,
    /// Ranks reported as `top{k}_acc` metrics.
    pub topk: Vec<usize>,
}

impl Default for ClsLossConfig {
    fn default() -> Self {
        Self {
            loss_weight: 1.0,
            label_smoothing: None,
            topk: vec![1, 5],
        }
    }
}

impl ClsLossConfig {
    /// Compute `loss_cls` and the `top{k}_acc` metrics.
    pub fn compute<B: Backend>(
        &self,
        cls_score: Tensor<B, 2>,
        labels: Tensor<B, 1, Int>,
    ) -> LossMap<B> {
        let device = cls_score.device();
        let mut losses = LossMap::new();

        for &k in &self.topk {
            let acc = top_k_accuracy(cls_score.clone(), labels.clone(), k);
            losses.insert(
                format!("top{}_acc", k),
                Tensor::<B, 1>::from_floats([acc], &device),
            );
        }

        let criterion = CrossEntropyLoss {
            smoothing: self.label_smoothing,
        };
        let loss_cls = criterion.forward(cls_score, labels) * self.loss_weight;
        losses.insert("loss_cls".to_string(), loss_cls);

        losses
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if let Some(smoothing) = self.label_smoothing {
            if !(0.0..=1.0).contains(&smoothing) {
                return Err(format!("label_smoothing must be in [0, 1], got {}", smoothing));
            }
        }
        if self.topk.contains(&0) {
            return Err("topk entries must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::ElementConversion;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_cls_loss_keys() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 2>::from_floats([[2.0, 0.0], [0.0, 2.0]], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 0], &device);

        let losses = ClsLossConfig::default().compute(scores, labels);
        let keys: Vec<&str> = losses.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["loss_cls", "top1_acc", "top5_acc"]);

        let top1: f32 = losses["top1_acc"].clone().into_scalar().elem();
        let top5: f32 = losses["top5_acc"].clone().into_scalar().elem();
        assert!((top1 - 0.5).abs() < 1e-6);
        assert!((top5 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cls_loss_weight_scales_loss() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 2], &device);

        let config = ClsLossConfig {
            loss_weight: 2.0,
            ..Default::default()
        };
        let loss: f32 = config.compute(scores, labels)["loss_cls"]
            .clone()
            .into_scalar()
            .elem();
        assert!((loss - 2.0 * 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_head_model_dispatch() {
        let device = Default::default();
        let head: HeadModel<TestBackend> = TSNHeadConfig::new(4, 8).init(&device).into();

        assert_eq!(head.name(), "TSNHead");
        assert_eq!(head.num_classes(), 4);
        assert_eq!(head.in_channels(), 8);
        assert_eq!(head.num_params(), 8 * 4 + 4);

        let features = Tensor::<TestBackend, 2>::ones([6, 8], &device);
        let scores = head.forward(features, 3, ForwardMode::Inference);
        assert_eq!(scores.dims(), [2, 4]);
    }

    #[test]
    fn test_cls_loss_validate() {
        assert!(ClsLossConfig::default().validate().is_ok());
        let bad = ClsLossConfig {
            label_smoothing: Some(1.5),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
