//! Loss functions and loss aggregation.
//!
//! Heads return a [`LossMap`]: named loss terms plus derived metrics.
//! [`parse_losses`] reduces it to the scalar used for back-propagation and the
//! values shown in training logs.

use std::collections::BTreeMap;

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use burn::tensor::ElementConversion;

/// Named loss terms and metrics returned by a training forward pass.
pub type LossMap<B> = BTreeMap<String, Tensor<B, 1>>;

/// Values suitable for display, keyed like the [`LossMap`] they came from.
pub type LogVars = BTreeMap<String, f32>;

/// Cross-entropy loss for classification.
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    /// Label smoothing factor in `[0, 1]`. None disables smoothing.
    pub smoothing: Option<f32>,
}

impl CrossEntropyLoss {
    /// Create a new cross-entropy loss.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable label smoothing.
    #[must_use]
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = Some(smoothing);
        self
    }

    /// Compute the loss.
    ///
    /// # Arguments
    ///
    /// * `logits` - Class scores of shape (batch, n_classes)
    /// * `targets` - Class indices of shape (batch,)
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let loss = CrossEntropyLossConfig::new()
            .with_smoothing(self.smoothing)
            .init(&logits.device());
        loss.forward(logits, targets)
    }
}

/// Aggregate a loss mapping.
///
/// Every entry is reduced to its mean. Entries whose name contains `"loss"`
/// are summed into the returned total; other entries are metrics and are
/// only logged. The total is also logged under `"loss"`.
///
/// A mapping without loss entries yields a zero total.
///
/// # Example
///
/// ```rust,ignore
/// let (loss, log_vars) = parse_losses(losses, &device);
/// loss.backward();
/// println!("loss_cls={:.4}", log_vars["loss_cls"]);
/// ```
pub fn parse_losses<B: Backend>(losses: LossMap<B>, device: &B::Device) -> (Tensor<B, 1>, LogVars) {
    let mut total = Tensor::<B, 1>::zeros([1], device);
    let mut log_vars = LogVars::new();

    for (name, value) in losses {
        let value = value.mean();
        if name.contains("loss") {
            total = total + value.clone();
        }
        log_vars.insert(name, value.into_scalar().elem::<f32>());
    }

    log_vars.insert("loss".to_string(), total.clone().into_scalar().elem::<f32>());
    (total, log_vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn scalar(values: &[f32]) -> Tensor<TestBackend, 1> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len()]),
            &Default::default(),
        )
    }

    #[test]
    fn test_parse_losses_sums_only_loss_terms() {
        let device = Default::default();
        let mut losses = LossMap::new();
        losses.insert("loss_cls".to_string(), scalar(&[1.0, 3.0]));
        losses.insert("loss_aux".to_string(), scalar(&[0.5]));
        losses.insert("top1_acc".to_string(), scalar(&[0.25]));

        let (total, log_vars) = parse_losses(losses, &device);

        let total: f32 = total.into_scalar().elem();
        assert!((total - 2.5).abs() < 1e-6);
        assert!((log_vars["loss_cls"] - 2.0).abs() < 1e-6);
        assert!((log_vars["loss_aux"] - 0.5).abs() < 1e-6);
        assert!((log_vars["top1_acc"] - 0.25).abs() < 1e-6);
        assert!((log_vars["loss"] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_losses_empty_mapping() {
        let device = Default::default();
        let (total, log_vars) = parse_losses::<TestBackend>(LossMap::new(), &device);

        assert_eq!(total.dims(), [1]);
        assert_eq!(log_vars.len(), 1);
        assert_eq!(log_vars["loss"], 0.0);
    }

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0, 3], &device);

        let loss: f32 = CrossEntropyLoss::new()
            .forward(logits, targets)
            .into_scalar()
            .elem();
        assert!((loss - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_cross_entropy_smoothing_builder() {
        let loss = CrossEntropyLoss::new().with_smoothing(0.1);
        assert_eq!(loss.smoothing, Some(0.1));
    }
}
