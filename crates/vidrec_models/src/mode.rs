//! Train / inference switch for layers whose behaviour depends on it.
//!
//! burn picks dropout and batch-norm behaviour from the backend: both run in
//! training mode on an autodiff backend. Recognizers choose the mode from the
//! call instead, so the inference path is deterministic and leaves running
//! statistics untouched on every backend.

use burn::nn::{BatchNorm, Dropout};
use burn::prelude::*;

/// Behaviour of a forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    /// Dropout active, batch statistics (on autodiff backends).
    Train,
    /// Dropout off, running statistics.
    #[default]
    Inference,
}

impl ForwardMode {
    /// Whether this is the training mode.
    #[must_use]
    pub fn is_train(self) -> bool {
        self == Self::Train
    }
}

/// Dropout in training mode, identity otherwise.
pub(crate) fn dropout<B: Backend, const D: usize>(
    dropout: &Dropout,
    x: Tensor<B, D>,
    mode: ForwardMode,
) -> Tensor<B, D> {
    match mode {
        ForwardMode::Train => dropout.forward(x),
        ForwardMode::Inference => x,
    }
}

/// Batch norm over dim 1.
///
/// Training defers to [`BatchNorm::forward`]. Inference normalizes with the
/// running statistics and does not update them.
pub(crate) fn batch_norm<B: Backend, const D: usize, const DI: usize>(
    bn: &BatchNorm<B, D>,
    x: Tensor<B, DI>,
    mode: ForwardMode,
) -> Tensor<B, DI> {
    if mode.is_train() {
        return bn.forward(x);
    }

    let mut shape = [1usize; DI];
    shape[1] = x.dims()[1];

    let mean = bn.running_mean.value().reshape(shape);
    let var = bn.running_var.value().reshape(shape);
    let gamma = bn.gamma.val().reshape(shape);
    let beta = bn.beta.val().reshape(shape);

    (x - mean) / var.add_scalar(bn.epsilon).sqrt() * gamma + beta
}
