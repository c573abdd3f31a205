//! Clip batch type.

use burn::prelude::*;

use crate::error::{CoreError, Result};

/// A batch of video clips with optional class labels.
///
/// `imgs` follows the `(batch, clips, C, T, H, W)` convention:
/// - `batch`: number of samples
/// - `clips`: clips (or segments) sampled from each video
/// - `C`: channels
/// - `T`: frames per clip
/// - `H`, `W`: spatial size
///
/// Frame-level (2D) datasets use `T = 1`.
///
/// The batch is produced by an external data pipeline and is only read by
/// recognizers.
#[derive(Debug, Clone)]
pub struct ClipBatch<B: Backend> {
    /// Input clips.
    pub imgs: Tensor<B, 6>,

    /// Class indices, one per sample.
    pub label: Option<Tensor<B, 1, Int>>,
}

impl<B: Backend> ClipBatch<B> {
    /// Create an unlabeled batch.
    pub fn new(imgs: Tensor<B, 6>) -> Self {
        Self { imgs, label: None }
    }

    /// Create a batch with class-index labels.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if the label length differs from
    /// the batch size of `imgs`.
    pub fn with_label(imgs: Tensor<B, 6>, label: Tensor<B, 1, Int>) -> Result<Self> {
        let batch = imgs.dims()[0];
        let [n_labels] = label.dims();

        if batch != n_labels {
            return Err(CoreError::ShapeMismatch(format!(
                "imgs batch size {} != label batch size {}",
                batch, n_labels
            )));
        }

        Ok(Self {
            imgs,
            label: Some(label),
        })
    }

    /// Create a batch from one-hot labels of shape `(batch, num_classes)`.
    ///
    /// The labels are converted to class indices with an arg-max.
    pub fn with_one_hot_label(imgs: Tensor<B, 6>, one_hot: Tensor<B, 2>) -> Result<Self> {
        let [n_labels, _] = one_hot.dims();
        let label = one_hot.argmax(1).reshape([n_labels]);
        Self::with_label(imgs, label)
    }

    /// Number of samples in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.imgs.dims()[0]
    }

    /// Number of clips sampled per video.
    #[must_use]
    pub fn num_clips(&self) -> usize {
        self.imgs.dims()[1]
    }

    /// Get the device.
    pub fn device(&self) -> B::Device {
        self.imgs.device()
    }

    /// Move the batch to a device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            imgs: self.imgs.to_device(device),
            label: self.label.map(|label| label.to_device(device)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_dimensions() {
        let device = Default::default();
        let imgs = Tensor::<TestBackend, 6>::zeros([2, 3, 3, 4, 8, 8], &device);
        let batch = ClipBatch::new(imgs);

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.num_clips(), 3);
        assert!(batch.label.is_none());
    }

    #[test]
    fn test_batch_label_mismatch() {
        let device = Default::default();
        let imgs = Tensor::<TestBackend, 6>::zeros([2, 1, 3, 1, 4, 4], &device);
        let label = Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 2], &device);

        match ClipBatch::with_label(imgs, label) {
            Err(CoreError::ShapeMismatch(msg)) => assert!(msg.contains("2 != label batch size 3")),
            other => panic!("Expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_one_hot_label() {
        let device = Default::default();
        let imgs = Tensor::<TestBackend, 6>::zeros([2, 1, 3, 1, 4, 4], &device);
        let one_hot =
            Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]], &device);

        let batch = ClipBatch::with_one_hot_label(imgs, one_hot).unwrap();
        let label: Vec<i64> = batch
            .label
            .unwrap()
            .into_data()
            .iter::<i64>()
            .collect();
        assert_eq!(label, vec![2, 0]);
    }
}
