//! 3D recognizer.
//!
//! Each clip is classified on its own. Training supervises every clip with
//! the label of its sample; inference merges the clips of a sample with the
//! `average_clips` policy.

use burn::prelude::*;
use vidrec_core::RecognizerConfig;

use super::{flatten_clips, Recognizer, RecognizerCore};
use crate::error::Result;
use crate::head::Head;
use crate::losses::LossMap;
use crate::mode::ForwardMode;
use crate::registry::ComponentRegistry;

/// Clip-level recognizer over spatio-temporal features.
#[derive(Module, Debug)]
pub struct Recognizer3D<B: Backend> {
    core: RecognizerCore<B>,
}

impl<B: Backend> Recognizer3D<B> {
    /// Build from a config through the given registry.
    pub fn new(
        config: &RecognizerConfig,
        registry: &ComponentRegistry<B>,
        device: &B::Device,
    ) -> Result<Self> {
        Ok(Self {
            core: RecognizerCore::new(config, registry, device)?,
        })
    }

    /// Scores of shape (N * K, classes) with the shape (N, K).
    fn clip_scores(&self, imgs: Tensor<B, 6>, mode: ForwardMode) -> (Tensor<B, 2>, usize, usize) {
        let (clips, batch, num_clips) = flatten_clips(imgs);
        let features = self.core.extract_feat(clips, mode);
        (self.core.cls_head().forward(features, 1, mode), batch, num_clips)
    }
}

/// Repeat each label once per clip: (N,) -> (N * K,).
fn repeat_per_clip<B: Backend>(labels: Tensor<B, 1, Int>, num_clips: usize) -> Tensor<B, 1, Int> {
    let [batch] = labels.dims();
    labels
        .reshape([batch, 1])
        .repeat_dim(1, num_clips)
        .reshape([batch * num_clips])
}

impl<B: Backend> Recognizer<B> for Recognizer3D<B> {
    fn core(&self) -> &RecognizerCore<B> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecognizerCore<B> {
        &mut self.core
    }

    fn name(&self) -> &str {
        "Recognizer3D"
    }

    fn forward_train(&self, imgs: Tensor<B, 6>, labels: Tensor<B, 1, Int>) -> Result<LossMap<B>> {
        let (cls_score, batch, num_clips) = self.clip_scores(imgs, ForwardMode::Train);
        self.core.check_labels(batch, &labels)?;

        let labels = repeat_per_clip(labels, num_clips);
        Ok(self.core.cls_head().loss(cls_score, labels))
    }

    fn forward_test(&self, imgs: Tensor<B, 6>) -> Result<Tensor<B, 2>> {
        let (cls_score, _, num_clips) = self.clip_scores(imgs, ForwardMode::Inference);
        Ok(self.core.average_clips_per_sample(cls_score, num_clips)?)
    }
}
