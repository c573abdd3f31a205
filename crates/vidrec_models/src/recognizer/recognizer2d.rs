//! 2D recognizer (TSN-style).
//!
//! Every clip of a sample is a segment: segments are scored by the head
//! independently and merged by its consensus, so both paths produce one row
//! per sample.

use burn::prelude::*;
use vidrec_core::RecognizerConfig;

use super::{flatten_clips, Recognizer, RecognizerCore};
use crate::error::Result;
use crate::head::Head;
use crate::losses::LossMap;
use crate::mode::ForwardMode;
use crate::registry::ComponentRegistry;

/// Segment-based recognizer over per-frame features.
#[derive(Module, Debug)]
pub struct Recognizer2D<B: Backend> {
    core: RecognizerCore<B>,
}

impl<B: Backend> Recognizer2D<B> {
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

    fn segment_scores(&self, imgs: Tensor<B, 6>, mode: ForwardMode) -> (Tensor<B, 2>, usize) {
        let (clips, batch, num_segs) = flatten_clips(imgs);
        let features = self.core.extract_feat(clips, mode);
        (self.core.cls_head().forward(features, num_segs, mode), batch)
    }
}

impl<B: Backend> Recognizer<B> for Recognizer2D<B> {
    fn core(&self) -> &RecognizerCore<B> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecognizerCore<B> {
        &mut self.core
    }

    fn name(&self) -> &str {
        "Recognizer2D"
    }

    fn forward_train(&self, imgs: Tensor<B, 6>, labels: Tensor<B, 1, Int>) -> Result<LossMap<B>> {
        let (cls_score, batch) = self.segment_scores(imgs, ForwardMode::Train);
        self.core.check_labels(batch, &labels)?;
        Ok(self.core.cls_head().loss(cls_score, labels))
    }

    fn forward_test(&self, imgs: Tensor<B, 6>) -> Result<Tensor<B, 2>> {
        let (cls_score, _) = self.segment_scores(imgs, ForwardMode::Inference);
        // Consensus already left a single row per sample
        Ok(self.core.average_clips_per_sample(cls_score, 1)?)
    }
}
