//! Recognizer contract.
//!
//! A recognizer owns a [`Backbone`] and a [`Head`] built from a
//! [`RecognizerConfig`], and exposes the two entry points consumed by an
//! external training loop: [`Recognizer::train_step`] and
//! [`Recognizer::val_step`]. Concrete variants only supply
//! [`Recognizer::forward_train`] and [`Recognizer::forward_test`]; routing,
//! clip averaging and step packaging are shared.
//!
//! The mode of a call (training or inference) is chosen by its arguments
//! only. No mode flag is stored on the recognizer: the training path runs
//! dropout and batch statistics, the inference path never does, whatever the
//! backend.
//!
//! Recognizers are burn modules, so the optimizer of the training loop
//! updates them directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use burn::optim::{GradientsParams, Optimizer, SgdConfig};
//! use vidrec_models::{build_recognizer, default_registry};
//!
//! let config = RecognizerConfig::from_file("configs/recognizer2d_frame_cnn.json")?;
//! let registry = default_registry::<Autodiff<NdArray>>();
//! let mut recognizer = build_recognizer(&config, &registry, &device)?;
//! let mut optim = SgdConfig::new().init();
//!
//! let out = recognizer.train_step(&batch)?;
//! let grads = GradientsParams::from_grads(out.loss.backward(), &recognizer);
//! recognizer = optim.step(0.01, recognizer, grads);
//! ```

mod recognizer2d;
mod recognizer3d;

pub use recognizer2d::Recognizer2D;
pub use recognizer3d::Recognizer3D;

use burn::module::Ignored;
use burn::prelude::*;
use burn::tensor::activation::softmax;
use serde_json::Value;
use vidrec_core::{
    seed_from_train_cfg, AverageClips, ClipBatch, CoreError, RecognizerConfig, Seed,
    AVERAGE_CLIPS_KEY,
};

use crate::backbone::{Backbone, BackboneModel};
use crate::error::{RecognizerError, Result};
use crate::head::{Head, HeadModel};
use crate::losses::{parse_losses, LogVars, LossMap};
use crate::mode::ForwardMode;
use crate::registry::ComponentRegistry;

/// Names accepted in the `type` key of a [`RecognizerConfig`].
pub const RECOGNIZER_TYPES: &[&str] = &["Recognizer2D", "Recognizer3D"];

/// Result of [`Recognizer::forward`].
#[derive(Debug, Clone)]
pub enum ForwardOutput<B: Backend> {
    /// Training path: named loss terms and metrics.
    Losses(LossMap<B>),
    /// Inference path: class scores.
    Scores(Tensor<B, 2>),
}

impl<B: Backend> ForwardOutput<B> {
    /// Name of the branch that produced this output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Losses(_) => "losses",
            Self::Scores(_) => "scores",
        }
    }

    /// Take the loss mapping.
    pub fn into_losses(self) -> Result<LossMap<B>> {
        match self {
            Self::Losses(losses) => Ok(losses),
            other => Err(RecognizerError::UnexpectedOutput {
                expected: "losses",
                got: other.kind(),
            }),
        }
    }

    /// Take the class scores.
    pub fn into_scores(self) -> Result<Tensor<B, 2>> {
        match self {
            Self::Scores(scores) => Ok(scores),
            other => Err(RecognizerError::UnexpectedOutput {
                expected: "scores",
                got: other.kind(),
            }),
        }
    }
}

/// Output of [`Recognizer::train_step`], consumed by the optimizer loop.
#[derive(Debug, Clone)]
pub struct TrainStepOutput<B: Backend> {
    /// Sum of all loss terms, ready for `backward()`.
    pub loss: Tensor<B, 1>,
    /// Every loss term and metric, plus the total under `"loss"`.
    pub log_vars: LogVars,
    /// Number of samples in the batch.
    pub num_samples: usize,
}

/// Output of [`Recognizer::val_step`].
#[derive(Debug, Clone)]
pub struct ValStepOutput<B: Backend> {
    /// Class scores returned by the inference path.
    pub results: Tensor<B, 2>,
}

/// State shared by every recognizer variant: components and run configs.
///
/// The components are the module's parameters; the configs and the seed are
/// carried along untouched by optimizers and records.
#[derive(Module, Debug)]
pub struct RecognizerCore<B: Backend> {
    backbone: BackboneModel<B>,
    cls_head: HeadModel<B>,
    train_cfg: Ignored<Option<Value>>,
    test_cfg: Ignored<Option<Value>>,
    seed: Ignored<Seed>,
}

impl<B: Backend> RecognizerCore<B> {
    /// Build the backbone and the head, store the configs and initialize weights.
    ///
    /// # Errors
    ///
    /// - [`RecognizerError::Registry`] when a component `type` is unknown or
    ///   its arguments are invalid.
    /// - [`RecognizerError::Core`] when the head does not accept the backbone
    ///   feature width, or `train_cfg.seed` is not an unsigned integer.
    pub fn new(
        config: &RecognizerConfig,
        registry: &ComponentRegistry<B>,
        device: &B::Device,
    ) -> Result<Self> {
        let backbone = registry.build_backbone(&config.backbone, device)?;
        let cls_head = registry.build_head(&config.cls_head, device)?;

        if backbone.out_channels() != cls_head.in_channels() {
            return Err(CoreError::InvalidConfig(format!(
                "cls_head.in_channels {} != {} output channels {}",
                cls_head.in_channels(),
                backbone.name(),
                backbone.out_channels()
            ))
            .into());
        }

        let seed = seed_from_train_cfg(config.train_cfg.as_ref())?;

        if let Some(test_cfg) = &config.test_cfg {
            if test_cfg.get(AVERAGE_CLIPS_KEY).is_none() {
                tracing::warn!(
                    "test_cfg has no '{}' key, clip averaging will fail",
                    AVERAGE_CLIPS_KEY
                );
            }
        }

        let mut core = Self {
            backbone,
            cls_head,
            train_cfg: Ignored(config.train_cfg.clone()),
            test_cfg: Ignored(config.test_cfg.clone()),
            seed: Ignored(seed),
        };
        core.init_weights();

        tracing::info!(
            "Built {} with backbone {} ({} params) and head {} ({} params, {} classes)",
            config.kind,
            core.backbone.name(),
            core.backbone.num_params(),
            core.cls_head.name(),
            core.cls_head.num_params(),
            core.cls_head.num_classes()
        );

        Ok(core)
    }

    /// Re-initialize the backbone, then the head.
    ///
    /// Each component draws from its own stream derived from the seed, so
    /// repeated calls produce identical parameters.
    pub fn init_weights(&mut self) {
        let device = self.device();
        let seed = self.seed.0;

        B::seed(seed.derive("backbone").value());
        self.backbone.init_weights(&device);

        B::seed(seed.derive("cls_head").value());
        self.cls_head.init_weights(&device);

        tracing::debug!("Initialized weights with seed {}", seed.value());
    }

    /// Backbone features for clips of shape (clips, C, T, H, W).
    pub fn extract_feat(&self, imgs: Tensor<B, 5>, mode: ForwardMode) -> Tensor<B, 2> {
        self.backbone.forward(imgs, mode)
    }

    /// Average the scores of the clips of one sample.
    ///
    /// `cls_score` has shape (num_clips, num_classes). With the `score`
    /// policy the raw scores are averaged; with `prob` each row goes through
    /// a softmax first. Both return shape (1, num_classes). A `null` policy
    /// returns the scores unchanged.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingConfigKey`] if `test_cfg` has no `average_clips`.
    /// - [`CoreError::UnsupportedAverageClips`] for any other policy value.
    pub fn average_clip(&self, cls_score: Tensor<B, 2>) -> vidrec_core::Result<Tensor<B, 2>> {
        let scores = match AverageClips::from_test_cfg(self.test_cfg.0.as_ref())? {
            Some(AverageClips::Prob) => softmax(cls_score, 1).mean_dim(0),
            Some(AverageClips::Score) => cls_score.mean_dim(0),
            None => cls_score,
        };
        Ok(scores)
    }

    /// Apply [`RecognizerCore::average_clip`] to each sample of a batch.
    ///
    /// `cls_score` has shape (batch * num_clips, num_classes) with the clips
    /// of a sample on consecutive rows. With aggregation the result has one
    /// row per sample; without it the scores are returned unchanged.
    pub fn average_clips_per_sample(
        &self,
        cls_score: Tensor<B, 2>,
        num_clips: usize,
    ) -> vidrec_core::Result<Tensor<B, 2>> {
        let policy = AverageClips::from_test_cfg(self.test_cfg.0.as_ref())?;
        let [rows, n_classes] = cls_score.dims();

        if num_clips == 0 || rows % num_clips != 0 {
            return Err(CoreError::ShapeMismatch(format!(
                "{} score rows cannot be split into groups of {} clips",
                rows, num_clips
            )));
        }

        let Some(policy) = policy else {
            return Ok(cls_score);
        };

        let batch = rows / num_clips;
        let per_sample = cls_score.reshape([batch, num_clips, n_classes]);
        let per_sample = match policy {
            AverageClips::Prob => softmax(per_sample, 2),
            AverageClips::Score => per_sample,
        };
        Ok(per_sample.mean_dim(1).reshape([batch, n_classes]))
    }

    /// The backbone.
    pub fn backbone(&self) -> &BackboneModel<B> {
        &self.backbone
    }

    /// The classification head.
    pub fn cls_head(&self) -> &HeadModel<B> {
        &self.cls_head
    }

    /// Training config as supplied.
    pub fn train_cfg(&self) -> Option<&Value> {
        self.train_cfg.0.as_ref()
    }

    /// Test config as supplied.
    pub fn test_cfg(&self) -> Option<&Value> {
        self.test_cfg.0.as_ref()
    }

    /// Seed used by [`RecognizerCore::init_weights`].
    pub fn seed(&self) -> Seed {
        self.seed.0
    }

    /// Device the parameters live on.
    pub fn device(&self) -> B::Device {
        self.cls_head.devices().into_iter().next().unwrap_or_default()
    }

    pub(crate) fn check_labels(
        &self,
        batch: usize,
        labels: &Tensor<B, 1, Int>,
    ) -> vidrec_core::Result<()> {
        let [n_labels] = labels.dims();
        if n_labels != batch {
            return Err(CoreError::ShapeMismatch(format!(
                "imgs batch size {} != label batch size {}",
                batch, n_labels
            )));
        }
        Ok(())
    }
}

/// Merge the batch and clip dimensions: (N, K, C, T, H, W) -> (N * K, C, T, H, W).
///
/// Returns the flattened clips with `N` and `K`.
pub(crate) fn flatten_clips<B: Backend>(imgs: Tensor<B, 6>) -> (Tensor<B, 5>, usize, usize) {
    let [batch, clips, c, t, h, w] = imgs.dims();
    (imgs.reshape([batch * clips, c, t, h, w]), batch, clips)
}

/// Contract implemented by every recognizer variant.
///
/// Variants supply [`Recognizer::forward_train`] and
/// [`Recognizer::forward_test`]; every other method is shared.
pub trait Recognizer<B: Backend> {
    /// Shared state.
    fn core(&self) -> &RecognizerCore<B>;

    /// Shared state, mutably.
    fn core_mut(&mut self) -> &mut RecognizerCore<B>;

    /// Registered variant name.
    fn name(&self) -> &str;

    /// Training forward pass.
    ///
    /// `imgs` has shape (batch, clips, C, T, H, W) and `labels` shape (batch,).
    fn forward_train(&self, imgs: Tensor<B, 6>, labels: Tensor<B, 1, Int>)
        -> Result<LossMap<B>>;

    /// Inference forward pass returning class scores.
    fn forward_test(&self, imgs: Tensor<B, 6>) -> Result<Tensor<B, 2>>;

    /// See [`RecognizerCore::init_weights`].
    fn init_weights(&mut self) {
        self.core_mut().init_weights();
    }

    /// Inference features, see [`RecognizerCore::extract_feat`].
    fn extract_feat(&self, imgs: Tensor<B, 5>) -> Tensor<B, 2> {
        self.core().extract_feat(imgs, ForwardMode::Inference)
    }

    /// See [`RecognizerCore::average_clip`].
    fn average_clip(&self, cls_score: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        Ok(self.core().average_clip(cls_score)?)
    }

    /// Route a forward call.
    ///
    /// With `return_loss` the label is required and the training path runs;
    /// otherwise the inference path runs and `label` is ignored.
    ///
    /// # Errors
    ///
    /// [`RecognizerError::MissingLabel`] when `return_loss` is set without a label.
    fn forward(
        &self,
        imgs: Tensor<B, 6>,
        label: Option<Tensor<B, 1, Int>>,
        return_loss: bool,
    ) -> Result<ForwardOutput<B>> {
        if return_loss {
            let label = label.ok_or(RecognizerError::MissingLabel)?;
            Ok(ForwardOutput::Losses(self.forward_train(imgs, label)?))
        } else {
            Ok(ForwardOutput::Scores(self.forward_test(imgs)?))
        }
    }

    /// One training step: forward with loss, then loss aggregation.
    ///
    /// The optimizer step itself belongs to the caller.
    fn train_step(&self, batch: &ClipBatch<B>) -> Result<TrainStepOutput<B>> {
        let imgs = batch.imgs.clone();
        let label = batch.label.clone();

        let losses = self.forward(imgs, label, true)?.into_losses()?;
        let (loss, log_vars) = parse_losses(losses, &self.core().device());

        let num_samples = batch.batch_size();
        tracing::debug!(
            "{} train step: {} samples, loss={:.4}",
            self.name(),
            num_samples,
            log_vars.get("loss").copied().unwrap_or_default()
        );

        Ok(TrainStepOutput {
            loss,
            log_vars,
            num_samples,
        })
    }

    /// One validation step: inference forward only.
    ///
    /// Leaves batch-norm running statistics untouched, so repeated calls on
    /// the same batch return the same scores.
    fn val_step(&self, batch: &ClipBatch<B>) -> Result<ValStepOutput<B>> {
        let results = self
            .forward(batch.imgs.clone(), None, false)?
            .into_scores()?;
        Ok(ValStepOutput { results })
    }
}

/// Any of the built-in recognizer variants.
#[derive(Module, Debug)]
pub enum RecognizerModel<B: Backend> {
    /// Segment-based recognizer.
    Recognizer2D(Recognizer2D<B>),
    /// Clip-level recognizer.
    Recognizer3D(Recognizer3D<B>),
}

impl<B: Backend> From<Recognizer2D<B>> for RecognizerModel<B> {
    fn from(model: Recognizer2D<B>) -> Self {
        Self::Recognizer2D(model)
    }
}

impl<B: Backend> From<Recognizer3D<B>> for RecognizerModel<B> {
    fn from(model: Recognizer3D<B>) -> Self {
        Self::Recognizer3D(model)
    }
}

impl<B: Backend> Recognizer<B> for RecognizerModel<B> {
    fn core(&self) -> &RecognizerCore<B> {
        match self {
            Self::Recognizer2D(model) => model.core(),
            Self::Recognizer3D(model) => model.core(),
        }
    }

    fn core_mut(&mut self) -> &mut RecognizerCore<B> {
        match self {
            Self::Recognizer2D(model) => model.core_mut(),
            Self::Recognizer3D(model) => model.core_mut(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Recognizer2D(model) => model.name(),
            Self::Recognizer3D(model) => model.name(),
        }
    }

    fn forward_train(&self, imgs: Tensor<B, 6>, labels: Tensor<B, 1, Int>) -> Result<LossMap<B>> {
        match self {
            Self::Recognizer2D(model) => model.forward_train(imgs, labels),
            Self::Recognizer3D(model) => model.forward_train(imgs, labels),
        }
    }

    fn forward_test(&self, imgs: Tensor<B, 6>) -> Result<Tensor<B, 2>> {
        match self {
            Self::Recognizer2D(model) => model.forward_test(imgs),
            Self::Recognizer3D(model) => model.forward_test(imgs),
        }
    }
}

/// Build the recognizer variant named by `config.kind`.
///
/// # Errors
///
/// [`RecognizerError::UnknownRecognizer`] for names outside
/// [`RECOGNIZER_TYPES`], plus any construction error of the variant.
pub fn build_recognizer<B: Backend>(
    config: &RecognizerConfig,
    registry: &ComponentRegistry<B>,
    device: &B::Device,
) -> Result<RecognizerModel<B>> {
    match config.kind.as_str() {
        "Recognizer2D" => Ok(Recognizer2D::new(config, registry, device)?.into()),
        "Recognizer3D" => Ok(Recognizer3D::new(config, registry, device)?.into()),
        other => Err(RecognizerError::UnknownRecognizer(
            other.to_string(),
            RECOGNIZER_TYPES,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{default_registry, RegistryError};
    use burn::tensor::{Distribution, ElementConversion};
    use burn_ndarray::NdArray;
    use serde_json::json;
    use std::cell::Cell;

    type TestBackend = NdArray;

    fn base_config(test_cfg: Option<Value>) -> RecognizerConfig {
        let config = RecognizerConfig::new(
            "Recognizer2D",
            json!({ "type": "FrameCNN", "channels": [4] }),
            json!({ "type": "TSNHead", "num_classes": 3, "in_channels": 4 }),
        );
        match test_cfg {
            Some(test_cfg) => config.with_test_cfg(test_cfg),
            None => config,
        }
    }

    fn core_with(test_cfg: Option<Value>) -> RecognizerCore<TestBackend> {
        let registry = default_registry::<TestBackend>();
        RecognizerCore::new(&base_config(test_cfg), &registry, &Default::default()).unwrap()
    }

    fn to_vec(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    /// Variant recording which forward path ran.
    #[derive(Debug)]
    struct CountingRecognizer {
        core: RecognizerCore<TestBackend>,
        train_calls: Cell<usize>,
        test_calls: Cell<usize>,
    }

    impl CountingRecognizer {
        fn new() -> Self {
            Self {
                core: core_with(Some(json!({ "average_clips": "score" }))),
                train_calls: Cell::new(0),
                test_calls: Cell::new(0),
            }
        }
    }

    impl Recognizer<TestBackend> for CountingRecognizer {
        fn core(&self) -> &RecognizerCore<TestBackend> {
            &self.core
        }

        fn core_mut(&mut self) -> &mut RecognizerCore<TestBackend> {
            &mut self.core
        }

        fn name(&self) -> &str {
            "CountingRecognizer"
        }

        fn forward_train(
            &self,
            imgs: Tensor<TestBackend, 6>,
            _labels: Tensor<TestBackend, 1, Int>,
        ) -> Result<LossMap<TestBackend>> {
            self.train_calls.set(self.train_calls.get() + 1);
            let device = imgs.device();
            let mut losses = LossMap::new();
            losses.insert("loss_cls".to_string(), Tensor::from_floats([1.5], &device));
            losses.insert("top1_acc".to_string(), Tensor::from_floats([0.5], &device));
            Ok(losses)
        }

        fn forward_test(&self, imgs: Tensor<TestBackend, 6>) -> Result<Tensor<TestBackend, 2>> {
            self.test_calls.set(self.test_calls.get() + 1);
            Ok(Tensor::zeros([imgs.dims()[0], 3], &imgs.device()))
        }
    }

    fn imgs(batch: usize) -> Tensor<TestBackend, 6> {
        Tensor::zeros([batch, 1, 3, 1, 4, 4], &Default::default())
    }

    fn labels(values: &[i64]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len()]),
            &Default::default(),
        )
    }

    #[test]
    fn test_average_clip_score() {
        let core = core_with(Some(json!({ "average_clips": "score" })));
        let scores =
            Tensor::<TestBackend, 2>::from_floats([[1.0, 3.0], [3.0, 1.0]], &Default::default());

        let averaged = core.average_clip(scores).unwrap();
        assert_eq!(averaged.dims(), [1, 2]);
        assert_close(&to_vec(averaged), &[2.0, 2.0]);
    }

    #[test]
    fn test_average_clip_prob() {
        let core = core_with(Some(json!({ "average_clips": "prob" })));
        let scores = Tensor::<TestBackend, 2>::zeros([2, 2], &Default::default());

        let averaged = core.average_clip(scores).unwrap();
        assert_eq!(averaged.dims(), [1, 2]);
        assert_close(&to_vec(averaged), &[0.5, 0.5]);
    }

    #[test]
    fn test_average_clip_prob_is_mean_of_softmax_rows() {
        let core = core_with(Some(json!({ "average_clips": "prob" })));
        let scores = Tensor::<TestBackend, 2>::random(
            [5, 4],
            Distribution::Normal(0.0, 3.0),
            &Default::default(),
        );

        let probs = softmax(scores.clone(), 1);
        let row_sums = to_vec(probs.clone().sum_dim(1));
        assert_close(&row_sums, &[1.0; 5]);

        let expected = to_vec(probs.mean_dim(0));
        let averaged = core.average_clip(scores).unwrap();
        assert_eq!(averaged.dims(), [1, 4]);
        assert_close(&to_vec(averaged), &expected);
    }

    #[test]
    fn test_average_clip_null_is_identity() {
        let core = core_with(Some(json!({ "average_clips": null })));
        let scores =
            Tensor::<TestBackend, 2>::from_floats([[1.0, -2.0], [0.5, 4.0]], &Default::default());

        let averaged = core.average_clip(scores.clone()).unwrap();
        assert_eq!(averaged.dims(), [2, 2]);
        assert_close(&to_vec(averaged), &to_vec(scores));
    }

    #[test]
    fn test_average_clip_missing_key() {
        // Construction and init_weights succeed with an empty test_cfg
        let core = core_with(Some(json!({})));
        let scores = Tensor::<TestBackend, 2>::ones([2, 3], &Default::default());

        match core.average_clip(scores) {
            Err(CoreError::MissingConfigKey { key, .. }) => assert_eq!(key, "average_clips"),
            other => panic!("Expected MissingConfigKey, got {:?}", other.map(|t| t.dims())),
        }

        let core = core_with(None);
        let scores = Tensor::<TestBackend, 2>::ones([2, 3], &Default::default());
        assert!(matches!(
            core.average_clip(scores),
            Err(CoreError::MissingConfigKey { .. })
        ));
    }

    #[test]
    fn test_average_clip_unsupported_value() {
        let core = core_with(Some(json!({ "average_clips": "median" })));
        let scores = Tensor::<TestBackend, 2>::ones([2, 3], &Default::default());

        let err = core.average_clip(scores).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAverageClips(_)));
        assert!(err.to_string().contains("median"));
    }

    #[test]
    fn test_average_clips_per_sample_matches_average_clip() {
        for policy in ["score", "prob"] {
            let core = core_with(Some(json!({ "average_clips": policy })));
            let scores = Tensor::<TestBackend, 2>::random(
                [6, 3],
                Distribution::Normal(0.0, 1.0),
                &Default::default(),
            );

            let batched = core.average_clips_per_sample(scores.clone(), 3).unwrap();
            assert_eq!(batched.dims(), [2, 3]);

            let first = core.average_clip(scores.clone().slice([0..3])).unwrap();
            let second = core.average_clip(scores.slice([3..6])).unwrap();
            let expected = to_vec(Tensor::cat(vec![first, second], 0));
            assert_close(&to_vec(batched), &expected);
        }
    }

    #[test]
    fn test_average_clips_per_sample_without_policy() {
        let core = core_with(Some(json!({ "average_clips": null })));
        let scores = Tensor::<TestBackend, 2>::ones([6, 3], &Default::default());

        assert_eq!(core.average_clips_per_sample(scores.clone(), 3).unwrap().dims(), [6, 3]);
        assert!(matches!(
            core.average_clips_per_sample(scores, 4),
            Err(CoreError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_forward_requires_label_for_loss() {
        let recognizer = CountingRecognizer::new();

        let result = recognizer.forward(imgs(2), None, true);
        assert!(matches!(result, Err(RecognizerError::MissingLabel)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Label should not be None."
        );
        assert_eq!(recognizer.train_calls.get(), 0);
        assert_eq!(recognizer.test_calls.get(), 0);
    }

    #[test]
    fn test_forward_routes_to_train_path() {
        let recognizer = CountingRecognizer::new();

        let out = recognizer.forward(imgs(2), Some(labels(&[0, 1])), true).unwrap();
        assert_eq!(out.kind(), "losses");
        assert_eq!(recognizer.train_calls.get(), 1);
        assert_eq!(recognizer.test_calls.get(), 0);
    }

    #[test]
    fn test_forward_routes_to_test_path() {
        let recognizer = CountingRecognizer::new();

        // A label passed to the inference path is ignored
        let out = recognizer.forward(imgs(2), Some(labels(&[0, 1])), false).unwrap();
        assert_eq!(out.into_scores().unwrap().dims(), [2, 3]);
        assert_eq!(recognizer.train_calls.get(), 0);
        assert_eq!(recognizer.test_calls.get(), 1);
    }

    #[test]
    fn test_train_step_packages_outputs() {
        let recognizer = CountingRecognizer::new();
        let batch = ClipBatch::with_label(imgs(4), labels(&[0, 1, 2, 0])).unwrap();

        let out = recognizer.train_step(&batch).unwrap();
        assert_eq!(out.num_samples, 4);
        assert!((out.log_vars["loss"] - 1.5).abs() < 1e-6);
        assert!((out.log_vars["loss_cls"] - 1.5).abs() < 1e-6);
        assert!((out.log_vars["top1_acc"] - 0.5).abs() < 1e-6);

        let loss: f32 = out.loss.into_scalar().elem();
        assert!((loss - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_train_step_without_label() {
        let recognizer = CountingRecognizer::new();
        let batch = ClipBatch::new(imgs(2));

        assert!(matches!(
            recognizer.train_step(&batch),
            Err(RecognizerError::MissingLabel)
        ));
    }

    #[test]
    fn test_val_step_uses_inference_path() {
        let recognizer = CountingRecognizer::new();
        let batch = ClipBatch::with_label(imgs(3), labels(&[0, 1, 2])).unwrap();

        let out = recognizer.val_step(&batch).unwrap();
        assert_eq!(out.results.dims(), [3, 3]);
        assert_eq!(recognizer.train_calls.get(), 0);
        assert_eq!(recognizer.test_calls.get(), 1);
    }

    #[test]
    fn test_forward_output_accessors() {
        let out = ForwardOutput::<TestBackend>::Losses(LossMap::new());
        assert!(matches!(
            out.into_scores(),
            Err(RecognizerError::UnexpectedOutput {
                expected: "scores",
                got: "losses"
            })
        ));
    }

    #[test]
    fn test_unknown_backbone_fails_construction() {
        let registry = default_registry::<TestBackend>();
        let config = RecognizerConfig::new(
            "Recognizer2D",
            json!({ "type": "ResNet50" }),
            json!({ "type": "TSNHead", "num_classes": 3, "in_channels": 4 }),
        );

        let result = RecognizerCore::new(&config, &registry, &Default::default());
        assert!(matches!(
            result,
            Err(RecognizerError::Registry(RegistryError::UnknownVariant { .. }))
        ));
    }

    #[test]
    fn test_channel_mismatch_fails_construction() {
        let registry = default_registry::<TestBackend>();
        let config = RecognizerConfig::new(
            "Recognizer2D",
            json!({ "type": "FrameCNN", "channels": [8] }),
            json!({ "type": "TSNHead", "num_classes": 3, "in_channels": 4 }),
        );

        let result = RecognizerCore::new(&config, &registry, &Default::default());
        assert!(matches!(
            result,
            Err(RecognizerError::Core(CoreError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_core_parameters_are_the_components() {
        let core = core_with(None);
        assert_eq!(
            core.num_params(),
            core.backbone().num_params() + core.cls_head().num_params()
        );
        let device: <TestBackend as Backend>::Device = Default::default();
        assert_eq!(core.device(), device);
    }

    #[test]
    fn test_build_recognizer_variants() {
        let registry = default_registry::<TestBackend>();
        let recognizer = build_recognizer(&base_config(None), &registry, &Default::default())
            .unwrap();
        assert!(matches!(recognizer, RecognizerModel::Recognizer2D(_)));
        assert_eq!(recognizer.name(), "Recognizer2D");

        let mut config = base_config(None);
        config.kind = "Recognizer3D".to_string();
        let recognizer = build_recognizer(&config, &registry, &Default::default()).unwrap();
        assert!(matches!(recognizer, RecognizerModel::Recognizer3D(_)));
    }

    #[test]
    fn test_build_recognizer_unknown_type() {
        let registry = default_registry::<TestBackend>();
        let mut config = base_config(None);
        config.kind = "RecognizerGCN".to_string();

        match build_recognizer(&config, &registry, &Default::default()) {
            Err(RecognizerError::UnknownRecognizer(name, available)) => {
                assert_eq!(name, "RecognizerGCN");
                assert_eq!(available, RECOGNIZER_TYPES);
            }
            Err(other) => panic!("Expected UnknownRecognizer, got {:?}", other),
            Ok(_) => panic!("Expected UnknownRecognizer"),
        }
    }
}
