//! Integration tests for the recognizer train/val steps.
//!
//! These tests run the shipped configs end to end on synthetic clips.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;

use vidrec_core::{ClipBatch, RecognizerConfig};
use vidrec_models::{build_recognizer, default_registry, Recognizer};

type TrainBackend = Autodiff<NdArray>;
type InferBackend = NdArray;

const CONFIGS: [&str; 2] = ["recognizer2d_frame_cnn.json", "recognizer3d_r2plus1d.json"];

fn config_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs")
        .join(name)
}

/// Create a synthetic batch with class-dependent brightness.
fn create_synthetic_batch<B: Backend>(
    batch_size: usize,
    clips: usize,
    frames: usize,
    size: usize,
    n_classes: usize,
    device: &B::Device,
) -> ClipBatch<B> {
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let per_sample = clips * 3 * frames * size * size;

    let mut x_data = Vec::with_capacity(batch_size * per_sample);
    let mut y_data = Vec::with_capacity(batch_size);
    for i in 0..batch_size {
        let class = i % n_classes;
        y_data.push(class as i64);
        for _ in 0..per_sample {
            x_data.push(class as f32 * 0.2 + rng.gen::<f32>() * 0.1);
        }
    }

    let imgs = Tensor::<B, 6>::from_data(
        TensorData::new(x_data, [batch_size, clips, 3, frames, size, size]),
        device,
    );
    let label = Tensor::<B, 1, Int>::from_data(TensorData::new(y_data, [batch_size]), device);

    ClipBatch::with_label(imgs, label).unwrap()
}

fn to_vec<B: Backend>(t: Tensor<B, 2>) -> Vec<f32> {
    t.into_data().iter::<f32>().collect()
}

fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < tol, "{:?} != {:?}", a, b);
    }
}

#[test]
fn test_train_step_backpropagates_2d() {
    let device = Default::default();
    let config = RecognizerConfig::from_file(config_path("recognizer2d_frame_cnn.json")).unwrap();
    let recognizer =
        build_recognizer::<TrainBackend>(&config, &default_registry(), &device).unwrap();
    assert_eq!(recognizer.name(), "Recognizer2D");

    let batch = create_synthetic_batch::<TrainBackend>(4, 3, 2, 16, 10, &device);
    let out = recognizer.train_step(&batch).unwrap();

    assert_eq!(out.num_samples, 4);
    for key in ["loss", "loss_cls", "top1_acc", "top5_acc"] {
        assert!(out.log_vars.contains_key(key), "missing {}", key);
    }

    let loss: f32 = out.loss.clone().into_scalar().elem();
    assert!(loss.is_finite());
    assert!((loss - out.log_vars["loss"]).abs() < 1e-5);

    // Gradients flow back to the inputs of the loss
    let _grads = out.loss.backward();
}

#[test]
fn test_train_step_backpropagates_3d() {
    let device = Default::default();
    let config = RecognizerConfig::from_file(config_path("recognizer3d_r2plus1d.json")).unwrap();
    let recognizer =
        build_recognizer::<TrainBackend>(&config, &default_registry(), &device).unwrap();
    assert_eq!(recognizer.name(), "Recognizer3D");

    let batch = create_synthetic_batch::<TrainBackend>(2, 2, 4, 16, 10, &device);
    let out = recognizer.train_step(&batch).unwrap();

    assert_eq!(out.num_samples, 2);
    let loss: f32 = out.loss.clone().into_scalar().elem();
    assert!(loss.is_finite() && loss > 0.0);
    let _grads = out.loss.backward();
}

#[test]
fn test_val_step_one_row_per_sample() {
    let device = Default::default();
    let registry = default_registry::<InferBackend>();

    for (file, clips) in [
        ("recognizer2d_frame_cnn.json", 3),
        ("recognizer3d_r2plus1d.json", 2),
    ] {
        let config = RecognizerConfig::from_file(config_path(file)).unwrap();
        let recognizer = build_recognizer(&config, &registry, &device).unwrap();

        let batch = create_synthetic_batch::<InferBackend>(3, clips, 4, 16, 10, &device);
        let out = recognizer.val_step(&batch).unwrap();
        assert_eq!(out.results.dims(), [3, 10], "{}", file);
    }
}

#[test]
fn test_val_step_ignores_missing_label() {
    let device = Default::default();
    let config = RecognizerConfig::from_file(config_path("recognizer3d_r2plus1d.json")).unwrap();
    let recognizer =
        build_recognizer::<InferBackend>(&config, &default_registry(), &device).unwrap();

    let batch = create_synthetic_batch::<InferBackend>(2, 2, 4, 16, 10, &device);
    let unlabeled = ClipBatch::new(batch.imgs);

    let results = recognizer.val_step(&unlabeled).unwrap().results;
    let sums: Vec<f32> = results.sum_dim(1).into_data().iter::<f32>().collect();
    for sum in sums {
        assert!((sum - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_val_step_is_deterministic_on_autodiff() {
    let device = Default::default();

    for file in CONFIGS {
        let config = RecognizerConfig::from_file(config_path(file)).unwrap();
        let recognizer =
            build_recognizer::<TrainBackend>(&config, &default_registry(), &device).unwrap();
        let batch = create_synthetic_batch::<TrainBackend>(2, 2, 4, 16, 10, &device);

        let first = to_vec(recognizer.val_step(&batch).unwrap().results);
        let second = to_vec(recognizer.val_step(&batch).unwrap().results);
        assert_eq!(first, second, "{}", file);

        // Same scores as the inner backend, which never trains
        let inner = recognizer.valid();
        let inner_batch = create_synthetic_batch::<InferBackend>(2, 2, 4, 16, 10, &device);
        let expected = to_vec(inner.val_step(&inner_batch).unwrap().results);
        assert_close(&first, &expected, 1e-5);
    }
}

#[test]
fn test_val_step_scores_do_not_depend_on_batch_on_autodiff() {
    let device = Default::default();
    let config = RecognizerConfig::from_file(config_path("recognizer3d_r2plus1d.json")).unwrap();
    let recognizer =
        build_recognizer::<TrainBackend>(&config, &default_registry(), &device).unwrap();

    let batch = create_synthetic_batch::<TrainBackend>(3, 2, 4, 16, 10, &device);
    let first_sample = ClipBatch::new(batch.imgs.clone().slice([0..1]));

    let batched = recognizer.val_step(&batch).unwrap().results.slice([0..1]);
    let alone = recognizer.val_step(&first_sample).unwrap().results;
    assert_close(&to_vec(alone), &to_vec(batched), 1e-5);
}

#[test]
fn test_optimizer_step_updates_parameters() {
    let device = Default::default();

    for file in CONFIGS {
        let config = RecognizerConfig::from_file(config_path(file)).unwrap();
        let mut recognizer =
            build_recognizer::<TrainBackend>(&config, &default_registry(), &device).unwrap();
        let mut optim = SgdConfig::new().init();
        let batch = create_synthetic_batch::<TrainBackend>(4, 2, 4, 16, 10, &device);
        let num_params = recognizer.num_params();

        let out = recognizer.train_step(&batch).unwrap();
        // Running statistics already moved during train_step
        let before = to_vec(recognizer.val_step(&batch).unwrap().results);

        let grads = GradientsParams::from_grads(out.loss.backward(), &recognizer);
        recognizer = optim.step(0.1, recognizer, grads);
        let after = to_vec(recognizer.val_step(&batch).unwrap().results);

        assert_eq!(recognizer.num_params(), num_params);
        assert_eq!(recognizer.name(), config.kind);
        assert_ne!(before, after, "{}", file);
    }
}
