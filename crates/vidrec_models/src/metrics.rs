//! Classification metrics logged next to the losses.

use burn::prelude::*;

/// Fraction of samples whose label is among the `k` highest scores.
///
/// `k` is clamped to `[1, n_classes]`. Ties are resolved in favour of the
/// label. Labels outside `[0, n_classes)` count as misses.
///
/// # Arguments
///
/// * `scores` - Class scores of shape (batch, n_classes)
/// * `labels` - Class indices of shape (batch,)
pub fn top_k_accuracy<B: Backend>(
    scores: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
    k: usize,
) -> f32 {
    let [n, n_classes] = scores.dims();
    if n == 0 || n_classes == 0 {
        return 0.0;
    }
    let k = k.clamp(1, n_classes);

    let scores: Vec<f32> = scores.into_data().iter::<f32>().collect();
    let labels: Vec<i64> = labels.into_data().iter::<i64>().collect();

    let hits = scores
        .chunks(n_classes)
        .zip(&labels)
        .filter(|&(row, &label)| {
            if label < 0 || label as usize >= n_classes {
                return false;
            }
            let target = row[label as usize];
            row.iter().filter(|&&s| s > target).count() < k
        })
        .count();

    hits as f32 / n as f32
}
