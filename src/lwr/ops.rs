//! Numeric kernels for the LWR loss
//!
//! All softening-axis math lives here so the loss module itself never
//! touches raw exp/log: softmax and log-softmax along a chosen axis,
//! batch-mean KL divergence, elementwise-mean L1 distance, hard-label
//! cross-entropy and its gradient, and the softmax Jacobian-vector product
//! the retrospective gradient needs.

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Floor applied before logarithms to avoid log(0)
const LOG_FLOOR: f32 = 1e-10;

/// Softmax along `axis` with max-subtraction for numerical stability
pub fn softmax(x: &Array2<f32>, axis: Axis) -> Array2<f32> {
    let mut result = x.clone();

    for mut lane in result.lanes_mut(axis) {
        let max_val = lane.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        lane.mapv_inplace(|v| (v - max_val).exp());

        let sum: f32 = lane.sum();
        lane.mapv_inplace(|v| v / sum);
    }

    result
}

/// Log-softmax along `axis`
///
/// Computed directly as `x - max - ln(sum exp(x - max))` rather than
/// `ln(softmax(x))` so small probabilities keep precision.
pub fn log_softmax(x: &Array2<f32>, axis: Axis) -> Array2<f32> {
    let mut result = x.clone();

    for mut lane in result.lanes_mut(axis) {
        let max_val = lane.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum: f32 = lane.iter().map(|&v| (v - max_val).exp()).sum::<f32>().ln();
        lane.mapv_inplace(|v| v - max_val - log_sum);
    }

    result
}

/// KL divergence `KL(p || q)` between row-wise probability distributions,
/// averaged over the batch (row) dimension
///
/// Uses the `batchmean` reduction: sum over all elements divided by the
/// number of rows.
pub fn kl_divergence(p: &Array2<f32>, q: &Array2<f32>) -> f32 {
    assert_eq!(p.shape(), q.shape(), "KL operands must have same shape");

    let mut total_kl = 0.0;

    for (p_row, q_row) in p.axis_iter(Axis(0)).zip(q.axis_iter(Axis(0))) {
        for (&p_i, &q_i) in p_row.iter().zip(q_row.iter()) {
            if p_i > LOG_FLOOR {
                total_kl += p_i * (p_i / q_i.max(LOG_FLOOR)).ln();
            }
        }
    }

    total_kl / p.nrows() as f32
}

/// Mean absolute difference over all elements
pub fn l1_distance(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
    assert_eq!(a.shape(), b.shape(), "L1 operands must have same shape");

    let mut total = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        total += (x - y).abs();
    }
    total / a.len() as f32
}

/// Hard-label cross-entropy, averaged over the batch
///
/// `logits` is `(batch, classes)`; `labels[i]` is the true class of row `i`.
pub fn cross_entropy(logits: &Array2<f32>, labels: &[usize]) -> f32 {
    assert_eq!(
        logits.nrows(),
        labels.len(),
        "Batch size must match number of labels"
    );

    let log_probs = log_softmax(logits, Axis(1));

    let mut loss = 0.0;
    for (i, &label) in labels.iter().enumerate() {
        loss -= log_probs[[i, label]];
    }

    loss / labels.len().max(1) as f32
}

/// Gradient of [`cross_entropy`] with respect to the logits:
/// `(softmax(logits) - onehot(labels)) / batch`
pub fn cross_entropy_grad(logits: &Array2<f32>, labels: &[usize]) -> Array2<f32> {
    let n = logits.nrows() as f32;
    let mut grad = softmax(logits, Axis(1));
    for (i, &label) in labels.iter().enumerate() {
        grad[[i, label]] -= 1.0;
    }
    grad / n
}

/// One-hot encoding of integer labels into `(batch, num_classes)`
pub fn one_hot(labels: &[usize], num_classes: usize) -> Array2<f32> {
    let mut out = Array2::zeros((labels.len(), num_classes));
    for (i, &label) in labels.iter().enumerate() {
        out[[i, label]] = 1.0;
    }
    out
}

/// Row-wise softmax Jacobian-vector product
///
/// Given `probs = softmax(z)` for one row and an upstream gradient `s` with
/// respect to `probs`, returns the gradient with respect to `z`:
/// `p * (s - <s, p>)`.
pub fn softmax_jvp(probs: ArrayView1<'_, f32>, upstream: ArrayView1<'_, f32>) -> Array1<f32> {
    let dot: f32 = probs.iter().zip(upstream.iter()).map(|(&p, &s)| p * s).sum();
    probs
        .iter()
        .zip(upstream.iter())
        .map(|(&p, &s)| p * (s - dot))
        .collect()
}
