//! Classification metrics

use ndarray::{Array2, Axis};

/// Evaluation result over a dataset
#[derive(Debug, Clone, Copy)]
pub struct EvalReport {
    /// Mean cross-entropy over all samples
    pub loss: f32,
    /// Fraction of samples whose argmax logit matches the label
    pub accuracy: f32,
}

/// Fraction of rows whose argmax logit equals the label
pub fn accuracy(logits: &Array2<f32>, labels: &[usize]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = logits
        .axis_iter(Axis(0))
        .zip(labels.iter())
        .filter(|(row, &label)| {
            let predicted = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(i, _)| i);
            predicted == Some(label)
        })
        .count();
    correct as f32 / labels.len() as f32
}
