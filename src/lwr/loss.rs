//! The stateful LWR loss

use super::config::{LwrConfig, Mode};
use super::ops;
use super::phase::{Phase, PhaseState};
use super::table::SoftLabelTable;
use crate::{Error, Result};
use ndarray::{Array2, Axis};

/// Result of one loss computation
#[derive(Debug, Clone)]
pub struct LwrOutput {
    /// Scalar loss for the batch
    pub loss: f32,
    /// Gradient of the loss with respect to the logits; `None` on eval
    /// calls, which must stay side-effect free end to end
    pub logits_grad: Option<Array2<f32>>,
    /// Phase the loss was computed under
    pub phase: Phase,
}

/// Learning-with-Retrospection loss
///
/// Owns the soft-label table and the phase counters for a whole training
/// run. Train-mode calls advance the counters once per batch and write the
/// table at the designated epoch boundaries; eval-mode calls mutate nothing.
///
/// # Example
///
/// ```
/// use repasar::lwr::{LwrConfig, LwrLoss, Mode, Phase};
/// use ndarray::array;
///
/// let config = LwrConfig::new(1, 1, 2, 3, 4, Mode::Kl).with_tau(1.0);
/// let mut lwr = LwrLoss::new(config).unwrap();
///
/// let logits = array![[2.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
/// let out = lwr.compute(&[0, 1], &logits, &[0, 1], None, false).unwrap();
/// assert_eq!(out.phase, Phase::WarmUp);
/// ```
#[derive(Debug, Clone)]
pub struct LwrLoss {
    config: LwrConfig,
    state: PhaseState,
    table: SoftLabelTable,
}

impl LwrLoss {
    /// Create the loss, validating the configuration
    pub fn new(config: LwrConfig) -> Result<Self> {
        config.validate()?;
        let table = SoftLabelTable::new(config.dataset_length, config.num_classes);
        Ok(Self {
            config,
            state: PhaseState::new(),
            table,
        })
    }

    /// Loss configuration
    pub fn config(&self) -> &LwrConfig {
        &self.config
    }

    /// Current counters
    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    /// Phase the next computation will run under
    pub fn phase(&self) -> Phase {
        self.state.phase(&self.config)
    }

    /// Convex-combination weight for the current epoch:
    /// `1 - update_rate * epoch_count * k / max_epochs`
    pub fn alpha(&self) -> f32 {
        1.0 - self.config.update_rate * self.state.epoch_count() as f32 * self.config.k as f32
            / self.config.max_epochs as f32
    }

    /// Stored soft labels
    pub fn soft_labels(&self) -> &SoftLabelTable {
        &self.table
    }

    /// Compute the loss for one batch
    ///
    /// * `sample_indices` - stable dataset index of each batch row
    /// * `logits` - `(batch, classes)` model outputs
    /// * `labels` - true class per batch row
    /// * `previous_output` - snapshot logits for the same inputs; required in
    ///   the retrospective phase, ignored otherwise
    /// * `is_eval` - when true, nothing is mutated and no gradient is
    ///   produced
    pub fn compute(
        &mut self,
        sample_indices: &[usize],
        logits: &Array2<f32>,
        labels: &[usize],
        previous_output: Option<&Array2<f32>>,
        is_eval: bool,
    ) -> Result<LwrOutput> {
        self.check_inputs(sample_indices, logits, labels, previous_output)?;

        let phase = self.state.phase(&self.config);
        let output = match phase {
            Phase::WarmUp => self.warm_up(sample_indices, logits, labels, is_eval)?,
            Phase::Distillation => self.distillation(sample_indices, logits, labels, is_eval)?,
            Phase::Retrospective => {
                let previous = previous_output.ok_or_else(|| {
                    Error::InvalidState(format!(
                        "retrospective loss at epoch {} requires a snapshot output",
                        self.state.epoch_count()
                    ))
                })?;
                self.retrospective(logits, labels, previous, is_eval)
            }
        };

        if !is_eval {
            self.state.advance(&self.config);
        }

        Ok(output)
    }

    /// Warm-up: plain cross-entropy. On the recording epoch
    /// (`epoch_count == k`, KL mode) train calls additionally store the
    /// batch's softened logits without using them yet.
    fn warm_up(
        &mut self,
        sample_indices: &[usize],
        logits: &Array2<f32>,
        labels: &[usize],
        is_eval: bool,
    ) -> Result<LwrOutput> {
        if !is_eval && self.state.epoch_count() == self.config.k && self.config.mode == Mode::Kl {
            self.table.record(sample_indices, logits, self.config.tau)?;
        }

        let loss = ops::cross_entropy(logits, labels);
        let logits_grad = (!is_eval).then(|| ops::cross_entropy_grad(logits, labels));

        Ok(LwrOutput {
            loss,
            logits_grad,
            phase: Phase::WarmUp,
        })
    }

    /// Distillation: `alpha * CE + (1 - alpha) * tau^2 * KL(stored || current)`.
    /// Train calls refresh the stored labels on epochs where
    /// `(epoch_count + 1) % k == 0`.
    fn distillation(
        &mut self,
        sample_indices: &[usize],
        logits: &Array2<f32>,
        labels: &[usize],
        is_eval: bool,
    ) -> Result<LwrOutput> {
        if !is_eval && (self.state.epoch_count() + 1) % self.config.k == 0 {
            self.table.record(sample_indices, logits, self.config.tau)?;
        }

        let tau = self.config.tau;
        let alpha = self.alpha();

        let stored = self.table.rows(sample_indices)?;
        let softened = ops::softmax(&(logits / tau), Axis(1));

        let ce = ops::cross_entropy(logits, labels);
        let kl = ops::kl_divergence(&stored, &softened);
        let loss = alpha * ce + (1.0 - alpha) * tau * tau * kl;

        let logits_grad = (!is_eval).then(|| {
            let n = logits.nrows() as f32;
            let ce_grad = ops::cross_entropy_grad(logits, labels);
            // d/dz of tau^2 * KL(p || softmax(z/tau)) with batch-mean
            // reduction; rows of p sum to 1 for recorded samples and to 0
            // for never-recorded ones, so keep the general form.
            let mut kl_grad = Array2::zeros(logits.raw_dim());
            for ((mut out, q), p) in kl_grad
                .axis_iter_mut(Axis(0))
                .zip(softened.axis_iter(Axis(0)))
                .zip(stored.axis_iter(Axis(0)))
            {
                let p_sum: f32 = p.sum();
                for ((o, &q_j), &p_j) in out.iter_mut().zip(q.iter()).zip(p.iter()) {
                    *o = tau * (q_j * p_sum - p_j) / n;
                }
            }
            ce_grad * alpha + kl_grad * (1.0 - alpha)
        });

        Ok(LwrOutput {
            loss,
            logits_grad,
            phase: Phase::Distillation,
        })
    }

    /// Retrospective: cross-entropy plus weighted L1 terms pulling the
    /// softened output toward the true label and away from divergence from
    /// the snapshot. The snapshot output is a constant; no gradient flows
    /// into it.
    fn retrospective(
        &self,
        logits: &Array2<f32>,
        labels: &[usize],
        previous_output: &Array2<f32>,
        is_eval: bool,
    ) -> LwrOutput {
        let scale = self.config.retrospective_scale;

        let probs = ops::softmax(logits, Axis(1));
        let previous = ops::softmax(previous_output, Axis(1));
        let targets = ops::one_hot(labels, self.config.num_classes);

        let to_label = ops::l1_distance(&probs, &targets);
        let to_snapshot = ops::l1_distance(&probs, &previous);

        let task_loss = ops::cross_entropy(logits, labels);
        let loss = task_loss + (scale + 1.0) * to_label - scale * to_snapshot;

        let logits_grad = (!is_eval).then(|| {
            let elems = probs.len() as f32;
            let mut grad = ops::cross_entropy_grad(logits, labels);
            for ((mut g, p), (y, prev)) in grad
                .axis_iter_mut(Axis(0))
                .zip(probs.axis_iter(Axis(0)))
                .zip(targets.axis_iter(Axis(0)).zip(previous.axis_iter(Axis(0))))
            {
                // Upstream gradient with respect to the probabilities, then
                // pulled back through the softmax Jacobian.
                let upstream: ndarray::Array1<f32> = p
                    .iter()
                    .zip(y.iter().zip(prev.iter()))
                    .map(|(&p_j, (&y_j, &prev_j))| {
                        ((scale + 1.0) * (p_j - y_j).signum()
                            - scale * (p_j - prev_j).signum())
                            / elems
                    })
                    .collect();
                let pulled = ops::softmax_jvp(p, upstream.view());
                for (g_j, d) in g.iter_mut().zip(pulled.iter()) {
                    *g_j += d;
                }
            }
            grad
        });

        LwrOutput {
            loss,
            logits_grad,
            phase: Phase::Retrospective,
        }
    }

    fn check_inputs(
        &self,
        sample_indices: &[usize],
        logits: &Array2<f32>,
        labels: &[usize],
        previous_output: Option<&Array2<f32>>,
    ) -> Result<()> {
        if logits.nrows() != sample_indices.len() || logits.nrows() != labels.len() {
            return Err(Error::ShapeMismatch(format!(
                "logits have {} rows but got {} sample indices and {} labels",
                logits.nrows(),
                sample_indices.len(),
                labels.len()
            )));
        }
        if logits.ncols() != self.config.num_classes {
            return Err(Error::ShapeMismatch(format!(
                "logits have {} classes, configured for {}",
                logits.ncols(),
                self.config.num_classes
            )));
        }
        for &label in labels {
            if label >= self.config.num_classes {
                return Err(Error::ShapeMismatch(format!(
                    "label {} out of range for {} classes",
                    label, self.config.num_classes
                )));
            }
        }
        for &index in sample_indices {
            if index >= self.config.dataset_length {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: self.config.dataset_length,
                });
            }
        }
        if let Some(previous) = previous_output {
            if previous.shape() != logits.shape() {
                return Err(Error::ShapeMismatch(format!(
                    "previous output shape {:?} does not match logits {:?}",
                    previous.shape(),
                    logits.shape()
                )));
            }
        }
        Ok(())
    }
}
