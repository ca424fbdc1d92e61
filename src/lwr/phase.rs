//! Training-phase state machine

use super::config::{LwrConfig, Mode};

/// Which loss formula is active for the current batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Hard-label cross-entropy only (`epoch_count <= k`)
    WarmUp,
    /// Cross-entropy blended with stored-soft-label KL (`epoch_count > k`, KL mode)
    Distillation,
    /// Cross-entropy plus snapshot L1 terms (`epoch_count > k`, non-KL mode)
    Retrospective,
}

/// Step/epoch counters advanced by train-mode loss calls
///
/// `epoch_count` is 1-based: the first `num_batches_per_epoch` train calls
/// all see `epoch_count == 1`. Invariants: `step_count` stays in
/// `[0, num_batches_per_epoch)` and `epoch_count` is monotone, saturating at
/// `max_epochs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState {
    step_count: usize,
    epoch_count: usize,
}

impl PhaseState {
    pub(crate) fn new() -> Self {
        Self {
            step_count: 0,
            epoch_count: 1,
        }
    }

    /// Batch index within the current epoch
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Current (1-based) epoch
    pub fn epoch_count(&self) -> usize {
        self.epoch_count
    }

    /// Phase selected by the counters under `config`
    pub fn phase(&self, config: &LwrConfig) -> Phase {
        if self.epoch_count <= config.k {
            Phase::WarmUp
        } else {
            match config.mode {
                Mode::Kl => Phase::Distillation,
                Mode::Retrospective => Phase::Retrospective,
            }
        }
    }

    /// Advance by one batch, rolling the epoch over at the batch boundary.
    /// Called once per train-mode loss computation, never on eval.
    pub(crate) fn advance(&mut self, config: &LwrConfig) {
        self.step_count += 1;
        if self.step_count >= config.num_batches_per_epoch {
            self.step_count = 0;
            if self.epoch_count < config.max_epochs {
                self.epoch_count += 1;
            }
        }
    }
}
