//! LWR loss configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Which regularization mathematics the loss applies after warm-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Temperature-scaled KL divergence against stored soft labels
    Kl,
    /// L1 retrospective loss against a frozen model snapshot
    Retrospective,
}

/// Configuration for [`LwrLoss`](super::LwrLoss)
///
/// Validated once at loss construction; a rejected configuration is an
/// [`Error::InvalidConfig`], never silently degenerate behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LwrConfig {
    /// Warm-up length in epochs; soft labels are refreshed every `k` epochs
    pub k: usize,
    /// Number of batches that make up one epoch
    pub num_batches_per_epoch: usize,
    /// Total number of samples addressable in the soft-label table
    pub dataset_length: usize,
    /// Number of output classes
    pub num_classes: usize,
    /// Upper bound on `epoch_count`; also scales the alpha schedule
    pub max_epochs: usize,
    /// Temperature dividing logits before softening
    pub tau: f32,
    /// Decay coefficient for the alpha schedule
    pub update_rate: f32,
    /// Axis of softening; logits are `(batch, classes)`, so only axis 1 is
    /// meaningful here
    pub softmax_dim: usize,
    /// Post-warm-up mode selector
    pub mode: Mode,
    /// Weight of the retrospective L1 terms
    pub retrospective_scale: f32,
}

impl LwrConfig {
    /// Create a configuration with the standard LWR defaults for
    /// temperature (5.0), update rate (0.9), softening axis (1) and
    /// retrospective scale (4.0).
    pub fn new(
        k: usize,
        num_batches_per_epoch: usize,
        dataset_length: usize,
        num_classes: usize,
        max_epochs: usize,
        mode: Mode,
    ) -> Self {
        Self {
            k,
            num_batches_per_epoch,
            dataset_length,
            num_classes,
            max_epochs,
            tau: 5.0,
            update_rate: 0.9,
            softmax_dim: 1,
            mode,
            retrospective_scale: 4.0,
        }
    }

    /// Set the softening temperature
    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    /// Set the alpha-schedule decay coefficient
    pub fn with_update_rate(mut self, update_rate: f32) -> Self {
        self.update_rate = update_rate;
        self
    }

    /// Set the retrospective L1 scale
    pub fn with_retrospective_scale(mut self, scale: f32) -> Self {
        self.retrospective_scale = scale;
        self
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be >= 1".to_string()));
        }
        if self.max_epochs <= self.k {
            return Err(Error::InvalidConfig(format!(
                "max_epochs ({}) must exceed the warm-up length k ({}), \
                 otherwise the post-warm-up phase never activates",
                self.max_epochs, self.k
            )));
        }
        if self.num_batches_per_epoch == 0 {
            return Err(Error::InvalidConfig(
                "num_batches_per_epoch must be >= 1".to_string(),
            ));
        }
        if self.dataset_length == 0 {
            return Err(Error::InvalidConfig(
                "dataset_length must be >= 1".to_string(),
            ));
        }
        if self.num_classes < 2 {
            return Err(Error::InvalidConfig(
                "num_classes must be >= 2".to_string(),
            ));
        }
        if self.tau <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tau must be positive, got {}",
                self.tau
            )));
        }
        if !(0.0..=1.0).contains(&self.update_rate) {
            return Err(Error::InvalidConfig(format!(
                "update_rate must be in [0, 1], got {}",
                self.update_rate
            )));
        }
        if self.softmax_dim != 1 {
            return Err(Error::InvalidConfig(format!(
                "softmax_dim must be 1 for (batch, classes) logits, got {}",
                self.softmax_dim
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LwrConfig {
        LwrConfig::new(5, 100, 1000, 10, 20, Mode::Kl)
    }

    #[test]
    fn test_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_default_hyperparameters() {
        let cfg = base();
        assert_eq!(cfg.tau, 5.0);
        assert_eq!(cfg.update_rate, 0.9);
        assert_eq!(cfg.softmax_dim, 1);
        assert_eq!(cfg.retrospective_scale, 4.0);
    }

    #[test]
    fn test_zero_k_rejected() {
        let mut cfg = base();
        cfg.k = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_k_at_least_max_epochs_rejected() {
        let mut cfg = base();
        cfg.k = 20;
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err}").contains("max_epochs"));
    }

    #[test]
    fn test_nonpositive_tau_rejected() {
        let cfg = base().with_tau(0.0);
        assert!(cfg.validate().is_err());
        let cfg = base().with_tau(-2.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_update_rate_out_of_range_rejected() {
        let cfg = base().with_update_rate(1.5);
        assert!(cfg.validate().is_err());
        let cfg = base().with_update_rate(-0.1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_softmax_dim_restricted_to_class_axis() {
        let mut cfg = base();
        cfg.softmax_dim = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let mut cfg = base();
        cfg.num_classes = 1;
        assert!(cfg.validate().is_err());
    }
}
