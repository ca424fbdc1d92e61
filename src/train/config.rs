//! Training loop configuration

use serde::{Deserialize, Serialize};

/// Knobs for the training loop itself, separate from the loss schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Samples per batch
    pub batch_size: usize,
    /// Shuffle the dataset each epoch
    pub shuffle: bool,
    /// Seed for the shuffle order
    pub seed: u64,
    /// Print progress every `log_interval` steps; 0 disables logging
    pub log_interval: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            seed: 42,
            log_interval: 100,
        }
    }
}

impl TrainConfig {
    /// Default configuration at `batch_size`
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Set the shuffle flag
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the shuffle seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the logging interval
    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = TrainConfig::new(16)
            .with_shuffle(false)
            .with_seed(7)
            .with_log_interval(0);
        assert_eq!(config.batch_size, 16);
        assert!(!config.shuffle);
        assert_eq!(config.seed, 7);
        assert_eq!(config.log_interval, 0);
    }
}
