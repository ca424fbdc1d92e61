//! The epoch-level training loop

use super::config::TrainConfig;
use super::metrics::{self, EvalReport};
use crate::data::IndexedDataset;
use crate::lwr::{ops, LwrLoss, Mode, Phase};
use crate::model::{Classifier, Snapshot};
use crate::optim::Optimizer;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Drives training of a [`Classifier`] under the LWR loss
///
/// In retrospective mode the trainer captures a frozen parameter snapshot at
/// the epoch boundaries the schedule dictates and feeds its logits to the
/// loss; callers never handle the snapshot themselves.
pub struct LwrTrainer<O: Optimizer> {
    model: Classifier,
    lwr: LwrLoss,
    optimizer: O,
    config: TrainConfig,
    snapshot: Option<Snapshot>,
    rng: StdRng,
}

impl<O: Optimizer> LwrTrainer<O> {
    /// Assemble a trainer; the model head must match the loss's class count
    pub fn new(model: Classifier, lwr: LwrLoss, optimizer: O, config: TrainConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch_size must be >= 1".to_string(),
            ));
        }
        if model.num_classes() != lwr.config().num_classes {
            return Err(Error::InvalidConfig(format!(
                "model emits {} classes but the loss expects {}",
                model.num_classes(),
                lwr.config().num_classes
            )));
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            model,
            lwr,
            optimizer,
            config,
            snapshot: None,
            rng,
        })
    }

    /// Trained model
    pub fn model(&self) -> &Classifier {
        &self.model
    }

    /// Loss state
    pub fn lwr(&self) -> &LwrLoss {
        &self.lwr
    }

    /// Consume the trainer, returning the trained model
    pub fn into_model(self) -> Classifier {
        self.model
    }

    /// Run one full epoch over `dataset`, returning the mean batch loss
    pub fn train_epoch(&mut self, dataset: &IndexedDataset) -> Result<f32> {
        self.check_dataset(dataset)?;

        let epoch = self.lwr.state().epoch_count();
        self.refresh_snapshot(epoch);

        let batches = if self.config.shuffle {
            dataset.shuffled_batches(self.config.batch_size, &mut self.rng)
        } else {
            dataset.batches(self.config.batch_size)
        };

        let mut total_loss = 0.0;
        let num_batches = batches.len();
        for (step, batch) in batches.iter().enumerate() {
            let previous = match self.lwr.phase() {
                Phase::Retrospective => self.snapshot.as_ref().map(|s| s.forward(&batch.inputs)),
                _ => None,
            };

            let logits = self.model.forward(&batch.inputs);
            let out = self.lwr.compute(
                &batch.indices,
                &logits,
                &batch.labels,
                previous.as_ref(),
                false,
            )?;
            let d_logits = out.logits_grad.ok_or_else(|| {
                Error::InvalidState("train-mode loss call produced no gradient".to_string())
            })?;

            self.model.zero_grad();
            self.model.backward(&batch.inputs, &d_logits);
            self.optimizer.step(&mut self.model.param_views());

            total_loss += out.loss;
            if self.config.log_interval > 0 && step % self.config.log_interval == 0 {
                println!(
                    "Epoch {}, Step {}: loss={:.4}, lr={:.6}",
                    epoch,
                    step,
                    out.loss,
                    self.optimizer.lr()
                );
            }
        }

        Ok(total_loss / num_batches as f32)
    }

    /// Mean cross-entropy and accuracy over `dataset`, without touching the
    /// loss state
    pub fn evaluate(&self, dataset: &IndexedDataset) -> EvalReport {
        let mut loss_sum = 0.0;
        let mut correct_weighted = 0.0;
        let mut samples = 0usize;

        for batch in dataset.batches(self.config.batch_size) {
            let logits = self.model.forward(&batch.inputs);
            loss_sum += ops::cross_entropy(&logits, &batch.labels) * batch.size() as f32;
            correct_weighted += metrics::accuracy(&logits, &batch.labels) * batch.size() as f32;
            samples += batch.size();
        }

        if samples == 0 {
            return EvalReport {
                loss: 0.0,
                accuracy: 0.0,
            };
        }
        EvalReport {
            loss: loss_sum / samples as f32,
            accuracy: correct_weighted / samples as f32,
        }
    }

    /// Capture a fresh frozen snapshot at the start of epochs `k`, `2k`, ...
    /// so the first retrospective epoch (`k + 1`) compares against the
    /// parameters frozen one epoch earlier, never against its own start.
    fn refresh_snapshot(&mut self, epoch: usize) {
        if self.lwr.config().mode != Mode::Retrospective {
            return;
        }
        if snapshot_due(epoch, self.lwr.config().k, self.snapshot.is_some()) {
            self.snapshot = Some(self.model.snapshot());
        }
    }

    fn check_dataset(&self, dataset: &IndexedDataset) -> Result<()> {
        if dataset.len() != self.lwr.config().dataset_length {
            return Err(Error::InvalidConfig(format!(
                "dataset has {} samples but the loss was sized for {}",
                dataset.len(),
                self.lwr.config().dataset_length
            )));
        }
        let batches = dataset.num_batches(self.config.batch_size);
        if batches != self.lwr.config().num_batches_per_epoch {
            return Err(Error::InvalidConfig(format!(
                "{} batches per epoch at batch size {} but the loss expects {}",
                batches,
                self.config.batch_size,
                self.lwr.config().num_batches_per_epoch
            )));
        }
        if dataset.num_features() != self.model.input_dim() {
            return Err(Error::InvalidConfig(format!(
                "dataset has {} features but the model expects {}",
                dataset.num_features(),
                self.model.input_dim()
            )));
        }
        Ok(())
    }
}

/// True when a new snapshot must be taken at the start of `epoch` (1-based):
/// every `k`-th epoch, or whenever none has been captured yet
fn snapshot_due(epoch: usize, k: usize, have_snapshot: bool) -> bool {
    !have_snapshot || epoch % k == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lwr::LwrConfig;
    use crate::model::{build_classifier, BackboneConfig};
    use crate::optim::Sgd;
    use ndarray::Array2;

    fn blob_dataset(samples_per_class: usize, seed: u64) -> IndexedDataset {
        use rand::Rng;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut inputs = Array2::zeros((2 * samples_per_class, 2));
        let mut labels = Vec::with_capacity(2 * samples_per_class);
        for i in 0..2 * samples_per_class {
            let class = i % 2;
            let center = if class == 0 { -1.0 } else { 1.0 };
            inputs[[i, 0]] = center + 0.3 * (rng.random::<f32>() - 0.5);
            inputs[[i, 1]] = center + 0.3 * (rng.random::<f32>() - 0.5);
            labels.push(class);
        }
        IndexedDataset::new(inputs, labels).unwrap()
    }

    fn trainer(mode: Mode, dataset: &IndexedDataset, max_epochs: usize) -> LwrTrainer<Sgd> {
        let backbone = BackboneConfig {
            input_dim: 2,
            hidden: vec![8],
            seed: 42,
        };
        let model = build_classifier(2, &backbone);
        let train_config = TrainConfig::new(4).with_log_interval(0);
        let lwr_config = LwrConfig::new(
            2,
            dataset.num_batches(train_config.batch_size),
            dataset.len(),
            2,
            max_epochs,
            mode,
        )
        .with_tau(2.0);
        let lwr = LwrLoss::new(lwr_config).unwrap();
        LwrTrainer::new(model, lwr, Sgd::with_momentum(0.1, 0.9), train_config).unwrap()
    }

    #[test]
    fn test_epoch_counter_tracks_train_epochs() {
        let dataset = blob_dataset(8, 1);
        let mut t = trainer(Mode::Kl, &dataset, 6);

        assert_eq!(t.lwr().state().epoch_count(), 1);
        t.train_epoch(&dataset).unwrap();
        assert_eq!(t.lwr().state().epoch_count(), 2);
        assert_eq!(t.lwr().state().step_count(), 0);
    }

    #[test]
    fn test_kl_training_reduces_loss() {
        let dataset = blob_dataset(16, 2);
        let mut t = trainer(Mode::Kl, &dataset, 6);

        let before = t.evaluate(&dataset);
        for _ in 0..6 {
            t.train_epoch(&dataset).unwrap();
        }
        let after = t.evaluate(&dataset);

        assert!(after.loss < before.loss);
        assert!(after.accuracy > 0.9, "accuracy {}", after.accuracy);
    }

    #[test]
    fn test_retrospective_training_runs_past_warmup() {
        let dataset = blob_dataset(16, 3);
        let mut t = trainer(Mode::Retrospective, &dataset, 6);

        // Two warm-up epochs plus four retrospective epochs; the snapshot is
        // refreshed internally, so no call fails for lack of one.
        for _ in 0..6 {
            t.train_epoch(&dataset).unwrap();
        }
        assert_eq!(t.lwr().phase(), Phase::Retrospective);

        let report = t.evaluate(&dataset);
        assert!(report.accuracy > 0.9, "accuracy {}", report.accuracy);
    }

    #[test]
    fn test_evaluate_leaves_loss_state_alone() {
        let dataset = blob_dataset(8, 4);
        let t = trainer(Mode::Kl, &dataset, 6);

        let state_before = *t.lwr().state();
        let a = t.evaluate(&dataset);
        let b = t.evaluate(&dataset);

        assert_eq!(*t.lwr().state(), state_before);
        assert_eq!(a.loss, b.loss);
        assert_eq!(a.accuracy, b.accuracy);
    }

    #[test]
    fn test_snapshot_cadence_skips_first_retrospective_epoch() {
        // k = 2: refresh at epochs 2, 4, ... — epoch 3, the first
        // retrospective epoch, must reuse the epoch-2 snapshot rather than
        // capture one at its own start.
        assert!(snapshot_due(1, 2, false));
        assert!(snapshot_due(2, 2, true));
        assert!(!snapshot_due(3, 2, true));
        assert!(snapshot_due(4, 2, true));
        assert!(!snapshot_due(5, 2, true));

        // k = 1 refreshes every epoch.
        for epoch in 1..=4 {
            assert!(snapshot_due(epoch, 1, true));
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dataset = blob_dataset(8, 8);
        let backbone = BackboneConfig {
            input_dim: 2,
            hidden: vec![8],
            seed: 42,
        };
        let model = build_classifier(2, &backbone);
        let config = TrainConfig::new(0).with_log_interval(0);
        let lwr_config = LwrConfig::new(2, 1, dataset.len(), 2, 6, Mode::Kl);
        let lwr = LwrLoss::new(lwr_config).unwrap();
        assert!(matches!(
            LwrTrainer::new(model, lwr, Sgd::new(0.1), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dataset_size_mismatch_rejected() {
        let dataset = blob_dataset(8, 5);
        let other = blob_dataset(4, 5);
        let mut t = trainer(Mode::Kl, &dataset, 6);
        assert!(matches!(
            t.train_epoch(&other),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_head_class_mismatch_rejected() {
        let dataset = blob_dataset(8, 6);
        let backbone = BackboneConfig {
            input_dim: 2,
            hidden: vec![8],
            seed: 42,
        };
        let model = build_classifier(3, &backbone);
        let config = TrainConfig::new(4).with_log_interval(0);
        let lwr_config = LwrConfig::new(
            2,
            dataset.num_batches(config.batch_size),
            dataset.len(),
            2,
            6,
            Mode::Kl,
        );
        let lwr = LwrLoss::new(lwr_config).unwrap();
        assert!(matches!(
            LwrTrainer::new(model, lwr, Sgd::new(0.1), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unshuffled_batches_keep_dataset_order() {
        let dataset = blob_dataset(4, 7);
        let batches = dataset.batches(4);
        let all: Vec<usize> = batches.iter().flat_map(|b| b.indices.clone()).collect();
        assert_eq!(all, (0..8).collect::<Vec<_>>());
    }
}
