//! End-to-end training runs through every phase of the loss schedule

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use repasar::data::IndexedDataset;
use repasar::lwr::{LwrConfig, LwrLoss, Mode, Phase};
use repasar::model::{build_classifier, BackboneConfig};
use repasar::optim::Sgd;
use repasar::train::{LwrTrainer, TrainConfig};

/// Two well-separated Gaussian blobs in the plane
fn blobs(samples_per_class: usize, seed: u64) -> IndexedDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let total = 2 * samples_per_class;
    let mut inputs = Array2::zeros((total, 2));
    let mut labels = Vec::with_capacity(total);
    for i in 0..total {
        let class = i % 2;
        let center = if class == 0 { -1.5 } else { 1.5 };
        inputs[[i, 0]] = center + 0.4 * (rng.random::<f32>() - 0.5);
        inputs[[i, 1]] = -center + 0.4 * (rng.random::<f32>() - 0.5);
        labels.push(class);
    }
    IndexedDataset::new(inputs, labels).unwrap()
}

fn make_trainer(dataset: &IndexedDataset, mode: Mode, k: usize, epochs: usize) -> LwrTrainer<Sgd> {
    let backbone = BackboneConfig {
        input_dim: 2,
        hidden: vec![16],
        seed: 42,
    };
    let model = build_classifier(2, &backbone);
    let train_config = TrainConfig::new(8).with_log_interval(0);
    let lwr_config = LwrConfig::new(
        k,
        dataset.num_batches(train_config.batch_size),
        dataset.len(),
        2,
        epochs,
        mode,
    )
    .with_tau(2.0);
    let lwr = LwrLoss::new(lwr_config).unwrap();
    LwrTrainer::new(model, lwr, Sgd::with_momentum(0.1, 0.9), train_config).unwrap()
}

#[test]
fn kl_mode_trains_through_distillation() {
    let dataset = blobs(32, 11);
    let mut trainer = make_trainer(&dataset, Mode::Kl, 2, 8);

    let before = trainer.evaluate(&dataset);
    assert_eq!(trainer.lwr().phase(), Phase::WarmUp);

    for _ in 0..8 {
        trainer.train_epoch(&dataset).unwrap();
    }
    assert_eq!(trainer.lwr().phase(), Phase::Distillation);

    // The table was filled at the warm-up boundary; every row must be a
    // probability distribution.
    for row in trainer.lwr().soft_labels().as_array().rows() {
        let sum: f32 = row.sum();
        assert!((sum - 1.0).abs() < 1e-4, "row sums to {sum}");
    }

    let after = trainer.evaluate(&dataset);
    assert!(after.loss < before.loss);
    assert!(after.accuracy > 0.95, "accuracy {}", after.accuracy);
}

#[test]
fn retrospective_mode_trains_without_manual_snapshots() {
    let dataset = blobs(32, 12);
    let mut trainer = make_trainer(&dataset, Mode::Retrospective, 2, 8);

    for _ in 0..8 {
        trainer.train_epoch(&dataset).unwrap();
    }
    assert_eq!(trainer.lwr().phase(), Phase::Retrospective);

    // The table stays untouched in this mode.
    assert!(trainer
        .lwr()
        .soft_labels()
        .as_array()
        .iter()
        .all(|&v| v == 0.0));

    let report = trainer.evaluate(&dataset);
    assert!(report.accuracy > 0.95, "accuracy {}", report.accuracy);
}

#[test]
fn evaluation_is_repeatable_and_stateless() {
    let dataset = blobs(16, 13);
    let mut trainer = make_trainer(&dataset, Mode::Kl, 1, 4);
    trainer.train_epoch(&dataset).unwrap();

    let state = *trainer.lwr().state();
    let first = trainer.evaluate(&dataset);
    let second = trainer.evaluate(&dataset);

    assert_eq!(first.loss, second.loss);
    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(*trainer.lwr().state(), state);
}

#[test]
fn epoch_counter_saturates_at_max_epochs() {
    let dataset = blobs(8, 14);
    let mut trainer = make_trainer(&dataset, Mode::Kl, 1, 3);

    for _ in 0..5 {
        trainer.train_epoch(&dataset).unwrap();
    }
    assert_eq!(trainer.lwr().state().epoch_count(), 3);
    assert_eq!(trainer.lwr().state().step_count(), 0);
}
