//! Command-line demo: train a small classifier with retrospection on
//! synthetic Gaussian blobs

use clap::{Parser, ValueEnum};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use repasar::data::IndexedDataset;
use repasar::lwr::{LwrConfig, LwrLoss, Mode};
use repasar::model::{build_classifier, BackboneConfig};
use repasar::optim::Sgd;
use repasar::train::{LwrTrainer, TrainConfig};
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Distill against stored soft labels after warm-up
    Kl,
    /// Compare against a frozen snapshot after warm-up
    Retrospective,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Kl => Mode::Kl,
            ModeArg::Retrospective => Mode::Retrospective,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "repasar", about = "Learning-with-Retrospection training demo")]
struct Args {
    /// Post-warm-up loss variant
    #[arg(long, value_enum, default_value_t = ModeArg::Kl)]
    mode: ModeArg,

    /// Total training epochs
    #[arg(long, default_value_t = 20)]
    epochs: usize,

    /// Warm-up length in epochs
    #[arg(long, default_value_t = 5)]
    k: usize,

    /// Softmax temperature for stored labels
    #[arg(long, default_value_t = 5.0)]
    tau: f32,

    /// Slope of the CE/KL blending schedule
    #[arg(long, default_value_t = 0.9)]
    update_rate: f32,

    /// Learning rate
    #[arg(long, default_value_t = 0.05)]
    lr: f32,

    /// SGD momentum
    #[arg(long, default_value_t = 0.9)]
    momentum: f32,

    /// Samples per batch
    #[arg(long, default_value_t = 32)]
    batch_size: usize,

    /// Seed for data generation, weights and shuffling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Training samples to generate
    #[arg(long, default_value_t = 2048)]
    train_samples: usize,

    /// Held-out samples to generate
    #[arg(long, default_value_t = 512)]
    test_samples: usize,

    /// Feature dimension of the synthetic data
    #[arg(long, default_value_t = 16)]
    features: usize,

    /// Number of classes
    #[arg(long, default_value_t = 4)]
    classes: usize,

    /// Print progress every N steps (0 disables)
    #[arg(long, default_value_t = 10)]
    log_interval: usize,
}

/// Isotropic Gaussian blobs, one cluster center per class
fn generate_blobs(
    samples: usize,
    features: usize,
    classes: usize,
    rng: &mut StdRng,
) -> repasar::Result<IndexedDataset> {
    let centers: Vec<Vec<f32>> = (0..classes)
        .map(|_| (0..features).map(|_| 4.0 * rng.random::<f32>() - 2.0).collect())
        .collect();

    let mut inputs = Array2::zeros((samples, features));
    let mut labels = Vec::with_capacity(samples);
    for i in 0..samples {
        let class = i % classes;
        for j in 0..features {
            inputs[[i, j]] = centers[class][j] + 0.5 * (rng.random::<f32>() - 0.5);
        }
        labels.push(class);
    }
    IndexedDataset::new(inputs, labels)
}

fn run(args: &Args) -> repasar::Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let train = generate_blobs(args.train_samples, args.features, args.classes, &mut rng)?;
    let test = generate_blobs(args.test_samples, args.features, args.classes, &mut rng)?;

    let backbone = BackboneConfig {
        input_dim: args.features,
        hidden: vec![64, 32],
        seed: args.seed,
    };
    let model = build_classifier(args.classes, &backbone);

    let train_config = TrainConfig::new(args.batch_size)
        .with_seed(args.seed)
        .with_log_interval(args.log_interval);
    let lwr_config = LwrConfig::new(
        args.k,
        train.num_batches(args.batch_size),
        train.len(),
        args.classes,
        args.epochs,
        args.mode.into(),
    )
    .with_tau(args.tau)
    .with_update_rate(args.update_rate);
    let lwr = LwrLoss::new(lwr_config)?;

    let optimizer = Sgd::with_momentum(args.lr, args.momentum);
    let mut trainer = LwrTrainer::new(model, lwr, optimizer, train_config)?;

    println!(
        "Training {} epochs ({} warm-up) on {} samples, mode {:?}",
        args.epochs,
        args.k,
        train.len(),
        args.mode
    );
    for _ in 0..args.epochs {
        let epoch = trainer.lwr().state().epoch_count();
        let phase = trainer.lwr().phase();
        let avg_loss = trainer.train_epoch(&train)?;
        let report = trainer.evaluate(&test);
        println!(
            "Epoch {epoch} [{phase:?}]: train_loss={avg_loss:.4}, test_loss={:.4}, test_acc={:.4}",
            report.loss, report.accuracy
        );
    }

    let final_report = trainer.evaluate(&test);
    println!(
        "Final: test_loss={:.4}, test_acc={:.4}",
        final_report.loss, final_report.accuracy
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
