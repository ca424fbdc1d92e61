//! Learning with Retrospection (LWR) training losses
//!
//! LWR regularizes a classifier by blending the usual hard-label
//! cross-entropy with supervision derived from the model's own past:
//!
//! - **KL mode**: a temperature-scaled KL divergence between the current
//!   softened output and soft labels the model recorded for each sample at
//!   an earlier epoch boundary.
//! - **Retrospective mode**: an L1 term that pulls the softened output
//!   toward the true label while discouraging divergence from a frozen
//!   snapshot of the model taken every `k` epochs.
//!
//! The crate provides the stateful loss itself ([`lwr::LwrLoss`]), a small
//! MLP classifier factory ([`model::build_classifier`]), an index-augmented
//! dataset wrapper ([`data::IndexedDataset`]), SGD ([`optim::Sgd`]), and a
//! training driver ([`train::LwrTrainer`]).
//!
//! # Example
//!
//! ```
//! use repasar::lwr::{LwrConfig, LwrLoss, Mode};
//! use ndarray::array;
//!
//! let config = LwrConfig::new(1, 1, 2, 3, 4, Mode::Kl);
//! let mut loss_fn = LwrLoss::new(config).unwrap();
//!
//! let logits = array![[2.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
//! let out = loss_fn.compute(&[0, 1], &logits, &[0, 1], None, false).unwrap();
//! assert!(out.loss > 0.0);
//! ```

pub mod data;
mod error;
pub mod lwr;
pub mod model;
pub mod optim;
pub mod train;

pub use error::{Error, Result};
