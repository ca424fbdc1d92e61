//! Learning with Retrospection loss
//!
//! The loss module owns all historical per-sample state for a training run:
//!
//! - a [`SoftLabelTable`] holding one stored probability row per dataset
//!   sample, written at designated epoch boundaries and read every
//!   distillation-phase batch;
//! - a [`PhaseState`] pair of step/epoch counters that select which of the
//!   three loss formulas is active.
//!
//! ## Phases
//!
//! ```text
//! epoch_count <= k          warm-up        hard-label cross-entropy
//! epoch_count >  k, KL      distillation   alpha*CE + (1-alpha)*tau^2*KL
//! epoch_count >  k, non-KL  retrospective  CE + (s+1)*L1(p, y) - s*L1(p, p_prev)
//! ```
//!
//! Evaluation calls are side-effect free: they never advance counters or
//! write the table.

mod config;
mod loss;
pub mod ops;
mod phase;
mod table;

pub use config::{LwrConfig, Mode};
pub use loss::{LwrLoss, LwrOutput};
pub use phase::{Phase, PhaseState};
pub use table::SoftLabelTable;
