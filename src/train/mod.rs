//! Training driver wiring the model, loss and optimizer together
//!
//! [`LwrTrainer`] owns the whole loop: it walks the indexed batches, forwards
//! the frozen snapshot when the retrospective loss needs it, backpropagates
//! the logits gradient and steps the optimizer. Evaluation goes through
//! [`LwrTrainer::evaluate`], which never touches the loss state.

mod config;
mod metrics;
mod trainer;

pub use config::TrainConfig;
pub use metrics::{accuracy, EvalReport};
pub use trainer::LwrTrainer;
