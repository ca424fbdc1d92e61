//! Index-augmented dataset wrapper
//!
//! The LWR loss addresses per-sample historical state by a stable integer
//! index, so every batch carries the dataset positions of its rows alongside
//! the inputs and labels.

use crate::{Error, Result};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// In-memory classification dataset whose samples keep their position
#[derive(Debug, Clone)]
pub struct IndexedDataset {
    inputs: Array2<f32>,
    labels: Vec<usize>,
}

impl IndexedDataset {
    /// Wrap `(samples, features)` inputs and one label per row
    pub fn new(inputs: Array2<f32>, labels: Vec<usize>) -> Result<Self> {
        if inputs.nrows() != labels.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} input rows but {} labels",
                inputs.nrows(),
                labels.len()
            )));
        }
        Ok(Self { inputs, labels })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when the dataset holds no samples
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Feature count per sample
    pub fn num_features(&self) -> usize {
        self.inputs.ncols()
    }

    /// Number of batches an epoch consists of at `batch_size`, counting a
    /// trailing partial batch
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size)
    }

    /// Sequential batches in dataset order
    pub fn batches(&self, batch_size: usize) -> Vec<IndexedBatch> {
        let order: Vec<usize> = (0..self.len()).collect();
        self.batches_in_order(&order, batch_size)
    }

    /// Batches over a seeded random permutation of the samples
    pub fn shuffled_batches(&self, batch_size: usize, rng: &mut StdRng) -> Vec<IndexedBatch> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.batches_in_order(&order, batch_size)
    }

    fn batches_in_order(&self, order: &[usize], batch_size: usize) -> Vec<IndexedBatch> {
        order
            .chunks(batch_size.max(1))
            .map(|indices| IndexedBatch {
                indices: indices.to_vec(),
                inputs: self.inputs.select(Axis(0), indices),
                labels: indices.iter().map(|&i| self.labels[i]).collect(),
            })
            .collect()
    }
}

/// One training batch plus the dataset index of each row
#[derive(Debug, Clone)]
pub struct IndexedBatch {
    /// Dataset position of each row
    pub indices: Vec<usize>,
    /// Input features `(batch, features)`
    pub inputs: Array2<f32>,
    /// True class per row
    pub labels: Vec<usize>,
}

impl IndexedBatch {
    /// Number of samples in the batch
    pub fn size(&self) -> usize {
        self.indices.len()
    }
}
