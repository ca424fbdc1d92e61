//! Per-sample soft-label storage

use super::ops;
use crate::{Error, Result};
use ndarray::{Array2, Axis};

/// Stored softened predictions, one row per dataset sample
///
/// Zero-initialized at construction; rows are overwritten in place with
/// `softmax(logits / tau)` at designated epoch boundaries and read back by
/// the distillation loss every batch afterwards. Owned exclusively by
/// [`LwrLoss`](super::LwrLoss) for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct SoftLabelTable {
    probs: Array2<f32>,
}

impl SoftLabelTable {
    /// Create an all-zeros table for `dataset_length` samples of
    /// `num_classes` classes
    pub fn new(dataset_length: usize, num_classes: usize) -> Self {
        Self {
            probs: Array2::zeros((dataset_length, num_classes)),
        }
    }

    /// Number of sample rows
    pub fn len(&self) -> usize {
        self.probs.nrows()
    }

    /// True when the table addresses no samples
    pub fn is_empty(&self) -> bool {
        self.probs.nrows() == 0
    }

    /// Overwrite the rows at `indices` with `softmax(logits / tau)`
    pub fn record(&mut self, indices: &[usize], logits: &Array2<f32>, tau: f32) -> Result<()> {
        self.check_batch(indices, logits)?;

        let soft = ops::softmax(&(logits / tau), Axis(1));
        for (row, &index) in indices.iter().enumerate() {
            self.probs.row_mut(index).assign(&soft.row(row));
        }
        Ok(())
    }

    /// Gather the stored rows for `indices` into a `(batch, classes)` array
    pub fn rows(&self, indices: &[usize]) -> Result<Array2<f32>> {
        for &index in indices {
            self.check_index(index)?;
        }
        Ok(self.probs.select(Axis(0), indices))
    }

    /// Full table view, for inspection in tests and diagnostics
    pub fn as_array(&self) -> &Array2<f32> {
        &self.probs
    }

    fn check_batch(&self, indices: &[usize], logits: &Array2<f32>) -> Result<()> {
        if logits.nrows() != indices.len() {
            return Err(Error::ShapeMismatch(format!(
                "logits have {} rows but {} sample indices were given",
                logits.nrows(),
                indices.len()
            )));
        }
        if logits.ncols() != self.probs.ncols() {
            return Err(Error::ShapeMismatch(format!(
                "logits have {} classes but the table stores {}",
                logits.ncols(),
                self.probs.ncols()
            )));
        }
        for &index in indices {
            self.check_index(index)?;
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.probs.nrows() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.probs.nrows(),
            });
        }
        Ok(())
    }
}
