//! Classifier factory and MLP model
//!
//! A small fully connected classifier with ReLU hidden activations,
//! trained by explicit backpropagation from a logits gradient. The factory
//! sizes the final linear layer to the requested class count;
//! [`Classifier::replace_head`] swaps only that layer, preserving hidden
//! weights, the usual move when adapting a stock backbone to a new label
//! set.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Backbone description for [`build_classifier`]
///
/// Deterministic: the same config (including seed) always produces the same
/// initial weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackboneConfig {
    /// Flattened input feature count
    pub input_dim: usize,
    /// Hidden layer widths, in order
    pub hidden: Vec<usize>,
    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            // 32x32 RGB images, flattened
            input_dim: 3072,
            hidden: vec![256, 128],
            seed: 42,
        }
    }
}

/// A mutable view of one parameter array paired with its gradient,
/// consumed by the optimizer
pub struct Param<'a> {
    /// Flattened parameter values
    pub data: &'a mut [f32],
    /// Flattened accumulated gradient
    pub grad: &'a [f32],
}

/// Fully connected layer with accumulated gradients
#[derive(Debug, Clone)]
pub struct Linear {
    w: Array2<f32>,
    b: Array1<f32>,
    dw: Array2<f32>,
    db: Array1<f32>,
}

impl Linear {
    /// He-style initialization, matching the scale the MNIST demo uses
    fn new(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let scale = (2.0 / fan_in as f32).sqrt();
        let w = Array2::from_shape_fn((fan_in, fan_out), |_| {
            rng.random::<f32>() * scale - scale / 2.0
        });
        Self {
            w,
            b: Array1::zeros(fan_out),
            dw: Array2::zeros((fan_in, fan_out)),
            db: Array1::zeros(fan_out),
        }
    }

    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.w) + &self.b
    }

    /// Accumulate parameter gradients and return the input gradient
    fn backward(&mut self, x: &Array2<f32>, d_out: &Array2<f32>) -> Array2<f32> {
        self.dw = &self.dw + &x.t().dot(d_out);
        self.db = &self.db + &d_out.sum_axis(Axis(0));
        d_out.dot(&self.w.t())
    }

    fn zero_grad(&mut self) {
        self.dw.fill(0.0);
        self.db.fill(0.0);
    }

    fn params(&mut self) -> [Param<'_>; 2] {
        [
            Param {
                data: self.w.as_slice_mut().unwrap(),
                grad: self.dw.as_slice().unwrap(),
            },
            Param {
                data: self.b.as_slice_mut().unwrap(),
                grad: self.db.as_slice().unwrap(),
            },
        ]
    }
}

/// MLP classifier producing `(batch, num_classes)` logits
#[derive(Debug, Clone)]
pub struct Classifier {
    layers: Vec<Linear>,
    input_dim: usize,
    num_classes: usize,
}

impl Classifier {
    /// Expected input feature count
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Output class count
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Forward pass to logits
    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let (_, logits) = self.forward_cached(x);
        logits
    }

    /// Forward pass keeping each layer's input for backpropagation
    fn forward_cached(&self, x: &Array2<f32>) -> (Vec<Array2<f32>>, Array2<f32>) {
        let mut activations = Vec::with_capacity(self.layers.len());
        let mut current = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            activations.push(current.clone());
            current = layer.forward(&current);
            if i + 1 < self.layers.len() {
                current.mapv_inplace(|v| v.max(0.0));
            }
        }
        (activations, current)
    }

    /// Backpropagate a logits gradient, accumulating parameter gradients
    pub fn backward(&mut self, x: &Array2<f32>, d_logits: &Array2<f32>) {
        let (activations, _) = self.forward_cached(x);

        let mut d_current = d_logits.clone();
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            let input = &activations[i];
            let mut d_input = layer.backward(input, &d_current);
            if i > 0 {
                // The layer input was ReLU output; gate the gradient there.
                for (d, &a) in d_input.iter_mut().zip(input.iter()) {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                }
            }
            d_current = d_input;
        }
    }

    /// Clear accumulated gradients
    pub fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }

    /// Parameter/gradient views for the optimizer
    pub fn param_views(&mut self) -> Vec<Param<'_>> {
        self.layers.iter_mut().flat_map(Linear::params).collect()
    }

    /// Replace only the output layer, freshly initialized for a new class
    /// count; hidden weights are preserved
    pub fn replace_head(&mut self, num_classes: usize, seed: u64) {
        let fan_in = self
            .layers
            .last()
            .map_or(self.input_dim, |head| head.w.nrows());
        let mut rng = StdRng::seed_from_u64(seed);
        *self.layers.last_mut().unwrap() = Linear::new(fan_in, num_classes, &mut rng);
        self.num_classes = num_classes;
    }

    /// Frozen forward-only copy of the current parameters
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            model: self.clone(),
        }
    }
}

/// Immutable parameter copy from an earlier epoch
///
/// Produces the `previous_output` the retrospective loss compares against;
/// it exposes no way to mutate or train the captured weights.
#[derive(Debug, Clone)]
pub struct Snapshot {
    model: Classifier,
}

impl Snapshot {
    /// Forward pass with the frozen parameters
    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        self.model.forward(x)
    }
}

/// Build an MLP classifier with its output layer sized to `num_classes`
pub fn build_classifier(num_classes: usize, config: &BackboneConfig) -> Classifier {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut dims = vec![config.input_dim];
    dims.extend_from_slice(&config.hidden);
    dims.push(num_classes);

    let layers = dims
        .windows(2)
        .map(|pair| Linear::new(pair[0], pair[1], &mut rng))
        .collect();

    Classifier {
        layers,
        input_dim: config.input_dim,
        num_classes,
    }
}
