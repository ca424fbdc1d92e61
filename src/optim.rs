//! Gradient descent over parameter views
//!
//! The model hands the optimizer flattened [`Param`] views each step, so the
//! optimizer never needs to know the layer structure.

use crate::model::Param;

/// Optimization algorithm updating parameters in place from their gradients
pub trait Optimizer {
    /// Apply one update step to every parameter view
    fn step(&mut self, params: &mut [Param<'_>]);

    /// Current learning rate
    fn lr(&self) -> f32;

    /// Override the learning rate, e.g. for a schedule
    fn set_lr(&mut self, lr: f32);
}

/// Stochastic gradient descent with optional classical momentum
///
/// With `momentum == 0.0` this is plain SGD. Otherwise each parameter keeps a
/// velocity `v = momentum * v - lr * g` and moves by `v`.
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Vec<f32>>>,
}

impl Sgd {
    /// Plain SGD at `lr`
    pub fn new(lr: f32) -> Self {
        Self::with_momentum(lr, 0.0)
    }

    /// SGD with classical momentum
    pub fn with_momentum(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [Param<'_>]) {
        if self.velocities.len() < params.len() {
            self.velocities.resize(params.len(), None);
        }

        for (param, velocity) in params.iter_mut().zip(self.velocities.iter_mut()) {
            if self.momentum > 0.0 {
                let v = velocity.get_or_insert_with(|| vec![0.0; param.data.len()]);
                for ((value, &grad), vel) in
                    param.data.iter_mut().zip(param.grad.iter()).zip(v.iter_mut())
                {
                    *vel = self.momentum * *vel - self.lr * grad;
                    *value += *vel;
                }
            } else {
                for (value, &grad) in param.data.iter_mut().zip(param.grad.iter()) {
                    *value -= self.lr * grad;
                }
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sgd_step_moves_against_gradient() {
        let mut data = vec![1.0, 2.0, 3.0];
        let grad = vec![0.5, -1.0, 0.0];
        let mut opt = Sgd::new(0.1);

        opt.step(&mut [Param {
            data: &mut data,
            grad: &grad,
        }]);

        assert_relative_eq!(data[0], 0.95);
        assert_relative_eq!(data[1], 2.1);
        assert_relative_eq!(data[2], 3.0);
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let mut data = vec![0.0];
        let grad = vec![1.0];
        let mut opt = Sgd::with_momentum(0.1, 0.9);

        // v1 = -0.1, x = -0.1
        opt.step(&mut [Param {
            data: &mut data,
            grad: &grad,
        }]);
        assert_relative_eq!(data[0], -0.1);

        // v2 = 0.9 * -0.1 - 0.1 = -0.19, x = -0.29
        opt.step(&mut [Param {
            data: &mut data,
            grad: &grad,
        }]);
        assert_relative_eq!(data[0], -0.29, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_momentum_keeps_no_state() {
        let mut data = vec![0.0];
        let grad = vec![1.0];
        let mut opt = Sgd::new(0.1);

        for _ in 0..2 {
            opt.step(&mut [Param {
                data: &mut data,
                grad: &grad,
            }]);
        }
        assert_relative_eq!(data[0], -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_set_lr() {
        let mut opt = Sgd::new(0.1);
        opt.set_lr(0.01);
        assert_relative_eq!(opt.lr(), 0.01);
    }
}
