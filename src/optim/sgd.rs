//! Stochastic Gradient Descent optimizer

use super::optimizer::{Optimizer, ParamGroup};
use crate::model::{Param, ParamId};
use ndarray::Array2;
use std::collections::HashMap;

/// SGD optimizer with momentum and L2 weight decay
///
/// Update rule per registered parameter (heavy-ball, no dampening):
///
/// ```text
/// g = grad + weight_decay * w
/// v = momentum * v + g
/// w = w - lr * v
/// ```
///
/// Pruned entries have their gradient, velocity and value held at zero.
pub struct SGD {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    groups: Vec<ParamGroup>,
    velocities: HashMap<ParamId, Array2<f32>>,
}

impl SGD {
    /// Create a new SGD optimizer with no parameter groups
    pub fn new(lr: f32, momentum: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            momentum,
            weight_decay,
            groups: Vec::new(),
            velocities: HashMap::new(),
        }
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [&mut Param]) {
        for param in params.iter_mut() {
            let Some(lr) = self.group_of(param.id()).map(ParamGroup::lr) else {
                continue;
            };
            param.enforce_mask();

            let mut update = param.grad().clone();
            if self.weight_decay > 0.0 {
                update.scaled_add(self.weight_decay, param.value());
            }
            if self.momentum > 0.0 {
                let velocity = self
                    .velocities
                    .entry(param.id())
                    .or_insert_with(|| Array2::zeros(update.raw_dim()));
                velocity.mapv_inplace(|v| v * self.momentum);
                *velocity += &update;
                if let Some(mask) = param.mask() {
                    *velocity *= mask;
                }
                update.assign(velocity);
            }

            param.value_mut().scaled_add(-lr, &update);
            param.enforce_mask();
        }
    }

    fn add_param_group(&mut self, params: Vec<ParamId>) {
        self.groups.push(ParamGroup::new(params, self.lr));
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn lr(&self) -> f32 {
        self.groups.first().map_or(self.lr, ParamGroup::lr)
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
        for group in &mut self.groups {
            group.set_lr(lr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn param(id: usize, values: Array2<f32>) -> Param {
        Param::new(ParamId(id), values, true)
    }

    #[test]
    fn test_sgd_plain_update() {
        let mut opt = SGD::new(0.1, 0.0, 0.0);
        let mut p = param(0, array![[1.0, 2.0]]);
        opt.add_param_group(vec![p.id()]);
        p.accumulate_grad(&array![[0.5, 1.0]]).unwrap();

        opt.step(&mut [&mut p]);

        assert_relative_eq!(p.value()[[0, 0]], 0.95, epsilon = 1e-6);
        assert_relative_eq!(p.value()[[0, 1]], 1.9, epsilon = 1e-6);
    }

    #[test]
    fn test_sgd_skips_unregistered_params() {
        let mut opt = SGD::new(0.1, 0.9, 0.0);
        let mut registered = param(0, array![[1.0]]);
        let mut frozen = param(1, array![[1.0]]);
        opt.add_param_group(vec![registered.id()]);
        registered.accumulate_grad(&array![[1.0]]).unwrap();
        frozen.accumulate_grad(&array![[1.0]]).unwrap();

        opt.step(&mut [&mut registered, &mut frozen]);

        assert_relative_eq!(registered.value()[[0, 0]], 0.9, epsilon = 1e-6);
        assert_eq!(frozen.value()[[0, 0]], 1.0);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let mut opt = SGD::new(0.1, 0.9, 0.0);
        let mut p = param(0, array![[0.0]]);
        opt.add_param_group(vec![p.id()]);

        p.accumulate_grad(&array![[1.0]]).unwrap();
        opt.step(&mut [&mut p]);
        assert_relative_eq!(p.value()[[0, 0]], -0.1, epsilon = 1e-6);

        // same gradient again: v = 0.9 * 1 + 1 = 1.9
        opt.step(&mut [&mut p]);
        assert_relative_eq!(p.value()[[0, 0]], -0.29, epsilon = 1e-6);
    }

    #[test]
    fn test_sgd_weight_decay() {
        let mut opt = SGD::new(0.1, 0.0, 0.5);
        let mut p = param(0, array![[2.0]]);
        opt.add_param_group(vec![p.id()]);
        opt.step(&mut [&mut p]);
        // g = 0 + 0.5 * 2 = 1
        assert_relative_eq!(p.value()[[0, 0]], 1.9, epsilon = 1e-6);
    }

    #[test]
    fn test_sgd_keeps_pruned_weights_at_zero() {
        let mut opt = SGD::new(0.1, 0.9, 1e-3);
        let mut p = param(0, array![[1.0, 1.0]]);
        opt.add_param_group(vec![p.id()]);
        p.apply_mask(&array![[1.0, 0.0]]).unwrap();
        for _ in 0..3 {
            p.zero_grad();
            p.accumulate_grad(&array![[1.0, 1.0]]).unwrap();
            opt.step(&mut [&mut p]);
        }
        assert_eq!(p.value()[[0, 1]], 0.0);
        assert!(p.value()[[0, 0]] < 1.0);
    }

    #[test]
    fn test_new_group_keeps_existing_groups() {
        let mut opt = SGD::new(0.1, 0.0, 0.0);
        opt.add_param_group(vec![ParamId(0), ParamId(1)]);
        opt.set_lr(0.01);
        opt.add_param_group(vec![ParamId(2)]);

        assert_eq!(opt.param_groups().len(), 2);
        assert_eq!(opt.param_groups()[0].len(), 2);
        assert_eq!(opt.group_of(ParamId(2)).map(ParamGroup::lr), Some(0.01));
        assert_eq!(opt.lr(), 0.01);
    }

    #[test]
    fn test_zero_grad_refs() {
        let mut opt = SGD::new(0.1, 0.0, 0.0);
        let mut p = param(0, array![[1.0]]);
        p.accumulate_grad(&array![[3.0]]).unwrap();
        opt.zero_grad(&mut [&mut p]);
        assert_eq!(p.grad()[[0, 0]], 0.0);
    }
}
