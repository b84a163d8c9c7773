//! Tests for learning rate schedulers

use super::*;
use crate::optim::{Optimizer, SGD};
use approx::assert_abs_diff_eq;

#[test]
fn test_step_decay_initial_lr() {
    let scheduler = StepDecayLR::new(0.1, 10, 0.5);
    assert_abs_diff_eq!(scheduler.get_lr(), 0.1, epsilon = 1e-6);
}

#[test]
fn test_step_decay_after_step_size() {
    let mut scheduler = StepDecayLR::new(0.1, 3, 0.5);
    for _ in 0..3 {
        scheduler.step();
    }
    assert_abs_diff_eq!(scheduler.get_lr(), 0.05, epsilon = 1e-6);
    for _ in 0..3 {
        scheduler.step();
    }
    assert_abs_diff_eq!(scheduler.get_lr(), 0.025, epsilon = 1e-6);
}

#[test]
fn test_constant_schedule_never_decays() {
    let mut scheduler = StepDecayLR::constant(0.1);
    assert_eq!(scheduler.period(), 0);
    scheduler.step();
    scheduler.step();
    assert_abs_diff_eq!(scheduler.get_lr(), 0.1, epsilon = 1e-6);
}

#[test]
fn test_multi_step_drops_at_milestone() {
    // epoch-start stepping: epochs 1..=3 at 0.1, epoch 4 onward at 0.01
    let mut scheduler = MultiStepLR::new(0.1, vec![4], vec![0.1]).unwrap();
    let mut lrs = Vec::new();
    for _ in 0..5 {
        scheduler.step();
        lrs.push(scheduler.get_lr());
    }
    assert_abs_diff_eq!(lrs[0], 0.1, epsilon = 1e-7);
    assert_abs_diff_eq!(lrs[2], 0.1, epsilon = 1e-7);
    assert_abs_diff_eq!(lrs[3], 0.01, epsilon = 1e-7);
    assert_abs_diff_eq!(lrs[4], 0.01, epsilon = 1e-7);
}

#[test]
fn test_multi_step_compounds_gammas() {
    let mut scheduler = MultiStepLR::new(1.0, vec![1, 2], vec![0.5, 0.2]).unwrap();
    scheduler.step();
    scheduler.step();
    assert_abs_diff_eq!(scheduler.get_lr(), 0.1, epsilon = 1e-6);
    assert_eq!(scheduler.state().last_epoch, 2);
}

#[test]
fn test_multi_step_rejects_mismatched_lists() {
    let err = MultiStepLR::new(0.1, vec![2, 4], vec![0.1]).unwrap_err();
    assert!(err.is_config_error());
    assert!(MultiStepLR::new(0.1, vec![4, 2], vec![0.1, 0.1]).is_err());
}

#[test]
fn test_apply_sets_optimizer_lr() {
    let mut scheduler = MultiStepLR::new(0.1, vec![1], vec![0.5]).unwrap();
    let mut opt = SGD::new(0.1, 0.9, 0.0);
    opt.add_param_group(vec![crate::model::ParamId(0)]);
    scheduler.step();
    scheduler.apply(&mut opt);
    assert_abs_diff_eq!(opt.lr(), 0.05, epsilon = 1e-7);
}

#[test]
fn test_state_reports_current_lr() {
    let mut scheduler = StepDecayLR::new(0.2, 1, 0.5);
    scheduler.step();
    let state = scheduler.state();
    assert_eq!(state.last_epoch, 1);
    assert_abs_diff_eq!(state.lr, 0.1, epsilon = 1e-7);
}
