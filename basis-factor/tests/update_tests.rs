//! Update tests: every method against a fresh build of the same basis.

mod common;

use std::sync::Arc;

use basis_factor::sparse::{for_each_basic_entry, from_triplets};
use basis_factor::{
    BasisChange, BasisFactor, FactorSettings, ScatterVector, UpdateHint, UpdateMethod,
};
use common::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn assert_same_solution(
    updated: &BasisFactor,
    updated_index: &[usize],
    fresh: &BasisFactor,
    fresh_index: &[usize],
    b: &[f64],
) {
    let x = solution_by_variable(updated_index, &ftran_dense(updated, b));
    let x_fresh = solution_by_variable(fresh_index, &ftran_dense(fresh, b));
    for (var, value) in &x_fresh {
        assert!((x[var] - value).abs() < 1e-9, "variable {}: {} vs {}", var, x[var], value);
    }
}

fn run_updates(method: UpdateMethod, pack: bool, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (m, n) = (40, 60);
    let a = Arc::new(random_lp(&mut rng, m, n, 0.08));
    let mut basic_index = random_basis(&mut rng, &a, 0.5);
    let settings = FactorSettings {
        fill_factor: 100.0,
        ..FactorSettings::with_method(method)
    };
    let mut factor = BasisFactor::setup(a.clone(), &basic_index, settings).unwrap();
    factor.build(&mut basic_index).unwrap();

    for step in 1..=15 {
        let variable_in = random_nonbasic(&mut rng, &a, &basic_index);
        let hint = swap_in(&mut factor, &a, variable_in, &mut basic_index, pack);
        assert_eq!(hint, UpdateHint::Ok, "{} step {}", method, step);
        assert!(basic_index.contains(&variable_in));
        assert_eq!(factor.update_count(), step);

        let b = random_rhs(&mut rng, m);
        let x = ftran_dense(&factor, &b);
        assert!(ftran_residual(&a, &basic_index, &x, &b) < 1e-9, "{} step {}", method, step);
        let y = btran_dense(&factor, &b);
        assert!(btran_residual(&a, &basic_index, &y, &b) < 1e-9, "{} step {}", method, step);
    }

    let mut fresh_index = basic_index.clone();
    let mut fresh =
        BasisFactor::setup(a.clone(), &fresh_index, FactorSettings::with_method(method)).unwrap();
    assert_eq!(fresh.build(&mut fresh_index).unwrap(), 0);
    let b = random_rhs(&mut rng, m);
    assert_same_solution(&factor, &basic_index, &fresh, &fresh_index, &b);
}

#[test]
fn test_sequential_updates_all_methods() {
    for (seed, method) in UpdateMethod::ALL.into_iter().enumerate() {
        run_updates(method, false, 100 + seed as u64);
    }
}

#[test]
fn test_sequential_updates_with_packed_vectors() {
    for (seed, method) in UpdateMethod::ALL.into_iter().enumerate() {
        run_updates(method, true, 200 + seed as u64);
    }
}

#[test]
fn test_update_then_rebuild() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let a = Arc::new(random_lp(&mut rng, 25, 35, 0.12));
    for method in UpdateMethod::ALL {
        let mut basic_index: Vec<usize> = (35..60).collect();
        let settings = FactorSettings::with_method(method);
        let mut factor = BasisFactor::setup(a.clone(), &basic_index, settings).unwrap();
        factor.build(&mut basic_index).unwrap();
        for _ in 0..5 {
            let variable_in = random_nonbasic(&mut rng, &a, &basic_index);
            swap_in(&mut factor, &a, variable_in, &mut basic_index, true);
        }
        assert!(factor.refactor_info().is_empty());

        factor.build(&mut basic_index).unwrap();
        assert_eq!(factor.update_count(), 0);
        let b = random_rhs(&mut rng, 25);
        let x = ftran_dense(&factor, &b);
        assert!(ftran_residual(&a, &basic_index, &x, &b) < 1e-10);
    }
}

#[test]
fn test_zero_pivot_is_rejected() {
    // Column 3 = [0, 1, 1] has no entry in row 0
    let a = Arc::new(from_triplets(
        3,
        4,
        vec![(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0), (1, 3, 1.0), (2, 3, 1.0)],
    ));
    for method in UpdateMethod::ALL {
        let mut basic_index = vec![0, 1, 2];
        let settings = FactorSettings::with_method(method);
        let mut factor = BasisFactor::setup(a.clone(), &basic_index, settings).unwrap();
        factor.build(&mut basic_index).unwrap();
        let before = factor.view().u_value().to_vec();

        let mut aq = ScatterVector::new(3);
        for_each_basic_entry(&a, 3, |row, value| aq.add(row, value));
        factor.ftran(&mut aq, 1.0, None).unwrap();
        let mut ep = ScatterVector::unit(3, 0);
        factor.btran(&mut ep, 1.0, None).unwrap();

        let change = BasisChange { row_out: 0, variable_in: 3 };
        let hint = factor.update(&aq, &ep, change, &mut basic_index).unwrap();
        assert_eq!(hint, UpdateHint::RejectPivot);
        assert_eq!(basic_index, vec![0, 1, 2]);
        assert_eq!(factor.update_count(), 0);
        assert_eq!(factor.view().u_value(), before.as_slice());
        assert!(!factor.refactor_info().is_empty());
    }
}

#[test]
fn test_update_limit_suggests_refactor() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let a = Arc::new(random_lp(&mut rng, 20, 30, 0.1));
    let settings = FactorSettings {
        update_limit: 3,
        ..FactorSettings::with_method(UpdateMethod::ProductForm)
    };
    let mut basic_index: Vec<usize> = (30..50).collect();
    let mut factor = BasisFactor::setup(a.clone(), &basic_index, settings).unwrap();
    factor.build(&mut basic_index).unwrap();

    let mut hints = Vec::new();
    for _ in 0..3 {
        let variable_in = random_nonbasic(&mut rng, &a, &basic_index);
        hints.push(swap_in(&mut factor, &a, variable_in, &mut basic_index, false));
    }
    assert_eq!(hints, vec![UpdateHint::Ok, UpdateHint::Ok, UpdateHint::RefactorSuggested]);
}

#[test]
fn test_update_before_build_fails() {
    let a = Arc::new(from_triplets(2, 2, vec![(0, 0, 1.0), (1, 1, 1.0)]));
    let mut basic_index = vec![0, 1];
    let mut factor = BasisFactor::setup(a, &basic_index, FactorSettings::default()).unwrap();
    let aq = ScatterVector::unit(2, 0);
    let ep = ScatterVector::unit(2, 0);
    let change = BasisChange { row_out: 0, variable_in: 2 };
    assert!(factor.update(&aq, &ep, change, &mut basic_index).is_err());
}

#[test]
fn test_entering_candidates_have_entries() {
    // Columns 1 and 3 are empty and can never enter
    let a = Arc::new(from_triplets(2, 4, vec![(0, 0, 1.0), (1, 2, 1.0)]));
    let basic_index = vec![4, 5];
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..50 {
        let var = random_nonbasic(&mut rng, &a, &basic_index);
        assert!(var == 0 || var == 2, "drew {}", var);
    }
}
