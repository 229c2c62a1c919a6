//! Build and solve tests on random and hand-built bases.

mod common;

use std::sync::Arc;

use basis_factor::sparse::{basis_times, from_triplets, identity};
use basis_factor::{BasisFactor, FactorError, FactorSettings, PivotKind, ScatterVector};
use common::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn build(
    a: &Arc<basis_factor::SparseCsc>,
    basic_index: &mut Vec<usize>,
    settings: FactorSettings,
) -> BasisFactor {
    let mut factor = BasisFactor::setup(a.clone(), basic_index, settings).unwrap();
    let deficiency = factor.build(basic_index).unwrap();
    assert_eq!(deficiency, 0);
    factor
}

#[test]
fn test_random_bases_solve() {
    let mut rng = ChaCha8Rng::seed_from_u64(12345);
    for &(m, n, density) in &[(10, 15, 0.3), (40, 60, 0.08), (120, 150, 0.02)] {
        let a = Arc::new(random_lp(&mut rng, m, n, density));
        for structural in [0.0, 0.5, 1.0] {
            let mut basic_index = random_basis(&mut rng, &a, structural);
            let factor = build(&a, &mut basic_index, FactorSettings::default());

            let b = random_rhs(&mut rng, m);
            let x = ftran_dense(&factor, &b);
            assert!(ftran_residual(&a, &basic_index, &x, &b) < 1e-10);

            let y = btran_dense(&factor, &b);
            assert!(btran_residual(&a, &basic_index, &y, &b) < 1e-10);
        }
    }
}

#[test]
fn test_refined_search_logic_solves() {
    let mut rng = ChaCha8Rng::seed_from_u64(777);
    let a = Arc::new(random_lp(&mut rng, 50, 50, 0.15));
    let mut basic_index = random_basis(&mut rng, &a, 0.9);
    let settings = FactorSettings {
        use_original_logic: false,
        search_limit: 4,
        ..Default::default()
    };
    let factor = build(&a, &mut basic_index, settings);

    let b = random_rhs(&mut rng, 50);
    let x = ftran_dense(&factor, &b);
    assert!(ftran_residual(&a, &basic_index, &x, &b) < 1e-10);
}

#[test]
fn test_identity_then_replace_column() {
    // Column 3 = [2, 1, 0] enters in place of column 0
    let a = Arc::new(from_triplets(
        3,
        4,
        vec![(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0), (0, 3, 2.0), (1, 3, 1.0)],
    ));
    for method in basis_factor::UpdateMethod::ALL {
        let mut basic_index = vec![0, 1, 2];
        let mut factor = build(&a, &mut basic_index, FactorSettings::with_method(method));
        assert_eq!(basic_index, vec![0, 1, 2]);

        let mut aq = ScatterVector::from_dense(&[2.0, 1.0, 0.0]);
        aq.pack_flag = true;
        factor.ftran(&mut aq, 1.0, None).unwrap();
        assert_eq!(aq.to_dense(), vec![2.0, 1.0, 0.0]);

        let mut ep = ScatterVector::unit(3, 0);
        ep.pack_flag = true;
        factor.btran(&mut ep, 1.0, None).unwrap();

        let change = basis_factor::BasisChange { row_out: 0, variable_in: 3 };
        factor.update(&aq, &ep, change, &mut basic_index).unwrap();
        assert_eq!(basic_index, vec![3, 1, 2]);

        let x = ftran_dense(&factor, &[1.0, 0.0, 0.0]);
        for (value, expected) in x.iter().zip([0.5, -0.5, 0.0]) {
            assert!((value - expected).abs() < 1e-14, "{}: {:?}", method, x);
        }
        let y = btran_dense(&factor, &[1.0, 0.0, 0.0]);
        for (value, expected) in y.iter().zip([0.5, 0.0, 0.0]) {
            assert!((value - expected).abs() < 1e-14, "{}: {:?}", method, y);
        }
    }
}

#[test]
fn test_duplicate_column_is_rank_deficient() {
    // Columns 0 and 2 are equal
    let a = Arc::new(from_triplets(
        3,
        3,
        vec![
            (0, 0, 1.0),
            (1, 0, 1.0),
            (1, 1, 1.0),
            (2, 1, 1.0),
            (0, 2, 1.0),
            (1, 2, 1.0),
        ],
    ));
    let mut basic_index = vec![0, 1, 2];
    let mut factor =
        BasisFactor::setup(a.clone(), &basic_index, FactorSettings::default()).unwrap();
    assert_eq!(factor.build(&mut basic_index).unwrap(), 1);

    let deficiency = factor.rank_deficiency();
    assert_eq!(deficiency.degree(), 1);
    assert_eq!(deficiency.row_with_no_pivot.len(), 1);
    assert_eq!(deficiency.col_with_no_pivot.len(), 1);
    let dropped = deficiency.var_with_no_pivot[0];
    assert!(dropped == 0 || dropped == 2);

    // The dropped column is replaced by the logical of the unpivoted row
    let row = deficiency.row_with_no_pivot[0];
    assert!(basic_index.contains(&(3 + row)));
    assert!(!basic_index.contains(&dropped));

    let b = [1.0, -2.0, 0.5];
    let x = ftran_dense(&factor, &b);
    assert!(ftran_residual(&a, &basic_index, &x, &b) < 1e-12);
}

#[test]
fn test_zero_column_is_rank_deficient() {
    let a = Arc::new(from_triplets(2, 2, vec![(0, 0, 3.0)]));
    let mut basic_index = vec![0, 1];
    let mut factor =
        BasisFactor::setup(a.clone(), &basic_index, FactorSettings::default()).unwrap();
    assert_eq!(factor.build(&mut basic_index).unwrap(), 1);
    assert_eq!(factor.rank_deficiency().var_with_no_pivot, vec![1]);
    assert_eq!(basic_index, vec![0, 3]);
}

#[test]
fn test_rebuild_is_identical() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let a = Arc::new(random_lp(&mut rng, 60, 80, 0.06));
    let mut basic_index = random_basis(&mut rng, &a, 0.7);
    let mut factor = build(&a, &mut basic_index, FactorSettings::default());

    let first_index = basic_index.clone();
    let view = factor.view();
    let first = (
        view.l_pivot_index().to_vec(),
        view.l_start().to_vec(),
        view.l_index().to_vec(),
        view.l_value().to_vec(),
        view.u_pivot_index().to_vec(),
        view.u_pivot_value().to_vec(),
        view.u_index().to_vec(),
        view.u_value().to_vec(),
    );

    factor.build(&mut basic_index).unwrap();
    assert_eq!(basic_index, first_index);
    let view = factor.view();
    assert_eq!(view.l_pivot_index(), first.0.as_slice());
    assert_eq!(view.l_start(), first.1.as_slice());
    assert_eq!(view.l_index(), first.2.as_slice());
    assert_eq!(view.l_value(), first.3.as_slice());
    assert_eq!(view.u_pivot_index(), first.4.as_slice());
    assert_eq!(view.u_pivot_value(), first.5.as_slice());
    assert_eq!(view.u_index(), first.6.as_slice());
    assert_eq!(view.u_value(), first.7.as_slice());
}

#[test]
fn test_refactor_info_replay() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let a = Arc::new(random_lp(&mut rng, 30, 40, 0.1));
    let mut basic_index = random_basis(&mut rng, &a, 0.6);
    let factor = build(&a, &mut basic_index, FactorSettings::default());
    let info = factor.refactor_info().clone();
    assert!(info.use_info);
    assert_eq!(info.len(), 30);
    assert!(info.pivot_kind.iter().any(|&kind| kind == PivotKind::Logical));

    // A second engine replays the recorded pivots
    let mut replay_index = basic_index.clone();
    let mut replayed =
        BasisFactor::setup(a.clone(), &replay_index, FactorSettings::default()).unwrap();
    replayed.set_refactor_info(info);
    replayed.build(&mut replay_index).unwrap();
    assert_eq!(replay_index, basic_index);
    assert_eq!(replayed.view().u_pivot_value(), factor.view().u_pivot_value());

    let b = random_rhs(&mut rng, 30);
    let x = ftran_dense(&replayed, &b);
    assert!(ftran_residual(&a, &replay_index, &x, &b) < 1e-10);
}

#[test]
fn test_refactor_info_mismatch_falls_back() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let a = Arc::new(random_lp(&mut rng, 20, 30, 0.15));
    let mut basic_index: Vec<usize> = (0..20).collect();
    let factor = build(&a, &mut basic_index, FactorSettings::default());
    let info = factor.refactor_info().clone();

    // Recorded for a structural basis, applied to the slack basis
    let mut slack_index: Vec<usize> = (30..50).collect();
    let mut other = BasisFactor::setup(a.clone(), &slack_index, FactorSettings::default()).unwrap();
    other.set_refactor_info(info);
    assert_eq!(other.build(&mut slack_index).unwrap(), 0);
    assert!(other.refactor_info().pivot_var.iter().all(|&var| var >= 30));

    let b = random_rhs(&mut rng, 20);
    let x = ftran_dense(&other, &b);
    assert!(ftran_residual(&a, &slack_index, &x, &b) < 1e-12);
}

#[test]
fn test_rebuild_after_new_values_rejects_small_replay_pivot() {
    let a1 = Arc::new(from_triplets(
        2,
        2,
        vec![(0, 0, 4.0), (1, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)],
    ));
    let a2 = Arc::new(from_triplets(
        2,
        2,
        vec![(0, 0, 1e-9), (1, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)],
    ));
    let mut basic_index = vec![0, 1];
    let mut factor = build(&a1, &mut basic_index, FactorSettings::default());
    assert!(factor.refactor_info().use_info);

    // Same pattern, new values: the recorded pivot on a[0][0] is now tiny
    factor.setup_matrix(a2.clone());
    assert!(factor.matrix_is_valid());
    let mut fresh_index = basic_index.clone();
    assert_eq!(factor.build(&mut basic_index).unwrap(), 0);

    let fresh = build(&a2, &mut fresh_index, FactorSettings::default());
    assert_eq!(basic_index, fresh_index);
    assert_eq!(factor.view().u_pivot_value(), fresh.view().u_pivot_value());
    assert!(factor.view().u_pivot_value().iter().all(|v| v.abs() > 0.5));

    let b = [1.0, 2.0];
    let x = ftran_dense(&factor, &b);
    assert!(ftran_residual(&a2, &basic_index, &x, &b) < 1e-12);
}

#[test]
fn test_zero_time_limit() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let a = Arc::new(random_lp(&mut rng, 10, 10, 0.3));
    let mut basic_index: Vec<usize> = (0..10).collect();
    let settings = FactorSettings {
        build_time_limit_ms: Some(0),
        ..Default::default()
    };
    let mut factor = BasisFactor::setup(a, &basic_index, settings).unwrap();
    assert_eq!(
        factor.build(&mut basic_index),
        Err(FactorError::TimeLimit { limit_ms: 0 })
    );
    assert!(!factor.is_built());
    let mut x = ScatterVector::new(10);
    assert_eq!(factor.ftran(&mut x, 1.0, None), Err(FactorError::NotBuilt));
}

#[test]
fn test_hyper_sparse_matches_dense_solve() {
    let mut rng = ChaCha8Rng::seed_from_u64(31337);
    let a = Arc::new(random_lp(&mut rng, 200, 200, 0.005));
    let mut basic_index = random_basis(&mut rng, &a, 0.8);
    let factor = build(&a, &mut basic_index, FactorSettings::default());

    for row in [0, 17, 199] {
        // A tiny expected density selects the hyper-sparse traversal
        let mut sparse = ScatterVector::unit(200, row);
        factor.ftran(&mut sparse, 1e-4, None).unwrap();
        let mut dense = ScatterVector::unit(200, row);
        factor.ftran(&mut dense, 1.0, None).unwrap();
        for i in 0..200 {
            assert!((sparse.value(i) - dense.value(i)).abs() < 1e-13);
        }

        let mut sparse = ScatterVector::unit(200, row);
        factor.btran(&mut sparse, 1e-4, None).unwrap();
        let mut dense = ScatterVector::unit(200, row);
        factor.btran(&mut dense, 1.0, None).unwrap();
        for i in 0..200 {
            assert!((sparse.value(i) - dense.value(i)).abs() < 1e-13);
        }
    }
}

#[test]
fn test_solve_with_unit_matrix() {
    let a = Arc::new(identity(4));
    let mut basic_index = vec![0, 5, 2, 7];
    let factor = build(&a, &mut basic_index, FactorSettings::default());
    let b = [1.0, 2.0, 3.0, 4.0];
    let x = ftran_dense(&factor, &b);
    let bx = basis_times(&a, &basic_index, &x);
    assert_eq!(bx, b.to_vec());
}
