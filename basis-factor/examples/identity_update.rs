//! Basis change on a 3x3 identity basis.
//!
//! Starts from B = I, brings in the column a = [2, 1, 0] in place of
//! column 0 and solves with the updated basis:
//!
//!   B' = [2 0 0]    B' x = [1 0 0]  gives  x = [0.5, -0.5, 0]
//!        [1 1 0]
//!        [0 0 1]
//!
//! The same result is printed for every update method.

use std::sync::Arc;

use basis_factor::sparse::from_triplets;
use basis_factor::{
    BasisChange, BasisFactor, FactorError, FactorSettings, ScatterVector, UpdateMethod,
};

fn main() -> Result<(), FactorError> {
    println!("Basis Factor - Identity Update Example");
    println!("======================================");
    println!();

    // Columns 0..3 form the identity, column 3 is the entering column
    let a = Arc::new(from_triplets(
        3,
        4,
        vec![
            (0, 0, 1.0),
            (1, 1, 1.0),
            (2, 2, 1.0),
            (0, 3, 2.0), // a_3 = [2, 1, 0]
            (1, 3, 1.0),
        ],
    ));

    for method in UpdateMethod::ALL {
        let mut basic_index = vec![0, 1, 2];
        let settings = FactorSettings::with_method(method);
        let mut factor = BasisFactor::setup(a.clone(), &basic_index, settings)?;
        factor.build(&mut basic_index)?;

        // Entering column in the current basis: B^{-1} a_3
        let mut aq = ScatterVector::from_dense(&[2.0, 1.0, 0.0]);
        aq.pack_flag = true;
        factor.ftran(&mut aq, 1.0, None)?;

        // Pivotal row: B^{-T} e_0
        let mut ep = ScatterVector::unit(3, 0);
        ep.pack_flag = true;
        factor.btran(&mut ep, 1.0, None)?;

        let change = BasisChange { row_out: 0, variable_in: 3 };
        let hint = factor.update(&aq, &ep, change, &mut basic_index)?;

        let mut x = ScatterVector::from_dense(&[1.0, 0.0, 0.0]);
        factor.ftran(&mut x, 1.0, None)?;
        println!(
            "{:<24} basis {:?}  x = {:?}  ({:?})",
            method.to_string(),
            basic_index,
            x.to_dense(),
            hint
        );
    }
    Ok(())
}
