//! Benchmarking CLI for basis-factor.
//!
//! Builds the slack basis of a random sparse LP, then drives it through a
//! run of simplex-style basis changes with each update method.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use basis_factor::sparse::{basis_times, for_each_basic_entry, from_triplets};
use basis_factor::{
    BasisChange, BasisFactor, FactorSettings, FactorTimers, ScatterVector, SparseCsc, UpdateHint,
    UpdateMethod,
};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Parser, Debug)]
#[command(
    name = "basis-bench",
    about = "Time basis factorization, solves and updates on a random LP"
)]
struct Cli {
    /// Number of rows
    #[arg(long, default_value_t = 500)]
    rows: usize,

    /// Number of structural columns
    #[arg(long, default_value_t = 1000)]
    cols: usize,

    /// Probability that an off-diagonal entry is nonzero
    #[arg(long, default_value_t = 0.01)]
    density: f64,

    /// Number of basis changes to perform
    #[arg(long, default_value_t = 200)]
    updates: usize,

    /// Update method
    #[arg(long, value_enum, default_value_t = MethodChoice::All)]
    method: MethodChoice,

    /// Random seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodChoice {
    Ft,
    Pf,
    Mpf,
    Apf,
    All,
}

impl MethodChoice {
    fn methods(self) -> Vec<UpdateMethod> {
        match self {
            MethodChoice::Ft => vec![UpdateMethod::ForrestTomlin],
            MethodChoice::Pf => vec![UpdateMethod::ProductForm],
            MethodChoice::Mpf => vec![UpdateMethod::MultipleProductForm],
            MethodChoice::Apf => vec![UpdateMethod::AlternateProductForm],
            MethodChoice::All => UpdateMethod::ALL.to_vec(),
        }
    }
}

/// Generate a random constraint matrix. Column `j < m` carries a dominant
/// diagonal entry so the leading columns can always be made basic.
fn generate_random_lp(m: usize, n: usize, density: f64, rng: &mut ChaCha8Rng) -> SparseCsc {
    let mut triplets = Vec::new();
    for j in 0..n {
        let mut off_diagonal = 0.0;
        for i in 0..m {
            if i != j && rng.gen_bool(density) {
                let val: f64 = rng.gen_range(-1.0..1.0);
                off_diagonal += val.abs();
                triplets.push((i, j, val));
            }
        }
        if j < m {
            triplets.push((j, j, off_diagonal + 1.0));
        }
    }
    from_triplets(m, n, triplets)
}

#[derive(Debug, Default)]
struct RunStats {
    num_build: usize,
    num_update: usize,
    num_reject: usize,
    build_seconds: f64,
    update_seconds: f64,
    max_residual: f64,
}

fn residual(a: &SparseCsc, basic_index: &[usize], x: &[f64], b: &[f64]) -> f64 {
    let bx = basis_times(a, basic_index, x);
    bx.iter().zip(b).fold(0.0_f64, |m, (u, v)| m.max((u - v).abs()))
}

fn run_method(
    cli: &Cli,
    a: &Arc<SparseCsc>,
    method: UpdateMethod,
) -> Result<(RunStats, FactorTimers)> {
    let (m, n) = (cli.rows, cli.cols);
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed.wrapping_add(1));
    let mut basic_index: Vec<usize> = (n..n + m).collect();
    let settings = FactorSettings::with_method(method);
    let mut factor =
        BasisFactor::setup(a.clone(), &basic_index, settings).context("factor setup")?;
    let mut timers = FactorTimers::default();
    let mut stats = RunStats::default();

    let rebuild = |factor: &mut BasisFactor,
                   basic_index: &mut Vec<usize>,
                   stats: &mut RunStats|
     -> Result<()> {
        let start = Instant::now();
        let deficiency = factor.build(basic_index).context("build")?;
        stats.build_seconds += start.elapsed().as_secs_f64();
        stats.num_build += 1;
        if deficiency > 0 {
            info!("{}: build reported rank deficiency {}", method, deficiency);
        }
        Ok(())
    };
    rebuild(&mut factor, &mut basic_index, &mut stats)?;

    let density_estimate = 10.0 / m as f64;
    for iter in 0..cli.updates {
        let variable_in = loop {
            let var = rng.gen_range(0..n + m);
            if !basic_index.contains(&var) {
                break var;
            }
        };

        let mut aq = ScatterVector::new(m);
        for_each_basic_entry(a, variable_in, |row, value| aq.add(row, value));
        aq.pack_flag = true;
        factor.ftran(&mut aq, density_estimate, Some(&mut timers))?;

        let largest = (0..m).max_by(|&i, &j| aq.value(i).abs().total_cmp(&aq.value(j).abs()));
        let Some(row_out) = largest else {
            bail!("empty basis");
        };
        let mut ep = ScatterVector::unit(m, row_out);
        ep.pack_flag = true;
        factor.btran(&mut ep, density_estimate, Some(&mut timers))?;

        let start = Instant::now();
        let hint = factor.update(&aq, &ep, BasisChange { row_out, variable_in }, &mut basic_index)?;
        stats.update_seconds += start.elapsed().as_secs_f64();
        match hint {
            UpdateHint::Ok => stats.num_update += 1,
            UpdateHint::RefactorSuggested => {
                stats.num_update += 1;
                debug!(
                    "{}: refactor after {} updates at iteration {}",
                    method,
                    factor.update_count(),
                    iter
                );
                rebuild(&mut factor, &mut basic_index, &mut stats)?;
            }
            UpdateHint::RejectPivot => {
                stats.num_reject += 1;
                rebuild(&mut factor, &mut basic_index, &mut stats)?;
            }
        }

        let b: Vec<f64> = (0..m).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut x = ScatterVector::from_dense(&b);
        factor.ftran(&mut x, 1.0, Some(&mut timers))?;
        stats.max_residual = stats.max_residual.max(residual(a, &basic_index, x.array(), &b));
    }

    timers.merge(factor.timers());
    Ok((stats, timers))
}

fn report(method: UpdateMethod, stats: &RunStats, timers: &FactorTimers) {
    println!("\n{}", "=".repeat(60));
    println!("{}", method);
    println!("{}", "=".repeat(60));
    println!("Builds:           {}", stats.num_build);
    println!("Updates:          {}", stats.num_update);
    println!("Rejected pivots:  {}", stats.num_reject);
    println!("Build time:       {:.3} ms", stats.build_seconds * 1000.0);
    println!("Update time:      {:.3} ms", stats.update_seconds * 1000.0);
    println!("FTRAN time:       {:.3} ms", timers.ftran_total().as_secs_f64() * 1000.0);
    println!("BTRAN time:       {:.3} ms", timers.btran_total().as_secs_f64() * 1000.0);
    println!("Max residual:     {:.3e}", stats.max_residual);
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.rows == 0 || cli.cols < cli.rows {
        bail!("need 0 < rows <= cols, got rows = {}, cols = {}", cli.rows, cli.cols);
    }
    if !(0.0..=1.0).contains(&cli.density) {
        bail!("density must be in [0, 1], got {}", cli.density);
    }

    println!("Basis Factor Benchmarks");
    println!("=======================\n");

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let a = Arc::new(generate_random_lp(cli.rows, cli.cols, cli.density, &mut rng));
    println!("Rows (m):         {}", cli.rows);
    println!("Columns (n):      {}", cli.cols);
    println!(
        "A nonzeros:       {} ({:.2}% dense)",
        a.nnz(),
        100.0 * a.nnz() as f64 / (cli.rows * cli.cols) as f64
    );

    for method in cli.method.methods() {
        let (stats, timers) = run_method(&cli, &a, method)?;
        report(method, &stats, &timers);
    }

    println!("\n{}", "=".repeat(60));
    println!("Benchmarks complete");
    println!("{}", "=".repeat(60));
    Ok(())
}
