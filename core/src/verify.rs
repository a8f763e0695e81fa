//! Solution check and the end-to-end test run.

use crate::config::HplConfig;
use crate::error::{HplError, Result};
use crate::grid::ProcessGrid;
use crate::matrix::{DistMatrix, generate_global};
use crate::pgesv::pdgesv;
use std::time::{Duration, Instant};

/// Largest scaled residual accepted as a correct solve.
pub const RESIDUAL_THRESHOLD: f64 = 16.0;

/// Solves `U x = y` where the factored `n x (n + 1)` matrix holds `U` in its
/// upper triangle and `y` in column `n` (column-major, leading dimension `n`).
pub fn back_substitute(n: usize, lu: &[f64]) -> Result<Vec<f64>> {
    if lu.len() != n * (n + 1) {
        return Err(HplError::InvalidArgument(format!(
            "factored matrix has {} entries, expected {}",
            lu.len(),
            n * (n + 1)
        )));
    }
    let mut x = lu[n * n..].to_vec();
    for i in (0..n).rev() {
        let mut acc = x[i];
        for j in i + 1..n {
            acc -= lu[i + j * n] * x[j];
        }
        x[i] = acc / lu[i + i * n];
    }
    Ok(x)
}

/// Norms behind the scaled residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    /// `||A x - b||_oo`
    pub residual: f64,
    pub norm_a: f64,
    pub norm_x: f64,
    pub norm_b: f64,
    /// `||A x - b||_oo / (eps * (||A||_oo ||x||_oo + ||b||_oo) * n)`
    pub scaled: f64,
}

impl Residual {
    pub fn passed(&self) -> bool {
        self.scaled.is_finite() && self.scaled < RESIDUAL_THRESHOLD
    }
}

/// Scaled residual of `x` for the original augmented matrix `[A | b]`.
pub fn scaled_residual(n: usize, ab: &[f64], x: &[f64]) -> Residual {
    let b = &ab[n * n..n * (n + 1)];
    let mut r: Vec<f64> = b.iter().map(|v| -v).collect();
    let mut row_sums = vec![0.0f64; n];
    for (j, &xj) in x.iter().enumerate().take(n) {
        let col = &ab[j * n..(j + 1) * n];
        for i in 0..n {
            r[i] += col[i] * xj;
            row_sums[i] += col[i].abs();
        }
    }
    let inf_norm = |v: &[f64]| v.iter().fold(0.0f64, |m, e| m.max(e.abs()));

    let residual = inf_norm(&r);
    let norm_a = inf_norm(&row_sums);
    let norm_x = inf_norm(x);
    let norm_b = inf_norm(b);
    let scaled = residual / (f64::EPSILON * (norm_a * norm_x + norm_b) * n.max(1) as f64);
    Residual {
        residual,
        norm_a,
        norm_x,
        norm_b,
        scaled,
    }
}

/// Outcome of one [`pdtest`] run, reported on world rank 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub n: usize,
    pub nb: usize,
    pub nprow: usize,
    pub npcol: usize,
    pub elapsed: Duration,
    pub gflops: f64,
    pub residual: Residual,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.residual.passed()
    }
}

/// Generates the seeded system, factors it, and checks the solution on rank 0.
///
/// Every process of `grid` must call this. Rank 0 returns the report, all
/// others `None`.
pub fn pdtest(grid: &ProcessGrid, cfg: &HplConfig) -> Result<Option<TestReport>> {
    cfg.validate()?;
    let mut a = DistMatrix::generate(grid, cfg.n, cfg.nb, cfg.seed)?;

    let start = Instant::now();
    pdgesv(grid, &cfg.algo, &mut a)?;
    let elapsed = start.elapsed();

    let Some(factored) = a.gather(grid)? else {
        return Ok(None);
    };
    let n = cfg.n;
    let x = back_substitute(n, &factored)?;
    let residual = scaled_residual(n, &generate_global(cfg.seed, n), &x);

    let nf = n as f64;
    let flops = 2.0 / 3.0 * nf * nf * nf + 1.5 * nf * nf;
    let gflops = flops / elapsed.as_secs_f64().max(f64::MIN_POSITIVE) / 1e9;

    let report = TestReport {
        n,
        nb: cfg.nb,
        nprow: grid.nprow,
        npcol: grid.npcol,
        elapsed,
        gflops,
        residual,
    };
    tracing::info!(
        n,
        nb = cfg.nb,
        p = grid.nprow,
        q = grid.npcol,
        seconds = elapsed.as_secs_f64(),
        gflops,
        scaled_residual = residual.scaled,
        passed = report.passed(),
        "pdtest"
    );
    Ok(Some(report))
}
