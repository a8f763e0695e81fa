//! Local shard of the distributed `N x (N + 1)` augmented matrix.

use crate::comm;
use crate::config::Tag;
use crate::error::{HplError, Result};
use crate::grid::{ProcessGrid, indxg2l, indxg2p, indxl2g, numroc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Tag used when collecting a matrix on rank 0; outside the factorization range.
pub const MSGID_GATHER: Tag = 9001;

/// This process's block-cyclic piece of `[A | b]`.
///
/// Column-major with leading dimension `ld`. The right-hand side is global
/// column `n` and is distributed like any other column.
#[derive(Debug, Clone, PartialEq)]
pub struct DistMatrix {
    /// Global order `N`.
    pub n: usize,
    pub nb: usize,
    /// Local rows.
    pub mp: usize,
    /// Local columns (right-hand side included when owned).
    pub nq: usize,
    pub ld: usize,
    pub data: Vec<f64>,
}

impl DistMatrix {
    /// Allocates a zeroed shard for an `n x (n + 1)` matrix.
    pub fn zeros(grid: &ProcessGrid, n: usize, nb: usize) -> Result<Self> {
        if nb == 0 {
            return Err(HplError::InvalidArgument("block size must be positive".into()));
        }
        let mp = numroc(n, nb, grid.myrow, grid.nprow);
        let nq = numroc(n + 1, nb, grid.mycol, grid.npcol);
        let ld = mp.max(1);
        let mut data = Vec::new();
        data.try_reserve_exact(ld * nq)
            .map_err(|_| HplError::Allocation {
                site: "DistMatrix::zeros",
            })?;
        data.resize(ld * nq, 0.0);
        Ok(Self {
            n,
            nb,
            mp,
            nq,
            ld,
            data,
        })
    }

    /// Fills the shard with the seeded pseudo-random matrix `[A | b]`.
    ///
    /// Entries depend only on `(seed, n, global column)`, never on the grid
    /// shape, so every grid factors the same system.
    pub fn generate(grid: &ProcessGrid, n: usize, nb: usize, seed: u64) -> Result<Self> {
        let mut a = Self::zeros(grid, n, nb)?;
        for jl in 0..a.nq {
            let jg = indxl2g(jl, nb, grid.mycol, grid.npcol);
            let column = generate_column(seed, n, jg);
            let ld = a.ld;
            let dst = &mut a.data[jl * ld..jl * ld + a.mp];
            for (il, out) in dst.iter_mut().enumerate() {
                *out = column[indxl2g(il, nb, grid.myrow, grid.nprow)];
            }
        }
        Ok(a)
    }

    /// Distributes a global column-major `n x (n + 1)` matrix (leading dimension `n`).
    pub fn from_global(grid: &ProcessGrid, n: usize, nb: usize, global: &[f64]) -> Result<Self> {
        if global.len() != n * (n + 1) {
            return Err(HplError::InvalidArgument(format!(
                "expected {} entries, got {}",
                n * (n + 1),
                global.len()
            )));
        }
        let mut a = Self::zeros(grid, n, nb)?;
        for jl in 0..a.nq {
            let jg = indxl2g(jl, nb, grid.mycol, grid.npcol);
            for il in 0..a.mp {
                let ig = indxl2g(il, nb, grid.myrow, grid.nprow);
                a.data[il + jl * a.ld] = global[ig + jg * n];
            }
        }
        Ok(a)
    }

    /// Local column `jl` (the first `mp` entries are meaningful).
    pub fn col(&self, jl: usize) -> &[f64] {
        &self.data[jl * self.ld..(jl + 1) * self.ld]
    }

    /// Entry at global `(ig, jg)` if this process owns it.
    pub fn global_entry(&self, grid: &ProcessGrid, ig: usize, jg: usize) -> Option<f64> {
        if indxg2p(ig, self.nb, grid.nprow) != grid.myrow || indxg2p(jg, self.nb, grid.npcol) != grid.mycol {
            return None;
        }
        let il = indxg2l(ig, self.nb, grid.nprow);
        let jl = indxg2l(jg, self.nb, grid.npcol);
        Some(self.data[il + jl * self.ld])
    }

    /// Collects the global matrix (column-major, leading dimension `n`) on world rank 0.
    ///
    /// Every process must call this; rank 0 gets `Some`, everyone else `None`.
    pub fn gather(&self, grid: &ProcessGrid) -> Result<Option<Vec<f64>>> {
        let scope = grid.all();
        if scope.rank() != 0 {
            let mut packed = Vec::with_capacity(self.mp * self.nq);
            for jl in 0..self.nq {
                packed.extend_from_slice(&self.col(jl)[..self.mp]);
            }
            comm::send(scope, &packed, 0, MSGID_GATHER)?;
            return Ok(None);
        }

        let n = self.n;
        let nb = self.nb;
        let mut global = vec![0.0; n * (n + 1)];
        for pr in 0..grid.nprow {
            for pc in 0..grid.npcol {
                let rank = grid.rank_of(pr, pc);
                let mp = numroc(n, nb, pr, grid.nprow);
                let nq = numroc(n + 1, nb, pc, grid.npcol);
                let mut packed = vec![0.0; mp * nq];
                if rank == 0 {
                    for jl in 0..nq {
                        packed[jl * mp..(jl + 1) * mp].copy_from_slice(&self.col(jl)[..mp]);
                    }
                } else {
                    comm::recv(scope, &mut packed, rank, MSGID_GATHER)?;
                }
                for jl in 0..nq {
                    let jg = indxl2g(jl, nb, pc, grid.npcol);
                    for il in 0..mp {
                        let ig = indxl2g(il, nb, pr, grid.nprow);
                        global[ig + jg * n] = packed[il + jl * mp];
                    }
                }
            }
        }
        Ok(Some(global))
    }
}

/// Global column `jg` of the seeded matrix `[A | b]`, entries in `[-0.5, 0.5)`.
pub fn generate_column(seed: u64, n: usize, jg: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed ^ (jg as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    (0..n).map(|_| rng.random_range(-0.5..0.5)).collect()
}

/// The whole seeded matrix `[A | b]`, column-major with leading dimension `n`.
pub fn generate_global(seed: u64, n: usize) -> Vec<f64> {
    (0..=n).flat_map(|jg| generate_column(seed, n, jg)).collect()
}
