//! Panel factorization.
//!
//! The driver only needs a factorization that, for the process column owning
//! the panel, leaves the factored panel in `A` and fills `l1`, `l2` and
//! `dpiv`. The [`PanelFactor`] trait is that seam; recursive or blocked
//! variants can be plugged in without touching the driver.

use crate::comm;
use crate::error::Result;
use crate::grid::{indxl2g, numroc};
use crate::matrix::DistMatrix;
use crate::panel::Panel;
use hpl_rs_kernels::getf2;

pub trait PanelFactor {
    /// Factors the `jb` columns of `panel` in place.
    ///
    /// Called on every process; processes outside the panel's process column
    /// return immediately and receive the factors through the broadcast.
    fn factor(&self, panel: &mut Panel<'_>, a: &mut DistMatrix) -> Result<()>;
}

/// Gathers the panel on every process of its column and runs an unblocked
/// partial-pivoting LU redundantly.
///
/// All processes of the column end with the same factors, pick the same
/// pivots and write back only the rows they own.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferencePanelFactor;

impl PanelFactor for ReferencePanelFactor {
    fn factor(&self, panel: &mut Panel<'_>, a: &mut DistMatrix) -> Result<()> {
        let grid = panel.grid;
        if grid.mycol != panel.pcol || panel.jb == 0 {
            return Ok(());
        }
        let (m, jb, ia, nb) = (panel.m, panel.jb, panel.ia, panel.nb);
        let (ii, jj, mp, lda) = (panel.ii, panel.jj, panel.mp, a.ld);
        let scope = grid.col();

        let mut mine = Vec::with_capacity(mp * jb);
        for c in 0..jb {
            let col = (jj + c) * lda;
            mine.extend_from_slice(&a.data[col + ii..col + ii + mp]);
        }
        for p in (0..grid.nprow).filter(|&p| p != grid.myrow) {
            comm::send(scope, &mine, p, panel.tag)?;
        }

        let mut full = vec![0.0; m * jb];
        for p in 0..grid.nprow {
            let first = numroc(ia, nb, p, grid.nprow);
            let rows = numroc(ia + m, nb, p, grid.nprow) - first;
            let block = if p == grid.myrow {
                std::mem::take(&mut mine)
            } else {
                let mut buf = vec![0.0; rows * jb];
                comm::recv(scope, &mut buf, p, panel.tag)?;
                buf
            };
            for il in 0..rows {
                let row = indxl2g(first + il, nb, p, grid.nprow) - ia;
                for c in 0..jb {
                    full[row + c * m] = block[il + c * rows];
                }
            }
        }

        let info = getf2(m, jb, &mut full, m)?;
        if let Some(k) = info.zero_pivot {
            tracing::warn!(column = panel.ja + k, "exactly singular pivot");
        }
        for (out, &r) in panel.dpiv.iter_mut().zip(&info.ipiv) {
            *out = ia + r;
        }

        for il in 0..mp {
            let row = indxl2g(ii + il, nb, grid.myrow, grid.nprow) - ia;
            for c in 0..jb {
                a.data[ii + il + (jj + c) * lda] = full[row + c * m];
            }
        }
        for c in 0..jb {
            panel.l1[c * jb..(c + 1) * jb].copy_from_slice(&full[c * m..c * m + jb]);
        }
        let rows = panel.l2_rows;
        for c in 0..jb {
            let col = (jj + c) * lda;
            let start = col + panel.l2_row0;
            panel.l2[c * rows..(c + 1) * rows].copy_from_slice(&a.data[start..start + rows]);
        }
        Ok(())
    }
}
