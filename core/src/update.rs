//! Trailing-matrix update.

use crate::error::Result;
use crate::matrix::DistMatrix;
use crate::panel::Panel;
use crate::swap::pdlaswp01t;
use hpl_rs_kernels::{gemm_sub, lacpy_transposed, permute_rows, trsm_unit_lower};

pub trait TrailingUpdate {
    /// Applies a broadcast panel to the local trailing columns of `a`.
    fn update(&self, panel: &mut Panel<'_>, a: &mut DistMatrix) -> Result<()>;
}

/// Swap, solve and rank-`jb` update, chunk by chunk.
///
/// For each chunk of local trailing columns:
/// 1. the pivoted rows are exchanged ([`pdlaswp01t`]) and put in final order,
/// 2. `U <- L1^-1 U`,
/// 3. `icurrow` writes `U` back into the top block,
/// 4. `A2 <- A2 - L2 U` below the top block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceUpdate;

impl TrailingUpdate for ReferenceUpdate {
    fn update(&self, panel: &mut Panel<'_>, a: &mut DistMatrix) -> Result<()> {
        let total = panel.nq;
        let jb = panel.jb;
        if total == 0 || jb == 0 {
            return Ok(());
        }
        let chunk = panel.algo.update_chunk.unwrap_or(total).max(1);

        let mut offset = 0;
        while offset < total {
            let nn = chunk.min(total - offset);
            let perm = match pdlaswp01t(panel, a, offset, nn)? {
                Some(perm) => perm.to_vec(),
                None => break,
            };
            let ldu = panel.ldu;
            let mut u = permute_rows(nn, &panel.u, ldu, &perm)?;
            trsm_unit_lower(jb, nn, &panel.l1, jb, &mut u, ldu)?;

            let lda = a.ld;
            let cols = &mut a.data[(panel.jj_trail + offset) * lda..];
            if panel.grid.myrow == panel.prow {
                lacpy_transposed(jb, nn, &u, ldu, cols, lda, panel.ii)?;
            }
            gemm_sub(
                panel.l2_rows,
                nn,
                jb,
                &panel.l2,
                panel.l2_rows,
                &u,
                ldu,
                cols,
                lda,
                panel.l2_row0,
            )?;
            offset += nn;
        }
        Ok(())
    }
}
