use crate::{KernelElem, KernelError, Result, check_col_major};
use rayon::prelude::*;

/// Transposed copy of a staged row panel back into a column-major matrix.
///
/// `U` holds `m` rows of length `n` (one row per run of `ldu` elements).
/// Row `k` of `U` is written to row `row0 + k` of `A`, columns `0..n`, where
/// `a` starts at the first target column.
pub fn lacpy_transposed<T>(
    m: usize,
    n: usize,
    u: &[T],
    ldu: usize,
    a: &mut [T],
    lda: usize,
    row0: usize,
) -> Result<()>
where
    T: KernelElem,
{
    if m == 0 || n == 0 {
        return Ok(());
    }
    if row0 + m > lda {
        return Err(KernelError::RowOutOfBounds {
            index: row0 + m - 1,
            rows: lda,
        });
    }
    check_col_major(u.len(), n, m, ldu)?;
    check_col_major(a.len(), row0 + m, n, lda)?;

    // Parallelize over the columns of the output. Column `c` of `A` gathers
    // element `c` of every row of `U`.
    a.par_chunks_mut(lda)
        .take(n)
        .enumerate()
        .for_each(|(c, col)| {
            for (k, out_elem) in col[row0..row0 + m].iter_mut().enumerate() {
                *out_elem = u[k * ldu + c];
            }
        });

    Ok(())
}
