use crate::{KernelElem, KernelError, Result, check_col_major};

/// Destination of one staged row in [`laswp01t`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTarget {
    /// Row index inside the staging buffer `U`.
    U(usize),
    /// Local row index inside `A`.
    A(usize),
}

/// Copies scattered rows of `A` into `U` or into other rows of `A`.
///
/// Row `lindx_a[i]` of the `n` leading columns of `A` is copied to the
/// destination `lindx_au[i]`. Entries are processed in order, so a list that
/// stages a row into `U` before overwriting it in `A` preserves the original
/// content.
pub fn laswp01t<T: KernelElem>(
    n: usize,
    a: &mut [T],
    lda: usize,
    u: &mut [T],
    ldu: usize,
    lindx_a: &[usize],
    lindx_au: &[RowTarget],
) -> Result<()> {
    if n == 0 || lindx_a.is_empty() {
        return Ok(());
    }
    if lindx_a.len() != lindx_au.len() {
        return Err(KernelError::ShapeMismatch {
            expected: vec![lindx_a.len()],
            got: vec![lindx_au.len()],
        });
    }
    check_col_major(a.len(), lda, n, lda)?;

    for (&src, &dst) in lindx_a.iter().zip(lindx_au) {
        check_row(src, lda)?;
        match dst {
            RowTarget::U(k) => {
                check_col_major(u.len(), n, k + 1, ldu)?;
                let row = &mut u[k * ldu..k * ldu + n];
                for (c, out) in row.iter_mut().enumerate() {
                    *out = a[src + c * lda];
                }
            }
            RowTarget::A(i) => {
                check_row(i, lda)?;
                for c in 0..n {
                    a[i + c * lda] = a[src + c * lda];
                }
            }
        }
    }
    Ok(())
}

/// Swaps the first `m` rows of `U` with the rows `lindx_a[..m]` of `A`.
pub fn laswp06t<T: KernelElem>(
    m: usize,
    n: usize,
    a: &mut [T],
    lda: usize,
    u: &mut [T],
    ldu: usize,
    lindx_a: &[usize],
) -> Result<()> {
    if m == 0 || n == 0 {
        return Ok(());
    }
    if lindx_a.len() < m {
        return Err(KernelError::ShapeMismatch {
            expected: vec![m],
            got: vec![lindx_a.len()],
        });
    }
    check_col_major(a.len(), lda, n, lda)?;
    check_col_major(u.len(), n, m, ldu)?;

    for (t, &row) in lindx_a[..m].iter().enumerate() {
        check_row(row, lda)?;
        let urow = &mut u[t * ldu..t * ldu + n];
        for (c, uval) in urow.iter_mut().enumerate() {
            std::mem::swap(uval, &mut a[row + c * lda]);
        }
    }
    Ok(())
}

/// Returns the rows of `U` reordered so that output row `k` is input row `perm[k]`.
///
/// The output keeps the leading dimension `ldu`; padding columns are zero.
pub fn permute_rows<T: KernelElem>(n: usize, u: &[T], ldu: usize, perm: &[usize]) -> Result<Vec<T>> {
    let rows = perm.len();
    check_col_major(u.len(), n, rows, ldu)?;
    let mut out = vec![T::zero(); ldu * rows];
    for (k, &src) in perm.iter().enumerate() {
        if src >= rows {
            return Err(KernelError::RowOutOfBounds { index: src, rows });
        }
        out[k * ldu..k * ldu + n].copy_from_slice(&u[src * ldu..src * ldu + n]);
    }
    Ok(out)
}

fn check_row(row: usize, lda: usize) -> Result<()> {
    if row >= lda {
        return Err(KernelError::RowOutOfBounds { index: row, rows: lda });
    }
    Ok(())
}
