use crate::{KernelElem, KernelError, Result, check_col_major};
use rayon::prelude::*;

/// Rank-`k` trailing update `C -= L * U`.
///
/// * `L` is `m x k`, column-major with leading dimension `ldl`.
/// * `U` is `k x n` stored row-contiguous (row `p` starts at `p * ldu`), the
///   layout produced by the row exchange.
/// * `c` starts at the first target column; rows `row0..row0 + m` of the
///   first `n` columns (leading dimension `ldc`) are updated.
///
/// Columns of `C` are independent, so they are processed in parallel with
/// `rayon`. Swapping this body for a BLAS `dgemm` call only requires passing
/// `U` as a transposed operand.
#[allow(clippy::too_many_arguments)]
pub fn gemm_sub<T>(
    m: usize,
    n: usize,
    k: usize,
    l: &[T],
    ldl: usize,
    u: &[T],
    ldu: usize,
    c: &mut [T],
    ldc: usize,
    row0: usize,
) -> Result<()>
where
    T: KernelElem,
{
    if m == 0 || n == 0 || k == 0 {
        return Ok(());
    }
    if ldl < m {
        return Err(KernelError::ShapeMismatch {
            expected: vec![m],
            got: vec![ldl],
        });
    }
    check_col_major(l.len(), m, k, ldl)?;
    check_col_major(u.len(), n, k, ldu)?;
    check_col_major(c.len(), row0 + m, n, ldc)?;

    c.par_chunks_mut(ldc)
        .take(n)
        .enumerate()
        .for_each(|(col, out_col)| {
            let out = &mut out_col[row0..row0 + m];
            for p in 0..k {
                let b = u[p * ldu + col];
                if b == T::zero() {
                    continue;
                }
                let l_col = &l[p * ldl..p * ldl + m];
                // Vectorizable loop
                for (o, &a) in out.iter_mut().zip(l_col) {
                    *o -= a * b;
                }
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemm_sub_simple() {
        // L = [[1, 2], [3, 4]] column-major; U rows [5, 6], [7, 8].
        let l = vec![1.0, 3.0, 2.0, 4.0];
        let u = vec![5.0, 6.0, 7.0, 8.0];
        let mut c = vec![0.0; 4];
        gemm_sub(2, 2, 2, &l, 2, &u, 2, &mut c, 2, 0).unwrap();
        // L * U = [[19, 22], [43, 50]]
        assert_eq!(c, vec![-19.0, -43.0, -22.0, -50.0]);
    }

    #[test]
    fn test_gemm_sub_row_offset_leaves_other_rows() {
        let l = vec![1.0];
        let u = vec![2.0, 3.0];
        let mut c = vec![10.0, 10.0, 10.0, 10.0];
        gemm_sub(1, 2, 1, &l, 1, &u, 2, &mut c, 2, 1).unwrap();
        assert_eq!(c, vec![10.0, 8.0, 10.0, 7.0]);
    }

    #[test]
    fn test_gemm_sub_shape_mismatch() {
        let l = vec![1.0; 2];
        let u = vec![1.0; 2];
        let mut c = vec![0.0; 4];
        let err = gemm_sub(2, 2, 2, &l, 2, &u, 1, &mut c, 2, 0);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
