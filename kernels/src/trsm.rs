use crate::{KernelElem, Result, check_col_major};

/// Solves `L * X = U` in place for a unit lower triangular `m x m` matrix `L`.
///
/// `L` is column-major with leading dimension `ldl`; only its strictly lower
/// part is read. `U` holds `m` rows of length `n`, one per run of `ldu`
/// elements, and is overwritten with `X`.
pub fn trsm_unit_lower<T: KernelElem>(
    m: usize,
    n: usize,
    l: &[T],
    ldl: usize,
    u: &mut [T],
    ldu: usize,
) -> Result<()> {
    if m == 0 || n == 0 {
        return Ok(());
    }
    check_col_major(l.len(), m, m, ldl)?;
    check_col_major(u.len(), n, m, ldu)?;

    for k in 0..m {
        let (head, tail) = u.split_at_mut((k + 1) * ldu);
        let pivot_row = &head[k * ldu..k * ldu + n];
        for i in k + 1..m {
            let lik = l[i + k * ldl];
            if lik == T::zero() {
                continue;
            }
            let off = (i - k - 1) * ldu;
            for (x, &p) in tail[off..off + n].iter_mut().zip(pivot_row) {
                *x -= lik * p;
            }
        }
    }
    Ok(())
}
