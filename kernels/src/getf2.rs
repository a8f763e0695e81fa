use crate::{FloatElem, Result, check_col_major};

/// Outcome of an unblocked panel factorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Getf2Info {
    /// `ipiv[k]` is the row (relative to the panel) interchanged with row `k`.
    pub ipiv: Vec<usize>,
    /// First column whose pivot was exactly zero, if any.
    pub zero_pivot: Option<usize>,
}

/// Unblocked right-looking LU with partial pivoting of an `m x n` column-major panel.
///
/// The pivot of column `k` is the first row `>= k` of maximal magnitude. Rows
/// are swapped across all `n` columns, so on exit the panel holds the unit
/// lower factor below the diagonal and the upper factor on and above it, both
/// in pivoted row order. A zero pivot leaves the column unscaled and is
/// reported in [`Getf2Info::zero_pivot`].
pub fn getf2<T: FloatElem>(m: usize, n: usize, a: &mut [T], lda: usize) -> Result<Getf2Info> {
    let steps = m.min(n);
    let mut info = Getf2Info {
        ipiv: Vec::with_capacity(steps),
        zero_pivot: None,
    };
    if steps == 0 {
        return Ok(info);
    }
    check_col_major(a.len(), m, n, lda)?;

    for k in 0..steps {
        let col = k * lda;
        let mut piv = k;
        let mut best = a[col + k].abs();
        for i in k + 1..m {
            let v = a[col + i].abs();
            if v > best {
                best = v;
                piv = i;
            }
        }
        info.ipiv.push(piv);

        let pivot = a[col + piv];
        if pivot != T::zero() {
            if piv != k {
                for c in 0..n {
                    a.swap(k + c * lda, piv + c * lda);
                }
            }
            let inv = T::one() / pivot;
            for v in &mut a[col + k + 1..col + m] {
                *v *= inv;
            }
        } else if info.zero_pivot.is_none() {
            info.zero_pivot = Some(k);
        }

        // Rank-1 update of the remaining columns.
        for c in k + 1..n {
            let ukc = a[k + c * lda];
            if ukc == T::zero() {
                continue;
            }
            for i in k + 1..m {
                let lik = a[col + i];
                a[i + c * lda] -= lik * ukc;
            }
        }
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getf2_pivots_and_factors() {
        // A = [[1, 2], [3, 4], [0, 1]] (column-major, lda = 3)
        let original = vec![1.0, 3.0, 0.0, 2.0, 4.0, 1.0];
        let mut a = original.clone();
        let info = getf2(3, 2, &mut a, 3).unwrap();

        assert_eq!(info.ipiv, vec![1, 2]);
        assert_eq!(info.zero_pivot, None);

        // Reconstruct P*A = L*U and compare with the permuted original.
        let mut perm = vec![0usize, 1, 2];
        for (k, &p) in info.ipiv.iter().enumerate() {
            perm.swap(k, p);
        }
        for i in 0..3 {
            for c in 0..2 {
                let mut sum: f64 = 0.0;
                for k in 0..=c.min(i) {
                    let l = if i == k { 1.0 } else { a[i + k * 3] };
                    sum += l * a[k + c * 3];
                }
                let expected = original[perm[i] + c * 3];
                assert!((sum - expected).abs() < 1e-12, "({i},{c}): {sum} vs {expected}");
            }
        }
    }

    #[test]
    fn test_getf2_zero_column() {
        let mut a = vec![0.0, 0.0, 1.0, 2.0];
        let info = getf2(2, 2, &mut a, 2).unwrap();
        assert_eq!(info.zero_pivot, Some(0));
        assert_eq!(info.ipiv[0], 0);
    }

    #[test]
    fn test_getf2_first_maximum_wins_ties() {
        let mut a = vec![-2.0, 2.0, 1.0];
        let info = getf2(3, 1, &mut a, 3).unwrap();
        assert_eq!(info.ipiv, vec![0]);
        assert_eq!(a, vec![-2.0, -1.0, -0.5]);
    }
}
