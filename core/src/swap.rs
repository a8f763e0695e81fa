//! Pivoted row exchange for a chunk of trailing columns: spread then roll.
//!
//! After this step every process of the grid holds, in `panel.u`, the `jb`
//! rows of the current column chunk that end up in the top block, and the
//! rows of `A` outside the top block hold their post-pivoting content.
//!
//! The exchange runs over the process column:
//!
//! 1. `icurrow` stages the rows of `U` and the displaced top-block rows into
//!    `panel.u`, segment by segment, and applies its own in-place moves.
//! 2. Spread: segments travel down a binomial tree so that each process row
//!    receives the segment of displaced rows it owns.
//! 3. Each process row swaps its segment with its affected local rows. The
//!    segment now holds that process row's contribution to `U`.
//! 4. Optionally the segments are rebalanced to near-equal lengths.
//! 5. Roll: a ring all-gather so that every process row ends with every segment.
//!
//! Row `k` of the final row panel is staged row `perm_u[k]`; the returned
//! permutation is applied by the update kernel.

use crate::comm;
use crate::error::Result;
use crate::matrix::DistMatrix;
use crate::panel::{Panel, PivotIndex, pivot::equil_lengths};
use hpl_rs_kernels::{laswp01t, laswp06t};
use std::ops::Range;

/// Leading dimension of the staging buffer for `n` columns.
///
/// Rounded up to a multiple of 8 and bumped by 8 more when that lands on a
/// multiple of 16, so consecutive rows never share the same alignment class.
pub fn padded_ldu(n: usize) -> usize {
    let ldu = n + (8 - n % 8) % 8;
    if ldu % 16 == 0 { ldu + 8 } else { ldu }
}

/// Segment ranges one process moves during the spread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpreadStep {
    /// Segment of the sender and the segments received from it.
    pub parent: Option<(usize, Range<usize>)>,
    /// Child segment and the segments sent to it, in sending order.
    pub children: Vec<(usize, Range<usize>)>,
}

/// Binomial spread over `nseg` segments, seen from segment `me`.
///
/// The holder of `lo..hi` keeps the lower half and hands `mid..hi` to `mid`.
pub fn spread_step(nseg: usize, me: usize) -> SpreadStep {
    let mut step = SpreadStep::default();
    let (mut lo, mut hi) = (0, nseg);
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if me >= mid {
            if me == mid {
                step.parent = Some((lo, mid..hi));
            }
            lo = mid;
        } else {
            if me == lo {
                step.children.push((mid, mid..hi));
            }
            hi = mid;
        }
    }
    step
}

fn rows(index: &PivotIndex, segments: Range<usize>, ldu: usize) -> Range<usize> {
    index.iplen[segments.start] * ldu..index.iplen[segments.end] * ldu
}

/// Exchanges the pivoted rows of local trailing columns
/// `col_offset..col_offset + nn` (clipped to what this process owns).
///
/// Returns the permutation to apply to the staged rows, or `None` when there
/// is nothing to exchange for this chunk.
pub fn pdlaswp01t<'p>(
    panel: &'p mut Panel<'_>,
    a: &mut DistMatrix,
    col_offset: usize,
    nn: usize,
) -> Result<Option<&'p [usize]>> {
    let n = nn.min(panel.nq.saturating_sub(col_offset));
    if n == 0 || panel.jb == 0 {
        return Ok(None);
    }

    let geom = panel.pivot_geometry();
    if panel.indices_valid {
        if panel.algo.equilibrate {
            panel.pivots.refresh_lengths(&geom);
        }
    } else {
        panel.pivots = PivotIndex::build(&geom, &panel.dpiv)?;
        panel.indices_valid = true;
    }

    let ldu = padded_ldu(n);
    panel.reserve_u(ldu)?;
    tracing::debug!(
        tag = panel.tag,
        prow = panel.prow,
        pcol = panel.pcol,
        col_offset,
        n,
        ldu,
        "row exchange"
    );
    let lda = a.ld;
    let cols = &mut a.data[(panel.jj_trail + col_offset) * lda..];
    let (myrow, icurrow) = (panel.grid.myrow, panel.prow);

    if myrow == icurrow {
        laswp01t(n, cols, lda, &mut panel.u, ldu, &panel.pivots.lindx_a, &panel.pivots.lindx_au)?;
    }

    spread(panel, ldu)?;

    if myrow != icurrow {
        let index = &panel.pivots;
        let seg = index.ipmapm1[myrow];
        let len = index.segment_len(seg);
        let start = index.iplen[seg] * ldu;
        laswp06t(len, n, cols, lda, &mut panel.u[start..], ldu, &index.lindx_a)?;
    }

    if panel.algo.equilibrate {
        equilibrate(panel, ldu)?;
    }
    roll(panel, ldu)?;

    Ok(Some(panel.pivots.perm_u.as_slice()))
}

fn spread(panel: &mut Panel<'_>, ldu: usize) -> Result<()> {
    let nprow = panel.grid.nprow;
    if nprow == 1 {
        return Ok(());
    }
    let grid = panel.grid;
    let scope = grid.col();
    let index = &panel.pivots;
    let step = spread_step(nprow, index.ipmapm1[grid.myrow]);

    if let Some((parent, segments)) = step.parent {
        let range = rows(index, segments, ldu);
        comm::recv(scope, &mut panel.u[range], index.ipmap[parent], panel.tag)?;
    }
    for (child, segments) in step.children {
        let range = rows(index, segments, ldu);
        comm::send(scope, &panel.u[range], index.ipmap[child], panel.tag)?;
    }
    Ok(())
}

/// Rebalances the segments so that their lengths differ by at most one.
///
/// Every overlap between a segment's current and balanced range that crosses
/// process rows becomes one message. Sends go out before any receive is posted.
fn equilibrate(panel: &mut Panel<'_>, ldu: usize) -> Result<()> {
    let nprow = panel.grid.nprow;
    if nprow == 1 {
        return Ok(());
    }
    let old = panel.pivots.iplen.clone();
    let new = equil_lengths(&old);
    if old == new {
        return Ok(());
    }

    let grid = panel.grid;
    let scope = grid.col();
    let index = &panel.pivots;
    let me = index.ipmapm1[grid.myrow];
    let overlap = |a: &[usize], b: &[usize], i: usize, j: usize| {
        let start = a[i].max(b[j]);
        let end = a[i + 1].min(b[j + 1]);
        (start < end).then(|| start * ldu..end * ldu)
    };

    for seg in (0..nprow).filter(|&s| s != me) {
        if let Some(range) = overlap(&old, &new, me, seg) {
            comm::send(scope, &panel.u[range], index.ipmap[seg], panel.tag)?;
        }
    }
    for seg in (0..nprow).filter(|&s| s != me) {
        if let Some(range) = overlap(&old, &new, seg, me) {
            comm::recv(scope, &mut panel.u[range], index.ipmap[seg], panel.tag)?;
        }
    }

    tracing::trace!(rank = panel.grid.rank(), ?old, ?new, "row panel equilibrated");
    panel.pivots.iplen = new;
    Ok(())
}

/// Ring all-gather of the segments over the process column.
fn roll(panel: &mut Panel<'_>, ldu: usize) -> Result<()> {
    let nprow = panel.grid.nprow;
    if nprow == 1 {
        return Ok(());
    }
    let grid = panel.grid;
    let scope = grid.col();
    let index = &panel.pivots;
    let me = index.ipmapm1[grid.myrow];
    let next = index.ipmap[(me + 1) % nprow];
    let prev = index.ipmap[(me + nprow - 1) % nprow];

    for step in 0..nprow - 1 {
        let outgoing = (me + nprow - step) % nprow;
        let incoming = (me + 2 * nprow - step - 1) % nprow;
        comm::send(scope, &panel.u[rows(index, outgoing..outgoing + 1, ldu)], next, panel.tag)?;
        comm::recv(scope, &mut panel.u[rows(index, incoming..incoming + 1, ldu)], prev, panel.tag)?;
    }
    Ok(())
}
