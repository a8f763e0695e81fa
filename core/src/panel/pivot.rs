//! Pivot index: which rows move where during the row exchange.
//!
//! The panel factorization reports its pivots as a LAPACK-style interchange
//! sequence (`dpiv[i]` is swapped with row `ia + i`). The exchange needs the
//! *net* movement instead, organised by process row:
//!
//! - The final row panel `U` is made of the `jb` rows that end up at positions
//!   `ia..ia + jb` (the "top block", owned by process row `icurrow`).
//! - Every other affected position `d` receives a row that started in the top
//!   block, and the row originally at `d` is one of the rows of `U`.
//!
//! The staging buffer `U` is cut into `nprow` contiguous segments, one per
//! process row, ordered relative to `icurrow` (segment 0 is `icurrow`). The
//! segment of process row `p != icurrow` has one slot per affected position
//! owned by `p`; segment 0 holds the rows of `U` whose source already lives
//! in `icurrow`.

use crate::error::{HplError, Result};
use crate::grid::{indxg2l, indxg2p};
use hpl_rs_kernels::RowTarget;
use std::collections::{BTreeMap, HashMap};

/// The panel geometry the index computation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotGeometry {
    /// First global row of the panel.
    pub ia: usize,
    /// Panel width.
    pub jb: usize,
    pub nb: usize,
    pub nprow: usize,
    pub myrow: usize,
    /// Process row owning the top block.
    pub icurrow: usize,
}

impl PivotGeometry {
    fn in_top_block(&self, row: usize) -> bool {
        (self.ia..self.ia + self.jb).contains(&row)
    }

    fn owner(&self, row: usize) -> usize {
        if self.in_top_block(row) {
            self.icurrow
        } else {
            indxg2p(row, self.nb, self.nprow)
        }
    }

    fn local(&self, row: usize) -> usize {
        indxg2l(row, self.nb, self.nprow)
    }
}

/// Net row movement of one panel, plus the per-process bookkeeping derived from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotIndex {
    /// `(source, destination)` global rows of every row that moves, sorted by destination.
    pub ip_id: Vec<(usize, usize)>,
    /// Segment offsets into `U`, `nprow + 1` entries.
    pub iplen: Vec<usize>,
    /// Segment -> process row.
    pub ipmap: Vec<usize>,
    /// Process row -> segment.
    pub ipmapm1: Vec<usize>,
    /// Row `k` of the final row panel is staged row `perm_u[k]`.
    pub perm_u: Vec<usize>,
    /// Local rows of `A` read (in `icurrow`) or swapped (elsewhere).
    pub lindx_a: Vec<usize>,
    /// Targets of the staging copies in `icurrow`; empty elsewhere.
    pub lindx_au: Vec<RowTarget>,
}

impl PivotIndex {
    /// Full computation from the interchange sequence.
    ///
    /// `dpiv[i]` must not lie above row `ia + i`, as produced by partial pivoting.
    pub fn build(geom: &PivotGeometry, dpiv: &[usize]) -> Result<Self> {
        if dpiv.len() < geom.jb {
            return Err(HplError::InvalidArgument(format!(
                "{} pivots for a panel of width {}",
                dpiv.len(),
                geom.jb
            )));
        }
        if let Some((i, &row)) = dpiv.iter().take(geom.jb).enumerate().find(|&(i, &row)| row < geom.ia + i) {
            return Err(HplError::InvalidArgument(format!(
                "pivot row {row} of panel column {i} lies above the diagonal row {}",
                geom.ia + i
            )));
        }
        let mut index = PivotIndex {
            ip_id: pipid(geom, dpiv),
            ..Self::default()
        };
        index.plindx1(geom);
        Ok(index)
    }

    /// Recomputes `iplen`, `ipmap` and `ipmapm1` from `ip_id`, keeping the
    /// permutation and the copy lists.
    pub fn refresh_lengths(&mut self, geom: &PivotGeometry) {
        let (iplen, ipmap, ipmapm1) = segment_lengths(geom, &self.ip_id);
        self.iplen = iplen;
        self.ipmap = ipmap;
        self.ipmapm1 = ipmapm1;
    }

    pub fn clear(&mut self) {
        self.ip_id.clear();
        self.iplen.clear();
        self.ipmap.clear();
        self.ipmapm1.clear();
        self.perm_u.clear();
        self.lindx_a.clear();
        self.lindx_au.clear();
    }

    /// Number of staged rows held by segment `seg`.
    pub fn segment_len(&self, seg: usize) -> usize {
        self.iplen[seg + 1] - self.iplen[seg]
    }

    fn plindx1(&mut self, geom: &PivotGeometry) {
        self.refresh_lengths(geom);
        let i_am_current = geom.myrow == geom.icurrow;

        let source_of: HashMap<usize, usize> = self.ip_id.iter().map(|&(s, d)| (d, s)).collect();
        let mut next_slot = self.iplen.clone();
        let mut slot_of: HashMap<usize, usize> = HashMap::new();

        // Slots of the segments owned by other process rows: one per outside
        // destination, filled in icurrow with the displaced top-block row.
        for &(src, dst) in &self.ip_id {
            if geom.in_top_block(dst) {
                continue;
            }
            let owner = geom.owner(dst);
            if owner == geom.icurrow {
                continue;
            }
            let seg = self.ipmapm1[owner];
            let slot = next_slot[seg];
            next_slot[seg] += 1;
            slot_of.insert(dst, slot);

            if i_am_current {
                self.lindx_a.push(geom.local(src));
                self.lindx_au.push(RowTarget::U(slot));
            } else if owner == geom.myrow {
                self.lindx_a.push(geom.local(dst));
            }
        }

        // Final row panel: rows already living in icurrow go to segment 0,
        // the others come back through the slot of their position.
        self.perm_u = Vec::with_capacity(geom.jb);
        for k in 0..geom.jb {
            let pos = geom.ia + k;
            let src = source_of.get(&pos).copied().unwrap_or(pos);
            if geom.owner(src) == geom.icurrow {
                let slot = next_slot[0];
                next_slot[0] += 1;
                self.perm_u.push(slot);
                if i_am_current {
                    self.lindx_a.push(geom.local(src));
                    self.lindx_au.push(RowTarget::U(slot));
                }
            } else {
                self.perm_u.push(slot_of[&src]);
            }
        }

        // In-place moves inside icurrow come last: their destinations were
        // staged above.
        if i_am_current {
            for &(src, dst) in &self.ip_id {
                if !geom.in_top_block(dst) && geom.owner(dst) == geom.icurrow {
                    self.lindx_a.push(geom.local(src));
                    self.lindx_au.push(RowTarget::A(geom.local(dst)));
                }
            }
        }
    }
}

/// Net movement of the interchange sequence `dpiv` applied at rows `ia..ia + jb`.
///
/// Returns `(source, destination)` pairs sorted by destination; rows that end
/// where they started are omitted.
pub fn pipid(geom: &PivotGeometry, dpiv: &[usize]) -> Vec<(usize, usize)> {
    let mut holds: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, &other) in dpiv.iter().take(geom.jb).enumerate() {
        let pos = geom.ia + i;
        if other == pos {
            continue;
        }
        let here = holds.get(&pos).copied().unwrap_or(pos);
        let there = holds.get(&other).copied().unwrap_or(other);
        holds.insert(pos, there);
        holds.insert(other, here);
    }
    holds
        .into_iter()
        .filter(|(dst, src)| dst != src)
        .map(|(dst, src)| (src, dst))
        .collect()
}

/// Segment offsets and maps before equilibration.
pub fn segment_lengths(geom: &PivotGeometry, ip_id: &[(usize, usize)]) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let nprow = geom.nprow;
    let mut counts = vec![0usize; nprow];
    for &(_, dst) in ip_id {
        if !geom.in_top_block(dst) {
            let owner = geom.owner(dst);
            if owner != geom.icurrow {
                counts[owner] += 1;
            }
        }
    }

    let ipmap: Vec<usize> = (0..nprow).map(|r| (geom.icurrow + r) % nprow).collect();
    let mut ipmapm1 = vec![0usize; nprow];
    for (seg, &p) in ipmap.iter().enumerate() {
        ipmapm1[p] = seg;
    }

    let moved_out: usize = counts.iter().sum();
    let mut iplen = Vec::with_capacity(nprow + 1);
    iplen.push(0);
    let mut offset = geom.jb - moved_out;
    iplen.push(offset);
    for &p in &ipmap[1..] {
        offset += counts[p];
        iplen.push(offset);
    }
    (iplen, ipmap, ipmapm1)
}

/// Balanced segment offsets covering the same rows as `iplen`.
///
/// Segments differ in length by at most one, longer ones first. Applying it
/// to its own output changes nothing.
pub fn equil_lengths(iplen: &[usize]) -> Vec<usize> {
    let nseg = iplen.len().saturating_sub(1);
    if nseg == 0 {
        return iplen.to_vec();
    }
    let start = iplen[0];
    let total = iplen[nseg] - start;
    let (base, extra) = (total / nseg, total % nseg);

    let mut out = Vec::with_capacity(nseg + 1);
    let mut offset = start;
    out.push(offset);
    for seg in 0..nseg {
        offset += base + usize::from(seg < extra);
        out.push(offset);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(nprow: usize, myrow: usize) -> PivotGeometry {
        PivotGeometry {
            ia: 0,
            jb: 4,
            nb: 4,
            nprow,
            myrow,
            icurrow: 0,
        }
    }

    // Net permutation implied by `dpiv` on a full row list.
    fn apply_interchanges(rows: usize, ia: usize, dpiv: &[usize]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..rows).collect();
        for (i, &p) in dpiv.iter().enumerate() {
            order.swap(ia + i, p);
        }
        order
    }

    #[test]
    fn test_pipid_matches_sequential_swaps() {
        let g = geom(2, 0);
        let dpiv = [5, 4, 5, 3];
        let order = apply_interchanges(8, 0, &dpiv);
        let ip_id = pipid(&g, &dpiv);

        for &(src, dst) in &ip_id {
            assert_eq!(order[dst], src);
        }
        let moved = order.iter().enumerate().filter(|(d, s)| d != *s).count();
        assert_eq!(ip_id.len(), moved);
        assert!(ip_id.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn test_pipid_identity() {
        let g = geom(2, 0);
        assert!(pipid(&g, &[0, 1, 2, 3]).is_empty());
    }

    #[test]
    fn test_iplen_sums_to_width() {
        // 8 rows, nb = 4, 2 process rows: rows 0..4 on row 0, 4..8 on row 1.
        let g = geom(2, 1);
        for dpiv in [[0, 1, 2, 3], [4, 5, 6, 7], [7, 1, 6, 3], [2, 7, 2, 4]] {
            let index = PivotIndex::build(&g, &dpiv).unwrap();
            assert_eq!(index.iplen.len(), 3);
            assert!(index.iplen.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(index.iplen[2] - index.iplen[0], 4);
            let mut perm = index.perm_u.clone();
            perm.sort_unstable();
            assert_eq!(perm, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_copy_lists_for_both_rows() {
        // Rows 4 and 6 (process row 1) become pivots of columns 0 and 2.
        let dpiv = [4, 1, 6, 3];
        let current = PivotIndex::build(&geom(2, 0), &dpiv).unwrap();
        let other = PivotIndex::build(&geom(2, 1), &dpiv).unwrap();

        // Two rows leave process row 1, so segment 1 has two slots.
        assert_eq!(current.iplen, vec![0, 2, 4]);
        assert_eq!(current.ipmap, vec![0, 1]);
        // Segment 0: top rows 1 and 3 stay; rows 0 and 2 are displaced.
        assert_eq!(current.perm_u, vec![2, 0, 3, 1]);
        assert_eq!(
            current.lindx_au,
            vec![RowTarget::U(2), RowTarget::U(3), RowTarget::U(0), RowTarget::U(1)]
        );
        assert_eq!(current.lindx_a, vec![0, 2, 1, 3]);

        // Process row 1 swaps its local rows 0 and 2 (global 4 and 6).
        assert_eq!(other.lindx_a, vec![0, 2]);
        assert!(other.lindx_au.is_empty());
        assert_eq!(other.perm_u, current.perm_u);
    }

    #[test]
    fn test_local_moves_follow_staging() {
        // nb = 2, 2 process rows: global rows 4, 5 live on process row 0.
        let g = PivotGeometry {
            ia: 0,
            jb: 2,
            nb: 2,
            nprow: 2,
            myrow: 0,
            icurrow: 0,
        };
        let index = PivotIndex::build(&g, &[4, 1]).unwrap();
        assert_eq!(index.iplen, vec![0, 2, 2]);
        assert_eq!(index.perm_u, vec![0, 1]);
        assert_eq!(
            index.lindx_au,
            vec![RowTarget::U(0), RowTarget::U(1), RowTarget::A(2)]
        );
        // Global 4 is local row 2; global 0 moves there after staging.
        assert_eq!(index.lindx_a, vec![2, 1, 0]);
    }

    #[test]
    fn test_refresh_restores_lengths() {
        let g = geom(2, 0);
        let mut index = PivotIndex::build(&g, &[4, 1, 6, 3]).unwrap();
        let before = index.clone();
        index.iplen = equil_lengths(&index.iplen);
        index.refresh_lengths(&g);
        assert_eq!(index, before);
    }

    #[test]
    fn test_rejects_pivot_above_diagonal() {
        let g = geom(2, 0);
        assert!(PivotIndex::build(&g, &[4, 0, 2, 3]).is_err());
        assert!(PivotIndex::build(&g, &[4, 1]).is_err());
    }

    #[test]
    fn test_equil_lengths_idempotent() {
        for iplen in [vec![0, 4, 4, 4], vec![0, 0, 1, 7], vec![0, 3], vec![2, 2, 9]] {
            let once = equil_lengths(&iplen);
            assert_eq!(equil_lengths(&once), once);
            assert_eq!(once.first(), iplen.first());
            assert_eq!(once.last(), iplen.last());
            let lens: Vec<usize> = once.windows(2).map(|w| w[1] - w[0]).collect();
            let (lo, hi) = (lens.iter().min().unwrap(), lens.iter().max().unwrap());
            assert!(hi - lo <= 1);
        }
    }
}
