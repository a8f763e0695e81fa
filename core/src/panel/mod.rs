//! The panel: one column block being factored, plus everything needed to
//! apply it to the trailing matrix.
//!
//! A panel covers global rows `ia..N` and columns `ja..ja + jb` of the
//! augmented matrix. After factorization and broadcast every process of the
//! grid holds:
//!
//! - `l1`: the `jb x jb` unit-lower factor of the top block (replicated),
//! - `l2`: its local rows of the factor below the top block,
//! - `dpiv`: the global pivot rows, one per panel column, in interchange order.
//!
//! The row exchange additionally uses the staging buffer `u` and the cached
//! [`PivotIndex`]. Both survive across the column chunks of one update and
//! are reset by [`Panel::init`].

pub mod pivot;

use crate::bcast::BcastState;
use crate::config::{Algorithm, Tag};
use crate::error::{HplError, Result};
use crate::grid::{ProcessGrid, indxg2p, numroc};
use crate::matrix::DistMatrix;
pub use pivot::{PivotGeometry, PivotIndex};

/// Zeroed buffer of `len` elements, reporting allocation failure at `site`.
pub(crate) fn alloc_zeroed<T: Clone + Default>(buf: &mut Vec<T>, len: usize, site: &'static str) -> Result<()> {
    buf.clear();
    buf.try_reserve_exact(len)
        .map_err(|_| HplError::Allocation { site })?;
    buf.resize(len, T::default());
    Ok(())
}

#[derive(Debug)]
pub struct Panel<'a> {
    pub grid: &'a ProcessGrid,
    pub algo: &'a Algorithm,
    /// Global rows left, `N - ia`.
    pub m: usize,
    /// Global columns left, right-hand side included.
    pub n: usize,
    pub jb: usize,
    pub nb: usize,
    pub ia: usize,
    pub ja: usize,
    /// Process row owning the top block.
    pub prow: usize,
    /// Process column owning the panel columns.
    pub pcol: usize,
    /// First local row at or below `ia`.
    pub ii: usize,
    /// First local column at or right of `ja`.
    pub jj: usize,
    /// Local rows from `ii` on.
    pub mp: usize,
    /// First local row of `l2`.
    pub l2_row0: usize,
    /// Local rows of `l2`, also its leading dimension.
    pub l2_rows: usize,
    /// First local column right of the panel.
    pub jj_trail: usize,
    /// Local trailing columns, right-hand side included.
    pub nq: usize,
    pub tag: Tag,
    pub l1: Vec<f64>,
    pub l2: Vec<f64>,
    pub dpiv: Vec<usize>,
    /// Staging buffer of the row exchange, one row per `ldu` elements.
    pub u: Vec<f64>,
    pub ldu: usize,
    pub pivots: PivotIndex,
    /// Set once `pivots` has been built for the current `dpiv`.
    pub indices_valid: bool,
    pub(crate) bcast: BcastState,
    pub(crate) bcast_buf: Vec<f64>,
}

impl<'a> Panel<'a> {
    /// Creates a panel and initializes it for the block at `(ia, ja)`.
    ///
    /// `m` and `n` are the global rows and columns (right-hand side included)
    /// remaining from `(ia, ja)`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid: &'a ProcessGrid,
        algo: &'a Algorithm,
        m: usize,
        n: usize,
        jb: usize,
        a: &DistMatrix,
        ia: usize,
        ja: usize,
        tag: Tag,
    ) -> Result<Self> {
        let mut panel = Self {
            grid,
            algo,
            m: 0,
            n: 0,
            jb: 0,
            nb: a.nb,
            ia: 0,
            ja: 0,
            prow: 0,
            pcol: 0,
            ii: 0,
            jj: 0,
            mp: 0,
            l2_row0: 0,
            l2_rows: 0,
            jj_trail: 0,
            nq: 0,
            tag,
            l1: Vec::new(),
            l2: Vec::new(),
            dpiv: Vec::new(),
            u: Vec::new(),
            ldu: 0,
            pivots: PivotIndex::default(),
            indices_valid: false,
            bcast: BcastState::Idle,
            bcast_buf: Vec::new(),
        };
        panel.init(m, n, jb, a, ia, ja, tag)?;
        Ok(panel)
    }

    /// Re-targets the panel at the block `(ia, ja)` of width `jb`.
    ///
    /// Clears the cached pivot indices and sizes `l1`, `l2` and `dpiv`.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        m: usize,
        n: usize,
        jb: usize,
        a: &DistMatrix,
        ia: usize,
        ja: usize,
        tag: Tag,
    ) -> Result<()> {
        let grid = self.grid;
        let nb = a.nb;
        if ia % nb != 0 || ja % nb != 0 || jb > nb || jb > m || jb > n {
            return Err(HplError::InvalidArgument(format!(
                "panel ({ia}, {ja}) of width {jb} does not fit {m}x{n} with nb = {nb}"
            )));
        }

        self.m = m;
        self.n = n;
        self.jb = jb;
        self.nb = nb;
        self.ia = ia;
        self.ja = ja;
        self.tag = tag;

        self.prow = indxg2p(ia, nb, grid.nprow);
        self.pcol = indxg2p(ja, nb, grid.npcol);
        self.ii = numroc(ia, nb, grid.myrow, grid.nprow);
        self.jj = numroc(ja, nb, grid.mycol, grid.npcol);
        self.mp = numroc(ia + m, nb, grid.myrow, grid.nprow) - self.ii;
        let top = if grid.myrow == self.prow { jb } else { 0 };
        self.l2_row0 = self.ii + top;
        self.l2_rows = self.mp - top;
        self.jj_trail = numroc(ja + jb, nb, grid.mycol, grid.npcol);
        self.nq = numroc(ja + n, nb, grid.mycol, grid.npcol) - self.jj_trail;

        alloc_zeroed(&mut self.l1, jb * jb, "Panel::init (L1)")?;
        alloc_zeroed(&mut self.l2, self.l2_rows * jb, "Panel::init (L2)")?;
        alloc_zeroed(&mut self.dpiv, jb, "Panel::init (DPIV)")?;
        self.u.clear();
        self.ldu = 0;
        self.pivots.clear();
        self.indices_valid = false;
        self.bcast = BcastState::Idle;
        self.bcast_buf = Vec::new();
        Ok(())
    }

    /// Sizes the staging buffer for `jb` rows of leading dimension `ldu`.
    pub fn reserve_u(&mut self, ldu: usize) -> Result<()> {
        alloc_zeroed(&mut self.u, ldu * self.jb, "Panel::reserve_u")?;
        self.ldu = ldu;
        Ok(())
    }

    /// Releases the per-iteration buffers. The panel may be re-initialized.
    pub fn free(&mut self) {
        self.l1 = Vec::new();
        self.l2 = Vec::new();
        self.dpiv = Vec::new();
        self.u = Vec::new();
        self.ldu = 0;
        self.pivots.clear();
        self.indices_valid = false;
        self.bcast = BcastState::Idle;
        self.bcast_buf = Vec::new();
    }

    /// Tears the panel down for good.
    pub fn dispose(mut self) {
        self.free();
        tracing::trace!(rank = self.grid.rank(), "panel disposed");
    }

    pub fn pivot_geometry(&self) -> PivotGeometry {
        PivotGeometry {
            ia: self.ia,
            jb: self.jb,
            nb: self.nb,
            nprow: self.grid.nprow,
            myrow: self.grid.myrow,
            icurrow: self.prow,
        }
    }

    /// Elements of the packed broadcast message: `L2 | L1 | DPIV`.
    pub fn message_len(&self) -> usize {
        self.l2.len() + self.l1.len() + self.dpiv.len()
    }

    pub(crate) fn pack(&self) -> Vec<f64> {
        let mut buf = Vec::with_capacity(self.message_len());
        buf.extend_from_slice(&self.l2);
        buf.extend_from_slice(&self.l1);
        buf.extend(self.dpiv.iter().map(|&r| r as f64));
        buf
    }

    pub(crate) fn unpack(&mut self, buf: &[f64]) {
        let (l2, rest) = buf.split_at(self.l2.len());
        let (l1, dpiv) = rest.split_at(self.l1.len());
        self.l2.copy_from_slice(l2);
        self.l1.copy_from_slice(l1);
        for (out, &r) in self.dpiv.iter_mut().zip(dpiv) {
            *out = r as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{ChannelTransport, Transport};
    use crate::config::{GridOrder, SendMode};
    use std::sync::Arc;
    use std::time::Duration;

    fn grid_at(rank: usize, nprow: usize, npcol: usize) -> ProcessGrid {
        let mesh = ChannelTransport::mesh(nprow * npcol, Duration::from_secs(1));
        let transport: Arc<dyn Transport> = Arc::new(mesh.into_iter().nth(rank).unwrap());
        ProcessGrid::new(transport, GridOrder::RowMajor, nprow, npcol, SendMode::Contiguous).unwrap()
    }

    #[test]
    fn test_geometry_on_owner_and_neighbour() {
        let algo = Algorithm::default();
        // 2x2 grid, N = 10, nb = 2; second panel starts at global (2, 2).
        let owner = grid_at(3, 2, 2);
        let a = DistMatrix::zeros(&owner, 10, 2).unwrap();
        let p = Panel::new(&owner, &algo, 8, 9, 2, &a, 2, 2, 2001).unwrap();
        assert_eq!((p.prow, p.pcol), (1, 1));
        assert_eq!((p.ii, p.jj), (0, 0));
        assert_eq!(p.mp, 4);
        assert_eq!((p.l2_row0, p.l2_rows), (2, 2));
        // Global columns 6, 7 and 10 remain on process column 1.
        assert_eq!((p.jj_trail, p.nq), (2, 3));
        assert_eq!(p.l1.len(), 4);
        assert_eq!(p.l2.len(), 4);

        let other = grid_at(0, 2, 2);
        let a = DistMatrix::zeros(&other, 10, 2).unwrap();
        let p = Panel::new(&other, &algo, 8, 9, 2, &a, 2, 2, 2001).unwrap();
        assert_eq!((p.ii, p.mp), (2, 4));
        assert_eq!((p.l2_row0, p.l2_rows), (2, 4));
        assert_eq!((p.jj_trail, p.nq), (2, 4));
    }

    #[test]
    fn test_init_rejects_misaligned_panel() {
        let algo = Algorithm::default();
        let grid = grid_at(0, 1, 1);
        let a = DistMatrix::zeros(&grid, 8, 4).unwrap();
        assert!(Panel::new(&grid, &algo, 6, 7, 4, &a, 2, 2, 2001).is_err());
        assert!(Panel::new(&grid, &algo, 8, 9, 5, &a, 0, 0, 2001).is_err());
    }

    #[test]
    fn test_pack_roundtrip_and_free() {
        let algo = Algorithm::default();
        let grid = grid_at(0, 1, 1);
        let a = DistMatrix::zeros(&grid, 4, 2).unwrap();
        let mut p = Panel::new(&grid, &algo, 4, 5, 2, &a, 0, 0, 2001).unwrap();
        p.l1.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        p.l2.copy_from_slice(&[5.0, 6.0, 7.0, 8.0]);
        p.dpiv.copy_from_slice(&[3, 1]);
        let msg = p.pack();
        assert_eq!(msg.len(), p.message_len());

        let mut q = Panel::new(&grid, &algo, 4, 5, 2, &a, 0, 0, 2001).unwrap();
        q.unpack(&msg);
        assert_eq!((&q.l1, &q.l2, &q.dpiv), (&p.l1, &p.l2, &p.dpiv));

        p.indices_valid = true;
        p.free();
        assert!(!p.indices_valid);
        assert!(p.l1.is_empty() && p.u.is_empty());
        p.init(4, 5, 2, &a, 0, 0, 2002).unwrap();
        assert_eq!(p.tag, 2002);
        p.dispose();
    }
}
