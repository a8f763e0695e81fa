//! Process grid and block-cyclic index arithmetic.
//!
//! A `P x Q` grid places world ranks either row-major
//! (`rank = myrow * Q + mycol`) or column-major (`rank = mycol * P + myrow`).
//! Every process gets three scopes: the whole grid, its process row (members
//! indexed by process column) and its process column (members indexed by
//! process row).
//!
//! Matrices are distributed block-cyclically with block size `nb` in both
//! dimensions, starting at process 0. The helpers below convert between global
//! indices, owning process and local indices.

use crate::comm::{Context, Scope, Transport};
use crate::config::{GridOrder, SendMode};
use crate::error::{HplError, Result};
use std::sync::Arc;

const ALL_CONTEXT: Context = 0;
const ROW_CONTEXT: Context = 1;
const COL_CONTEXT: Context = 2;

/// Immutable description of this process's place in the grid.
#[derive(Debug, Clone)]
pub struct ProcessGrid {
    pub order: GridOrder,
    pub nprow: usize,
    pub npcol: usize,
    pub myrow: usize,
    pub mycol: usize,
    all: Scope,
    row: Scope,
    col: Scope,
}

impl ProcessGrid {
    /// Places the caller on an `nprow x npcol` grid.
    ///
    /// # Errors
    ///
    /// Returns `HplError::InvalidArgument` if the grid does not cover exactly
    /// the transport's world.
    pub fn new(
        transport: Arc<dyn Transport>,
        order: GridOrder,
        nprow: usize,
        npcol: usize,
        mode: SendMode,
    ) -> Result<Self> {
        let world = transport.world_size();
        if nprow == 0 || npcol == 0 || nprow * npcol != world {
            return Err(HplError::InvalidArgument(format!(
                "a {nprow}x{npcol} grid cannot be built from {world} processes"
            )));
        }

        let rank = transport.rank();
        let (myrow, mycol) = match order {
            GridOrder::RowMajor => (rank / npcol, rank % npcol),
            GridOrder::ColumnMajor => (rank % nprow, rank / nprow),
        };
        let place = |r: usize, c: usize| match order {
            GridOrder::RowMajor => r * npcol + c,
            GridOrder::ColumnMajor => c * nprow + r,
        };

        let all = Scope::new(transport.clone(), (0..world).collect(), ALL_CONTEXT, mode)?;
        let row = Scope::new(
            transport.clone(),
            (0..npcol).map(|c| place(myrow, c)).collect(),
            ROW_CONTEXT,
            mode,
        )?;
        let col = Scope::new(
            transport,
            (0..nprow).map(|r| place(r, mycol)).collect(),
            COL_CONTEXT,
            mode,
        )?;

        tracing::debug!(rank, myrow, mycol, nprow, npcol, "process grid ready");
        Ok(Self {
            order,
            nprow,
            npcol,
            myrow,
            mycol,
            all,
            row,
            col,
        })
    }

    /// Scope over every process of the grid, indexed by world rank.
    pub fn all(&self) -> &Scope {
        &self.all
    }

    /// Scope over my process row, indexed by process column.
    pub fn row(&self) -> &Scope {
        &self.row
    }

    /// Scope over my process column, indexed by process row.
    pub fn col(&self) -> &Scope {
        &self.col
    }

    pub fn rank(&self) -> usize {
        self.all.rank()
    }

    /// World rank of grid position `(r, c)`.
    pub fn rank_of(&self, r: usize, c: usize) -> usize {
        match self.order {
            GridOrder::RowMajor => r * self.npcol + c,
            GridOrder::ColumnMajor => c * self.nprow + r,
        }
    }
}

/// Number of entries of an `n`-long dimension owned by process `iproc` out of `nprocs`.
pub fn numroc(n: usize, nb: usize, iproc: usize, nprocs: usize) -> usize {
    let nblocks = n / nb;
    let mut count = (nblocks / nprocs) * nb;
    let extra = nblocks % nprocs;
    if iproc < extra {
        count += nb;
    } else if iproc == extra {
        count += n % nb;
    }
    count
}

/// Process owning global index `ig`.
pub fn indxg2p(ig: usize, nb: usize, nprocs: usize) -> usize {
    (ig / nb) % nprocs
}

/// Local index of global index `ig` on its owning process.
pub fn indxg2l(ig: usize, nb: usize, nprocs: usize) -> usize {
    (ig / (nb * nprocs)) * nb + ig % nb
}

/// Global index of local index `il` on process `iproc`.
pub fn indxl2g(il: usize, nb: usize, iproc: usize, nprocs: usize) -> usize {
    ((il / nb) * nprocs + iproc) * nb + il % nb
}
