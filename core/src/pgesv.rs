//! Right-looking blocked LU driver.
//!
//! [`pdgesv0`] walks the augmented matrix `[A | b]` one column block at a
//! time. For each block it factors the panel, broadcasts it along the process
//! row and applies it to the trailing columns, right-hand side included. On
//! return `A` holds `L` and `U` and `b` holds `L^-1 P b`, so the solution is
//! one triangular solve away.
//!
//! Any failure of a step is fatal: it is escalated as
//! [`crate::error::HplError::Aborted`] naming the step, and nothing more is sent or
//! received by this process.

use crate::bcast::{self, BcastStatus};
use crate::config::{Algorithm, Tag, next_tag};
use crate::error::{HplError, Result};
use crate::grid::ProcessGrid;
use crate::matrix::DistMatrix;
use crate::panel::Panel;
use crate::pfact::{PanelFactor, ReferencePanelFactor};
use crate::update::{ReferenceUpdate, TrailingUpdate};
use std::thread;

/// Polls of a pending broadcast before blocking on it.
const BCAST_POLLS: usize = 64;

/// One iteration of the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationRecord {
    /// First global column of the panel.
    pub j: usize,
    pub jb: usize,
    pub tag: Tag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorizationSummary {
    pub iterations: Vec<IterationRecord>,
    /// Tag the next factorization on this grid should start from.
    pub next_tag: Tag,
}

/// Factors `a` with the reference panel factorization and update.
pub fn pdgesv(grid: &ProcessGrid, algo: &Algorithm, a: &mut DistMatrix) -> Result<FactorizationSummary> {
    pdgesv0(grid, algo, a, &ReferencePanelFactor, &ReferenceUpdate)
}

/// Factors the `N x (N + 1)` matrix `a` in place.
///
/// `N <= 2` is a no-op. Every process of `grid` must call this with the same
/// `algo` and matrix geometry.
pub fn pdgesv0<F, U>(
    grid: &ProcessGrid,
    algo: &Algorithm,
    a: &mut DistMatrix,
    factor: &F,
    update: &U,
) -> Result<FactorizationSummary>
where
    F: PanelFactor + ?Sized,
    U: TrailingUpdate + ?Sized,
{
    if a.n <= 2 {
        return Ok(FactorizationSummary {
            iterations: Vec::new(),
            next_tag: algo.tags.begin,
        });
    }
    factorize(grid, algo, a, factor, update).inspect_err(|e| {
        tracing::error!(rank = grid.rank(), error = %e, "factorization aborted");
    })
}

fn factorize<F, U>(
    grid: &ProcessGrid,
    algo: &Algorithm,
    a: &mut DistMatrix,
    factor: &F,
    update: &U,
) -> Result<FactorizationSummary>
where
    F: PanelFactor + ?Sized,
    U: TrailingUpdate + ?Sized,
{
    algo.validate().map_err(|e| e.abort("pdgesv0: arguments"))?;
    if a.nb == 0 {
        return Err(HplError::InvalidArgument("block size must be positive".into()).abort("pdgesv0: arguments"));
    }

    let (n, nb) = (a.n, a.nb);
    let mut summary = FactorizationSummary::default();
    let mut tag = algo.tags.begin;
    let mut panel = Panel::new(grid, algo, n, n + 1, nb.min(n), a, 0, 0, tag)
        .map_err(|e| e.abort("pdgesv0: panel allocation"))?;

    for j in (0..n).step_by(nb) {
        let jb = nb.min(n - j);
        panel.free();
        panel
            .init(n - j, n - j + 1, jb, a, j, j, tag)
            .map_err(|e| e.abort("pdgesv0: panel initialization"))?;

        factor
            .factor(&mut panel, a)
            .map_err(|e| e.abort("pdgesv0: panel factorization"))?;

        broadcast(&mut panel)?;

        update
            .update(&mut panel, a)
            .map_err(|e| e.abort("pdgesv0: trailing update"))?;

        tracing::debug!(rank = grid.rank(), j, jb, tag, "panel applied");
        summary.iterations.push(IterationRecord { j, jb, tag });
        tag = next_tag(tag, algo.tags);
    }

    panel.dispose();
    summary.next_tag = tag;
    Ok(summary)
}

fn broadcast(panel: &mut Panel<'_>) -> Result<()> {
    bcast::binit(panel).map_err(|e| e.abort("pdgesv0: broadcast start"))?;
    for _ in 0..BCAST_POLLS {
        match bcast::advance(panel).map_err(|e| e.abort("pdgesv0: broadcast progress"))? {
            BcastStatus::Complete => break,
            BcastStatus::Pending => thread::yield_now(),
        }
    }
    bcast::bwait(panel).map_err(|e| e.abort("pdgesv0: broadcast finish"))
}
