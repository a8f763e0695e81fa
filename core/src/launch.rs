//! Runs a closure once per grid position, each on its own thread.

use crate::comm::{ChannelTransport, Transport};
use crate::config::{GridOrder, HplConfig, SendMode};
use crate::error::Result;
use crate::grid::ProcessGrid;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Spawns `nprow * npcol` threads connected by a [`ChannelTransport`] mesh and
/// calls `f` with each thread's grid. Results are returned in world-rank order.
///
/// A panic on any rank is propagated to the caller.
pub fn run_grid<F, R>(
    nprow: usize,
    npcol: usize,
    order: GridOrder,
    mode: SendMode,
    timeout: Duration,
    f: F,
) -> Result<Vec<R>>
where
    F: Fn(ProcessGrid) -> R + Sync,
    R: Send,
{
    let transports = ChannelTransport::mesh(nprow * npcol, timeout)
        .into_iter()
        .map(|t| Arc::new(t) as Arc<dyn Transport>)
        .collect();
    run_on(transports, nprow, npcol, order, mode, f)
}

/// Like [`run_grid`], over caller-provided transports (one per world rank).
pub fn run_on<F, R>(
    transports: Vec<Arc<dyn Transport>>,
    nprow: usize,
    npcol: usize,
    order: GridOrder,
    mode: SendMode,
    f: F,
) -> Result<Vec<R>>
where
    F: Fn(ProcessGrid) -> R + Sync,
    R: Send,
{
    let f = &f;
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(transports.len());
        for transport in transports {
            let rank = transport.rank();
            let handle = thread::Builder::new()
                .name(format!("rank-{rank}"))
                .spawn_scoped(s, move || -> Result<R> {
                    let grid = ProcessGrid::new(transport, order, nprow, npcol, mode)?;
                    Ok(f(grid))
                })?;
            handles.push(handle);
        }
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

/// Runs `f` on the grid described by `cfg`.
pub fn run_config<F, R>(cfg: &HplConfig, f: F) -> Result<Vec<R>>
where
    F: Fn(ProcessGrid) -> R + Sync,
    R: Send,
{
    cfg.validate()?;
    run_grid(
        cfg.nprow,
        cfg.npcol,
        cfg.order,
        cfg.algo.send_mode,
        cfg.recv_timeout,
        f,
    )
}
