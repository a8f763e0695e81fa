//! Non-blocking panel broadcast along the process row.
//!
//! The process column owning the panel packs `L2 | L1 | DPIV` into one
//! message and pushes it through a topology of point-to-point sends. A
//! broadcast is driven in three steps:
//!
//! 1. [`binit`] starts it. The root sends right away and is done.
//! 2. [`advance`] polls: a process that has not yet received its copy checks
//!    for it without blocking, unpacks it and forwards it to its children.
//! 3. [`bwait`] blocks until the copy is in and releases the message buffer.
//!
//! Every process of the row must call `binit` and then `bwait` exactly once
//! per panel; `advance` may be called any number of times in between.

use crate::comm;
use crate::config::BcastTopology;
use crate::error::{HplError, Result};
use crate::panel::Panel;

/// Progress of the broadcast of one panel, as seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BcastState {
    /// No broadcast in flight.
    #[default]
    Idle,
    /// Still waiting for the message.
    Pending,
    /// Message received (or sent, on the root) and forwarded.
    Complete,
}

/// What [`advance`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcastStatus {
    Pending,
    Complete,
}

/// Parent and children of one process in a broadcast, as ranks relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BcastPlan {
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Where relative rank `rel` sits in a broadcast over `size` processes.
pub fn bcast_plan(topology: BcastTopology, size: usize, rel: usize) -> BcastPlan {
    let next = |r: usize| (r + 1 < size).then_some(r + 1);
    let ring = |rel: usize| BcastPlan {
        parent: rel.checked_sub(1),
        children: next(rel).into_iter().collect(),
    };

    match topology {
        BcastTopology::IncreasingRing => ring(rel),
        BcastTopology::ModifiedRing => match rel {
            0 => BcastPlan {
                parent: None,
                children: [1, 2].into_iter().filter(|&c| c < size).collect(),
            },
            1 => BcastPlan {
                parent: Some(0),
                children: Vec::new(),
            },
            2 => BcastPlan {
                parent: Some(0),
                children: next(2).into_iter().collect(),
            },
            _ => ring(rel),
        },
        BcastTopology::TwoRing => {
            if size <= 2 {
                return ring(rel);
            }
            // First ring: 1..=half, second ring: half + 1..size.
            let half = size / 2;
            if rel == 0 {
                return BcastPlan {
                    parent: None,
                    children: vec![1, half + 1],
                };
            }
            let (start, end) = if rel <= half { (1, half + 1) } else { (half + 1, size) };
            BcastPlan {
                parent: Some(if rel == start { 0 } else { rel - 1 }),
                children: (rel + 1 < end).then_some(rel + 1).into_iter().collect(),
            }
        }
    }
}

fn my_plan(panel: &Panel<'_>) -> (BcastPlan, usize) {
    let npcol = panel.grid.npcol;
    let rel = (panel.grid.mycol + npcol - panel.pcol) % npcol;
    (bcast_plan(panel.algo.bcast, npcol, rel), rel)
}

fn absolute(panel: &Panel<'_>, rel: usize) -> usize {
    (rel + panel.pcol) % panel.grid.npcol
}

fn forward(panel: &Panel<'_>, plan: &BcastPlan) -> Result<()> {
    for &child in &plan.children {
        comm::send(panel.grid.row(), &panel.bcast_buf, absolute(panel, child), panel.tag)?;
    }
    Ok(())
}

/// Starts the broadcast of `panel` along its process row.
pub fn binit(panel: &mut Panel<'_>) -> Result<()> {
    if panel.bcast != BcastState::Idle {
        return Err(HplError::InvalidArgument("broadcast already started".into()));
    }
    if panel.grid.npcol == 1 {
        panel.bcast = BcastState::Complete;
        return Ok(());
    }

    let (plan, rel) = my_plan(panel);
    if rel == 0 {
        panel.bcast_buf = panel.pack();
        forward(panel, &plan)?;
        panel.bcast = BcastState::Complete;
    } else {
        panel.bcast_buf = vec![0.0; panel.message_len()];
        panel.bcast = BcastState::Pending;
    }
    tracing::debug!(
        rank = panel.grid.rank(),
        tag = panel.tag,
        pcol = panel.pcol,
        topology = ?panel.algo.bcast,
        root = rel == 0,
        "panel broadcast started"
    );
    Ok(())
}

/// Makes progress on the broadcast without blocking.
pub fn advance(panel: &mut Panel<'_>) -> Result<BcastStatus> {
    match panel.bcast {
        BcastState::Complete => Ok(BcastStatus::Complete),
        BcastState::Idle => Err(HplError::InvalidArgument(
            "broadcast polled before it was started".into(),
        )),
        BcastState::Pending => {
            let (plan, _) = my_plan(panel);
            let parent = plan.parent.map(|p| absolute(panel, p)).unwrap_or(panel.pcol);
            let mut buf = std::mem::take(&mut panel.bcast_buf);
            let arrived = comm::try_recv(panel.grid.row(), &mut buf, parent, panel.tag);
            panel.bcast_buf = buf;
            if !arrived? {
                return Ok(BcastStatus::Pending);
            }
            finish(panel, &plan)?;
            Ok(BcastStatus::Complete)
        }
    }
}

fn finish(panel: &mut Panel<'_>, plan: &BcastPlan) -> Result<()> {
    let buf = std::mem::take(&mut panel.bcast_buf);
    panel.unpack(&buf);
    panel.bcast_buf = buf;
    forward(panel, plan)?;
    panel.bcast = BcastState::Complete;
    Ok(())
}

/// Completes the broadcast, blocking if needed, and releases its buffer.
pub fn bwait(panel: &mut Panel<'_>) -> Result<()> {
    match panel.bcast {
        BcastState::Idle => {
            return Err(HplError::InvalidArgument(
                "broadcast finalized before it was started".into(),
            ));
        }
        BcastState::Pending => {
            let (plan, _) = my_plan(panel);
            let parent = plan.parent.map(|p| absolute(panel, p)).unwrap_or(panel.pcol);
            let mut buf = std::mem::take(&mut panel.bcast_buf);
            let received = comm::recv(panel.grid.row(), &mut buf, parent, panel.tag);
            panel.bcast_buf = buf;
            received?;
            finish(panel, &plan)?;
        }
        BcastState::Complete => {}
    }
    panel.bcast_buf = Vec::new();
    panel.bcast = BcastState::Idle;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPOLOGIES: [BcastTopology; 3] = [
        BcastTopology::IncreasingRing,
        BcastTopology::ModifiedRing,
        BcastTopology::TwoRing,
    ];

    #[test]
    fn test_every_plan_is_a_tree_rooted_at_zero() {
        for topology in TOPOLOGIES {
            for size in 1..9 {
                let plans: Vec<BcastPlan> = (0..size).map(|r| bcast_plan(topology, size, r)).collect();
                assert_eq!(plans[0].parent, None);

                for (rel, plan) in plans.iter().enumerate().skip(1) {
                    let parent = plan.parent.expect("non-root without parent");
                    assert!(plans[parent].children.contains(&rel), "{topology:?} size {size}");
                }
                let mut reached = vec![false; size];
                let mut stack = vec![0];
                while let Some(r) = stack.pop() {
                    assert!(!reached[r]);
                    reached[r] = true;
                    stack.extend(&plans[r].children);
                }
                assert!(reached.iter().all(|&x| x), "{topology:?} size {size}");
            }
        }
    }

    #[test]
    fn test_plan_shapes() {
        assert_eq!(bcast_plan(BcastTopology::ModifiedRing, 5, 0).children, vec![1, 2]);
        assert!(bcast_plan(BcastTopology::ModifiedRing, 5, 1).children.is_empty());
        assert_eq!(bcast_plan(BcastTopology::ModifiedRing, 5, 2).children, vec![3]);

        assert_eq!(bcast_plan(BcastTopology::TwoRing, 5, 0).children, vec![1, 3]);
        assert_eq!(bcast_plan(BcastTopology::TwoRing, 5, 2).children, Vec::<usize>::new());
        assert_eq!(bcast_plan(BcastTopology::TwoRing, 5, 3).parent, Some(0));
        assert_eq!(bcast_plan(BcastTopology::TwoRing, 5, 4).parent, Some(3));

        assert_eq!(bcast_plan(BcastTopology::IncreasingRing, 3, 1).children, vec![2]);
    }
}
