//! Algorithm parameters and run configuration.

use crate::error::{HplError, Result};
use std::time::Duration;

/// Message tag attached to point-to-point traffic.
pub type Tag = u32;

/// First tag reserved for factorization traffic.
pub const MSGID_BEGIN_FACT: Tag = 2001;
/// Last tag reserved for factorization traffic.
pub const MSGID_END_FACT: Tag = 3000;

/// A contiguous, inclusive interval of tags reserved for one kind of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRange {
    pub begin: Tag,
    pub end: Tag,
}

impl TagRange {
    pub const FACTORIZATION: TagRange = TagRange {
        begin: MSGID_BEGIN_FACT,
        end: MSGID_END_FACT,
    };

    pub fn new(begin: Tag, end: Tag) -> Result<Self> {
        if begin > end {
            return Err(HplError::InvalidArgument(format!(
                "empty tag range {begin}..={end}"
            )));
        }
        Ok(Self { begin, end })
    }

    pub fn contains(&self, tag: Tag) -> bool {
        (self.begin..=self.end).contains(&tag)
    }
}

impl Default for TagRange {
    fn default() -> Self {
        Self::FACTORIZATION
    }
}

/// Next tag after `tag`, wrapping to `range.begin` past `range.end`.
pub fn next_tag(tag: Tag, range: TagRange) -> Tag {
    if tag >= range.end {
        range.begin
    } else {
        tag + 1
    }
}

/// Topology used to broadcast a factored panel along its process row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BcastTopology {
    /// Root sends to its right neighbour, every process forwards to the next.
    #[default]
    IncreasingRing,
    /// Root sends to its right neighbour (which does not forward) and then to
    /// the one after, which starts the ring.
    ModifiedRing,
    /// Two rings over the two halves of the row, both fed by the root.
    TwoRing,
}

/// How [`crate::comm::send`] hands buffers to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Raw element payload.
    #[default]
    Contiguous,
    /// Payload described by a committed contiguous datatype. Compatibility path.
    Datatype,
}

/// Placement of world ranks on the process grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

/// Algorithm parameters threaded through every call of the factorization.
#[derive(Debug, Clone, PartialEq)]
pub struct Algorithm {
    pub bcast: BcastTopology,
    pub send_mode: SendMode,
    /// Rebalance the row-panel pieces before the roll phase.
    pub equilibrate: bool,
    /// Width of the column chunks the trailing update swaps and updates at a
    /// time; `None` updates all local trailing columns at once.
    pub update_chunk: Option<usize>,
    pub tags: TagRange,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self {
            bcast: BcastTopology::default(),
            send_mode: SendMode::default(),
            equilibrate: true,
            update_chunk: None,
            tags: TagRange::default(),
        }
    }
}

impl Algorithm {
    pub fn validate(&self) -> Result<()> {
        if self.update_chunk == Some(0) {
            return Err(HplError::InvalidArgument(
                "update chunk width must be positive".into(),
            ));
        }
        if self.tags.begin > self.tags.end {
            return Err(HplError::InvalidArgument("empty tag range".into()));
        }
        Ok(())
    }
}

/// Configuration of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct HplConfig {
    /// Global problem size `N` (the matrix is `N x (N + 1)`).
    pub n: usize,
    /// Block size `nb` of the block-cyclic distribution and of the panels.
    pub nb: usize,
    pub nprow: usize,
    pub npcol: usize,
    pub order: GridOrder,
    /// Seed of the matrix generator.
    pub seed: u64,
    /// Upper bound on a single blocking receive.
    pub recv_timeout: Duration,
    pub algo: Algorithm,
}

impl Default for HplConfig {
    fn default() -> Self {
        Self {
            n: 1000,
            nb: 64,
            nprow: 1,
            npcol: 1,
            order: GridOrder::RowMajor,
            seed: 42,
            recv_timeout: Duration::from_secs(60),
            algo: Algorithm::default(),
        }
    }
}

impl HplConfig {
    /// A small run suitable for smoke tests.
    pub fn small() -> Self {
        Self {
            n: 64,
            nb: 8,
            nprow: 2,
            npcol: 2,
            ..Self::default()
        }
    }

    pub fn with_grid(mut self, nprow: usize, npcol: usize) -> Self {
        self.nprow = nprow;
        self.npcol = npcol;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.nb == 0 {
            return Err(HplError::InvalidArgument("block size must be positive".into()));
        }
        if self.nprow == 0 || self.npcol == 0 {
            return Err(HplError::InvalidArgument(format!(
                "invalid process grid {}x{}",
                self.nprow, self.npcol
            )));
        }
        self.algo.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_tag_advances_and_wraps() {
        let range = TagRange::default();
        assert_eq!(next_tag(MSGID_BEGIN_FACT, range), MSGID_BEGIN_FACT + 1);
        assert_eq!(next_tag(MSGID_END_FACT, range), MSGID_BEGIN_FACT);

        let tiny = TagRange::new(7, 8).unwrap();
        assert_eq!(next_tag(7, tiny), 8);
        assert_eq!(next_tag(8, tiny), 7);

        let single = TagRange::new(5, 5).unwrap();
        assert_eq!(next_tag(5, single), 5);
    }

    #[test]
    fn test_validation() {
        assert!(HplConfig::default().validate().is_ok());
        assert!(HplConfig::small().with_grid(0, 2).validate().is_err());

        let mut cfg = HplConfig::small();
        cfg.algo.update_chunk = Some(0);
        assert!(cfg.validate().is_err());
        assert!(TagRange::new(9, 3).is_err());
    }
}
