//! Error types.
//!
//! Two layers, mirroring where failures originate:
//!
//! - [`CommError`]: anything the transport reports. Callers never look inside
//!   transport-specific codes; a failed send or receive is a single opaque signal.
//! - [`HplError`]: everything the factorization can report, including wrapped
//!   transport and kernel failures, allocation failures tagged with their call
//!   site, and the [`HplError::Aborted`] wrapper the driver uses to escalate.

use hpl_rs_kernels::KernelError;
use std::time::Duration;
use thiserror::Error;

/// Error type for the transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    /// The peer (or the whole mesh) has gone away.
    #[error("Transport disconnected while talking to rank {peer}")]
    Disconnected { peer: usize },
    /// A blocking receive waited longer than the configured timeout.
    #[error("Timed out after {timeout:?} waiting for rank {peer} (tag {tag})")]
    Timeout {
        peer: usize,
        tag: u32,
        timeout: Duration,
    },
    /// A rank outside the communication scope was addressed.
    #[error("Rank {rank} is outside a scope of size {size}")]
    InvalidRank { rank: usize, size: usize },
    /// The received payload does not fit the receive buffer.
    #[error("Message length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    /// A failure produced on purpose by a fault-injecting transport.
    #[error("Injected transport failure: {0}")]
    Injected(String),
}

/// Error type for the factorization.
#[derive(Error, Debug)]
pub enum HplError {
    #[error("Transport failure: {0}")]
    Transport(#[from] CommError),

    #[error("Memory allocation failed in {site}")]
    Allocation { site: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Kernel failure: {0}")]
    Kernel(#[from] KernelError),

    #[error("Failed to start a rank thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Fatal failure escalated by the driver; `site` names the phase that failed.
    #[error("Factorization aborted in {site}: {source}")]
    Aborted {
        site: &'static str,
        #[source]
        source: Box<HplError>,
    },
}

impl HplError {
    /// Wraps `self` as a fatal abort raised at `site`.
    pub fn abort(self, site: &'static str) -> Self {
        match self {
            already @ HplError::Aborted { .. } => already,
            other => HplError::Aborted {
                site,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through [`HplError::Aborted`].
    pub fn root_cause(&self) -> &HplError {
        match self {
            HplError::Aborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, HplError>;
