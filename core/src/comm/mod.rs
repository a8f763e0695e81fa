//! # Point-to-point transport
//!
//! Every protocol in this crate (panel broadcast, spread, equilibration, roll,
//! panel gather) is composed from one primitive: a blocking send of a
//! contiguous `f64` buffer to one member of a communication [`Scope`], plus its
//! receive counterparts.
//!
//! The wire is abstracted by the [`Transport`] trait, so the same protocol code
//! runs over:
//! - [`channel::ChannelTransport`]: an in-process mesh of `crossbeam` channels,
//!   one thread per grid position (tests, benches, single-node runs).
//! - any message-passing library wrapped behind the trait.
//!
//! ## Matching rules
//!
//! A receive names its source, tag and the scope it runs in. Messages from one
//! source with the same tag and scope are delivered in the order they were
//! sent. Scopes carry distinct context ids, so traffic on the row scope never
//! satisfies a receive on the column scope.

use crate::config::{SendMode, Tag};
use crate::error::CommError;
use std::fmt;
use std::sync::Arc;

pub mod channel;

pub use channel::ChannelTransport;

/// Identifies a communication scope; part of every match.
pub type Context = u32;

/// Describes the layout of a typed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Contiguous { count: usize },
}

impl Datatype {
    fn extent(&self) -> usize {
        match self {
            Datatype::Contiguous { count } => *count,
        }
    }
}

/// What travels on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw elements.
    Elements(Vec<f64>),
    /// One element of a derived datatype.
    Typed { datatype: Datatype, data: Vec<f64> },
}

impl Payload {
    /// Unpacks the payload into its elements.
    pub fn into_elements(self) -> Result<Vec<f64>, CommError> {
        match self {
            Payload::Elements(data) => Ok(data),
            Payload::Typed { datatype, data } => {
                if datatype.extent() != data.len() {
                    return Err(CommError::LengthMismatch {
                        expected: datatype.extent(),
                        got: data.len(),
                    });
                }
                Ok(data)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Elements(data) | Payload::Typed { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A message together with its matching information.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// World rank of the sender.
    pub src: usize,
    pub tag: Tag,
    pub context: Context,
    pub payload: Payload,
}

impl Envelope {
    pub fn matches(&self, src: usize, tag: Tag, context: Context) -> bool {
        self.src == src && self.tag == tag && self.context == context
    }
}

/// Abstraction for the process-to-process wire.
///
/// Ranks are world ranks. `post` must not wait for the receiver to post a
/// matching receive: it returns as soon as the message is owned by the
/// transport.
pub trait Transport: Send + Sync {
    /// Returns the world rank of the calling process.
    fn rank(&self) -> usize;

    /// Returns the number of processes in the world.
    fn world_size(&self) -> usize;

    /// Hands `envelope` to the transport for delivery to `dest`.
    fn post(&self, dest: usize, envelope: Envelope) -> Result<(), CommError>;

    /// Removes the oldest message matching `(src, tag, context)` if one has arrived.
    fn try_take(&self, src: usize, tag: Tag, context: Context) -> Result<Option<Envelope>, CommError>;

    /// Blocks until a message matching `(src, tag, context)` arrives and removes it.
    fn take(&self, src: usize, tag: Tag, context: Context) -> Result<Envelope, CommError>;
}

/// An ordered group of processes that talk to each other.
///
/// Members are addressed by their index in the scope (`0..size()`).
#[derive(Clone)]
pub struct Scope {
    transport: Arc<dyn Transport>,
    members: Vec<usize>,
    me: usize,
    context: Context,
    mode: SendMode,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("members", &self.members)
            .field("me", &self.me)
            .field("context", &self.context)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Scope {
    /// Creates a scope over the given world ranks. The caller must be a member.
    pub fn new(
        transport: Arc<dyn Transport>,
        members: Vec<usize>,
        context: Context,
        mode: SendMode,
    ) -> Result<Self, CommError> {
        let world = transport.rank();
        let me = members
            .iter()
            .position(|&r| r == world)
            .ok_or(CommError::InvalidRank {
                rank: world,
                size: members.len(),
            })?;
        if let Some(&bad) = members.iter().find(|&&r| r >= transport.world_size()) {
            return Err(CommError::InvalidRank {
                rank: bad,
                size: transport.world_size(),
            });
        }
        Ok(Self {
            transport,
            members,
            me,
            context,
            mode,
        })
    }

    /// Index of the calling process inside the scope.
    pub fn rank(&self) -> usize {
        self.me
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn context(&self) -> Context {
        self.context
    }

    pub fn mode(&self) -> SendMode {
        self.mode
    }

    /// World rank of scope member `index`.
    pub fn world_rank(&self, index: usize) -> Result<usize, CommError> {
        self.members
            .get(index)
            .copied()
            .ok_or(CommError::InvalidRank {
                rank: index,
                size: self.members.len(),
            })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

/// Sends `buf` to member `dest` of `scope` under `tag`.
///
/// An empty buffer is a no-op that succeeds without touching the transport.
/// Returns once the data has been handed to the transport.
pub fn send(scope: &Scope, buf: &[f64], dest: usize, tag: Tag) -> Result<(), CommError> {
    if buf.is_empty() {
        return Ok(());
    }
    let world_dest = scope.world_rank(dest)?;
    let payload = match scope.mode {
        SendMode::Contiguous => Payload::Elements(buf.to_vec()),
        SendMode::Datatype => Payload::Typed {
            datatype: Datatype::Contiguous { count: buf.len() },
            data: buf.to_vec(),
        },
    };
    tracing::trace!(
        dest = world_dest,
        tag,
        context = scope.context,
        count = buf.len(),
        "send"
    );
    scope.transport.post(
        world_dest,
        Envelope {
            src: scope.transport.rank(),
            tag,
            context: scope.context,
            payload,
        },
    )
}

/// Receives exactly `buf.len()` elements from member `src` of `scope`.
///
/// An empty buffer is a no-op: the matching send was a no-op too.
pub fn recv(scope: &Scope, buf: &mut [f64], src: usize, tag: Tag) -> Result<(), CommError> {
    if buf.is_empty() {
        return Ok(());
    }
    let world_src = scope.world_rank(src)?;
    let envelope = scope.transport.take(world_src, tag, scope.context)?;
    copy_payload(envelope.payload, buf)
}

/// Non-blocking variant of [`recv`]; returns `true` once the message has been copied.
pub fn try_recv(scope: &Scope, buf: &mut [f64], src: usize, tag: Tag) -> Result<bool, CommError> {
    if buf.is_empty() {
        return Ok(true);
    }
    let world_src = scope.world_rank(src)?;
    match scope.transport.try_take(world_src, tag, scope.context)? {
        Some(envelope) => {
            copy_payload(envelope.payload, buf)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn copy_payload(payload: Payload, buf: &mut [f64]) -> Result<(), CommError> {
    let data = payload.into_elements()?;
    if data.len() != buf.len() {
        return Err(CommError::LengthMismatch {
            expected: buf.len(),
            got: data.len(),
        });
    }
    buf.copy_from_slice(&data);
    Ok(())
}
