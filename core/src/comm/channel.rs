use super::{Context, Envelope, Transport};
use crate::config::Tag;
use crate::error::CommError;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// An in-process transport where every rank is a thread.
///
/// Ranks are connected by a full mesh of unbounded `crossbeam` channels: each
/// rank owns one inbox and a sender to every inbox (its own included). Sends
/// never wait for the receiver. Messages that arrive before anyone asks for
/// them are parked in an unexpected-message queue and matched later.
pub struct ChannelTransport {
    rank: usize,
    world_size: usize,
    inbox: Receiver<Envelope>,
    peers: Vec<Sender<Envelope>>,
    unexpected: Mutex<VecDeque<Envelope>>,
    timeout: Duration,
}

impl ChannelTransport {
    /// Builds the transports of a `world_size`-rank mesh, indexed by rank.
    ///
    /// A blocking receive that waits longer than `timeout` fails with
    /// [`CommError::Timeout`] instead of hanging on a dead peer.
    pub fn mesh(world_size: usize, timeout: Duration) -> Vec<ChannelTransport> {
        let (txs, rxs): (Vec<_>, Vec<_>) = (0..world_size).map(|_| unbounded()).unzip();

        rxs.into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelTransport {
                rank,
                world_size,
                inbox,
                peers: txs.clone(),
                unexpected: Mutex::new(VecDeque::new()),
                timeout,
            })
            .collect()
    }

    fn take_unexpected(&self, src: usize, tag: Tag, context: Context) -> Option<Envelope> {
        let mut queue = self.unexpected.lock();
        let pos = queue.iter().position(|e| e.matches(src, tag, context))?;
        queue.remove(pos)
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank >= self.world_size {
            return Err(CommError::InvalidRank {
                rank,
                size: self.world_size,
            });
        }
        Ok(())
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn post(&self, dest: usize, envelope: Envelope) -> Result<(), CommError> {
        self.check_rank(dest)?;
        self.peers[dest]
            .send(envelope)
            .map_err(|_| CommError::Disconnected { peer: dest })
    }

    fn try_take(&self, src: usize, tag: Tag, context: Context) -> Result<Option<Envelope>, CommError> {
        self.check_rank(src)?;
        // Drain whatever has arrived so that matching sees every message in arrival order.
        loop {
            match self.inbox.try_recv() {
                Ok(envelope) => self.unexpected.lock().push_back(envelope),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(CommError::Disconnected { peer: src });
                }
            }
        }
        Ok(self.take_unexpected(src, tag, context))
    }

    fn take(&self, src: usize, tag: Tag, context: Context) -> Result<Envelope, CommError> {
        self.check_rank(src)?;
        if let Some(envelope) = self.take_unexpected(src, tag, context) {
            return Ok(envelope);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(remaining) {
                Ok(envelope) if envelope.matches(src, tag, context) => return Ok(envelope),
                Ok(envelope) => self.unexpected.lock().push_back(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CommError::Timeout {
                        peer: src,
                        tag,
                        timeout: self.timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CommError::Disconnected { peer: src });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Payload;
    use std::thread;

    fn envelope(src: usize, tag: Tag, context: Context, value: f64) -> Envelope {
        Envelope {
            src,
            tag,
            context,
            payload: Payload::Elements(vec![value]),
        }
    }

    #[test]
    fn test_mesh_properties() {
        let mesh = ChannelTransport::mesh(3, Duration::from_secs(1));
        assert_eq!(mesh.len(), 3);
        assert_eq!(mesh[2].rank(), 2);
        assert_eq!(mesh[2].world_size(), 3);
    }

    #[test]
    fn test_out_of_order_matching_keeps_fifo_per_key() {
        let mesh = ChannelTransport::mesh(2, Duration::from_secs(1));
        mesh[0].post(1, envelope(0, 5, 0, 1.0)).unwrap();
        mesh[0].post(1, envelope(0, 6, 0, 2.0)).unwrap();
        mesh[0].post(1, envelope(0, 5, 0, 3.0)).unwrap();

        let first = mesh[1].take(0, 6, 0).unwrap();
        assert_eq!(first.payload, Payload::Elements(vec![2.0]));
        let second = mesh[1].take(0, 5, 0).unwrap();
        assert_eq!(second.payload, Payload::Elements(vec![1.0]));
        let third = mesh[1].try_take(0, 5, 0).unwrap().unwrap();
        assert_eq!(third.payload, Payload::Elements(vec![3.0]));
        assert!(mesh[1].try_take(0, 5, 0).unwrap().is_none());
    }

    #[test]
    fn test_context_separates_traffic() {
        let mesh = ChannelTransport::mesh(2, Duration::from_millis(50));
        mesh[0].post(1, envelope(0, 5, 1, 1.0)).unwrap();
        assert!(mesh[1].try_take(0, 5, 2).unwrap().is_none());
        assert!(mesh[1].try_take(0, 5, 1).unwrap().is_some());
    }

    #[test]
    fn test_take_times_out() {
        let mesh = ChannelTransport::mesh(2, Duration::from_millis(20));
        let err = mesh[0].take(1, 9, 0).unwrap_err();
        assert!(matches!(err, CommError::Timeout { peer: 1, tag: 9, .. }));
    }

    #[test]
    fn test_cross_thread_delivery() {
        let mut mesh = ChannelTransport::mesh(2, Duration::from_secs(5));
        let t1 = mesh.pop().unwrap();
        let t0 = mesh.pop().unwrap();

        let handle = thread::spawn(move || {
            let got = t1.take(0, 1, 0).unwrap();
            t1.post(0, envelope(1, 2, 0, 42.0)).unwrap();
            got.payload
        });

        t0.post(1, envelope(0, 1, 0, 7.0)).unwrap();
        let reply = t0.take(1, 2, 0).unwrap();
        assert_eq!(reply.payload, Payload::Elements(vec![42.0]));
        assert_eq!(handle.join().unwrap(), Payload::Elements(vec![7.0]));
    }

    #[test]
    fn test_invalid_rank() {
        let mesh = ChannelTransport::mesh(1, Duration::from_millis(10));
        let err = mesh[0].post(4, envelope(0, 1, 0, 0.0)).unwrap_err();
        assert_eq!(err, CommError::InvalidRank { rank: 4, size: 1 });
    }
}
