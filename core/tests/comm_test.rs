use hpl_rs::comm::{self, ChannelTransport, Context, Envelope, Scope, Transport};
use hpl_rs::config::{Algorithm, GridOrder, SendMode, Tag};
use hpl_rs::error::{CommError, HplError};
use hpl_rs::launch::run_on;
use hpl_rs::matrix::DistMatrix;
use hpl_rs::pgesv::pdgesv;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn scopes(world: usize, mode: SendMode) -> Vec<Scope> {
    ChannelTransport::mesh(world, Duration::from_millis(200))
        .into_iter()
        .map(|t| Scope::new(Arc::new(t), (0..world).collect(), 0, mode).unwrap())
        .collect()
}

#[test]
fn test_empty_send_is_a_noop() {
    let s = scopes(2, SendMode::Contiguous);
    comm::send(&s[0], &[], 1, 2001).unwrap();
    // Nothing was queued, so a real message is the first to match.
    comm::send(&s[0], &[4.0], 1, 2001).unwrap();
    let mut buf = [0.0];
    comm::recv(&s[1], &mut buf, 0, 2001).unwrap();
    assert_eq!(buf, [4.0]);
    assert!(!comm::try_recv(&s[1], &mut buf, 0, 2001).unwrap());
    // The matching empty receive completes without waiting.
    comm::recv(&s[1], &mut [], 0, 2001).unwrap();
}

#[test]
fn test_datatype_mode_delivers_same_data() {
    let s = scopes(3, SendMode::Datatype);
    let data = [1.0, -2.0, 3.5];
    comm::send(&s[2], &data, 0, 7).unwrap();
    let mut buf = [0.0; 3];
    comm::recv(&s[0], &mut buf, 2, 7).unwrap();
    assert_eq!(buf, data);
}

#[test]
fn test_receive_length_mismatch() {
    let s = scopes(2, SendMode::Contiguous);
    comm::send(&s[0], &[1.0, 2.0], 1, 7).unwrap();
    let mut buf = [0.0; 3];
    let err = comm::recv(&s[1], &mut buf, 0, 7).unwrap_err();
    assert_eq!(err, CommError::LengthMismatch { expected: 3, got: 2 });
}

#[test]
fn test_send_to_non_member() {
    let s = scopes(2, SendMode::Contiguous);
    assert!(matches!(
        comm::send(&s[0], &[1.0], 5, 7),
        Err(CommError::InvalidRank { rank: 5, size: 2 })
    ));
}

/// Wraps a transport and fails every operation once `budget` operations have run.
struct FaultyTransport {
    inner: ChannelTransport,
    budget: usize,
    calls: AtomicUsize,
    calls_after_failure: Arc<AtomicUsize>,
}

impl FaultyTransport {
    fn tick(&self) -> Result<(), CommError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n > self.budget {
            self.calls_after_failure.fetch_add(1, Ordering::SeqCst);
        }
        if n >= self.budget {
            return Err(CommError::Injected(format!("operation {n}")));
        }
        Ok(())
    }
}

impl Transport for FaultyTransport {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn world_size(&self) -> usize {
        self.inner.world_size()
    }

    fn post(&self, dest: usize, envelope: Envelope) -> Result<(), CommError> {
        self.tick()?;
        self.inner.post(dest, envelope)
    }

    fn try_take(&self, src: usize, tag: Tag, context: Context) -> Result<Option<Envelope>, CommError> {
        self.tick()?;
        self.inner.try_take(src, tag, context)
    }

    fn take(&self, src: usize, tag: Tag, context: Context) -> Result<Envelope, CommError> {
        self.tick()?;
        self.inner.take(src, tag, context)
    }
}

#[test]
fn test_transport_failure_aborts_factorization() {
    for budget in [0, 1] {
        let mut mesh = ChannelTransport::mesh(2, Duration::from_millis(300));
        let faulty_inner = mesh.pop().unwrap();
        let healthy = mesh.pop().unwrap();
        let after_failure = Arc::new(AtomicUsize::new(0));
        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(healthy),
            Arc::new(FaultyTransport {
                inner: faulty_inner,
                budget,
                calls: AtomicUsize::new(0),
                calls_after_failure: after_failure.clone(),
            }),
        ];

        let results = run_on(transports, 1, 2, GridOrder::RowMajor, SendMode::Contiguous, |grid| {
            let mut a = DistMatrix::generate(&grid, 8, 4, 5).unwrap();
            pdgesv(&grid, &Algorithm::default(), &mut a)
        })
        .unwrap();

        match &results[1] {
            Err(err @ HplError::Aborted { site, .. }) => {
                assert!(site.starts_with("pdgesv0"), "{site}");
                assert!(matches!(err.root_cause(), HplError::Transport(CommError::Injected(_))));
            }
            other => panic!("budget {budget}: expected an abort, got {other:?}"),
        }
        // The healthy rank gives up once its peer stops talking.
        match &results[0] {
            Err(err) => assert!(matches!(
                err.root_cause(),
                HplError::Transport(CommError::Timeout { peer: 1, .. })
            )),
            Ok(summary) => panic!("budget {budget}: unexpected success {summary:?}"),
        }
        assert_eq!(after_failure.load(Ordering::SeqCst), 0, "budget {budget}");
    }
}
