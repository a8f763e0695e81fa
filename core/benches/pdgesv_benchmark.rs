use criterion::{Criterion, criterion_group, criterion_main};
use hpl_rs::config::{Algorithm, BcastTopology, GridOrder, SendMode};
use hpl_rs::launch::run_grid;
use hpl_rs::matrix::DistMatrix;
use hpl_rs::pgesv::pdgesv;
use std::hint::black_box;
use std::time::Duration;

fn factor(nprow: usize, npcol: usize, n: usize, nb: usize, algo: &Algorithm) {
    run_grid(
        nprow,
        npcol,
        GridOrder::RowMajor,
        algo.send_mode,
        Duration::from_secs(60),
        |grid| {
            let mut a = DistMatrix::generate(&grid, n, nb, 42).unwrap();
            black_box(pdgesv(&grid, algo, &mut a).unwrap());
        },
    )
    .unwrap();
}

fn benchmark_pdgesv(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdgesv");
    group.sample_size(10);

    let algo = Algorithm::default();
    for &(nprow, npcol) in &[(1, 1), (2, 2), (4, 1), (1, 4)] {
        group.bench_function(format!("n256_nb32_{}x{}", nprow, npcol), |b| {
            b.iter(|| factor(nprow, npcol, 256, 32, &algo))
        });
    }
    group.finish();
}

fn benchmark_bcast_topologies(c: &mut Criterion) {
    let mut group = c.benchmark_group("bcast");
    group.sample_size(10);

    for bcast in [
        BcastTopology::IncreasingRing,
        BcastTopology::ModifiedRing,
        BcastTopology::TwoRing,
    ] {
        let algo = Algorithm {
            bcast,
            send_mode: SendMode::Contiguous,
            ..Algorithm::default()
        };
        group.bench_function(format!("{:?}_1x6", bcast), |b| {
            b.iter(|| factor(1, 6, 192, 16, &algo))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_pdgesv, benchmark_bcast_topologies);
criterion_main!(benches);
