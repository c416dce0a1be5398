use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pairing_arena::{Context, Element, Fr, G1, G2, IntegerLike, MulBy, Point};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn inputs<P: Point + MulBy<Fr>>(ctx: &Context, n: usize) -> (Vec<P>, Vec<Fr>) {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let g = P::generator(ctx).unwrap();
    let points = (0..n)
        .map(|_| ctx.mul(&g, &Fr::random(ctx, &mut rng).unwrap()).unwrap())
        .collect();
    let scalars = (0..n).map(|_| Fr::random(ctx, &mut rng).unwrap()).collect();
    (points, scalars)
}

fn bench_group<P: Point + MulBy<Fr>>(c: &mut Criterion, name: &str) {
    let ctx = Context::bls12_381().unwrap();
    let mut group = c.benchmark_group(name);
    for size in [16usize, 256, 1 << 10] {
        let (points, scalars) = inputs::<P>(&ctx, size);
        group.bench_with_input(BenchmarkId::new("mul_vec", size), &size, |b, _| {
            b.iter(|| black_box(ctx.mul_vec(black_box(&points), black_box(&scalars)).unwrap()));
        });
        if size <= 256 {
            group.bench_with_input(BenchmarkId::new("naive", size), &size, |b, _| {
                b.iter(|| {
                    points.iter().zip(&scalars).fold(P::new(&ctx), |acc, (p, s)| {
                        ctx.add(&acc, &ctx.mul(p, s).unwrap()).unwrap()
                    })
                });
            });
        }
    }
    group.finish();
}

fn criterion_benches(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
    bench_group::<G1>(c, "msm_g1");
    bench_group::<G2>(c, "msm_g2");
}

criterion_group!(benches, criterion_benches);
criterion_main!(benches);
