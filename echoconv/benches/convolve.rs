use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use echoconv::kernel::KernelLifecycle;
use echoconv::signal::traits::Convolve1D;
use echoconv::signal::{ConvolveConfig, ConvolveKernel};
use ndarray::Array1;
use rand::Rng;

/// Uniform noise of length `n`.
fn randomized_signal(n: usize) -> Array1<f64> {
    let mut rng = rand::rng();
    Array1::from_iter((0..n).map(|_| rng.random_range(-1.0..1.0)))
}

/// Full convolution at the explorer's default size and at a few larger ones.
fn convolve_full(c: &mut Criterion) {
    let kernel = ConvolveKernel::try_new(ConvolveConfig { scale: 0.01 })
        .expect("convolve kernel config should be valid");

    let mut group = c.benchmark_group("convolve_full");
    for n in [1000usize, 4000, 16000] {
        let x = randomized_signal(n);
        let h = randomized_signal(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(x, h), |bench, (x, h)| {
            bench.iter(|| kernel.run_alloc(black_box(x), black_box(h)))
        });
    }
    group.finish();
}

criterion_group!(benches, convolve_full);
criterion_main!(benches);
