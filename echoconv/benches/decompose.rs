use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use echoconv::ConvolutionExplorer;

/// Echo decomposition of the default pulse and exponential at increasing echo density.
fn decompose_default(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose");
    for rate in [10.0, 100.0, 1000.0] {
        let mut explorer = ConvolutionExplorer::new();
        explorer
            .set_echo_rate(rate)
            .expect("echo rate should be valid");
        explorer.set_tau(7.5).expect("tau should be valid");
        group.bench_with_input(
            BenchmarkId::from_parameter(rate),
            &explorer,
            |bench, explorer| bench.iter(|| black_box(explorer).decompose()),
        );
    }
    group.finish();
}

/// Full recompute after a formula change.
fn recompute_on_expression(c: &mut Criterion) {
    let mut explorer = ConvolutionExplorer::new();
    let formulas = ["exp(-t)", "exp(-2 * t) * cos(3 * t)"];
    let mut i = 0;
    c.bench_function("set_expression", |bench| {
        bench.iter(|| {
            i ^= 1;
            explorer
                .set_expression(echoconv::SignalId::H, black_box(formulas[i]))
                .expect("formula should be valid")
        })
    });
}

criterion_group!(benches, decompose_default, recompute_on_expression);
criterion_main!(benches);
