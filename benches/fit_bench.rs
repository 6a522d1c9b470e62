use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fphot::find_peaks;
use fphot::fit::{fit_exp2, linspace01};

fn decay(n: usize) -> Vec<f64> {
    linspace01(n)
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            2.0 * (-8.0 * x).exp() + (-1.5 * x).exp() + 0.5 + 0.01 * (i as f64 * 0.37).sin()
        })
        .collect()
}

fn bench_fit(c: &mut Criterion) {
    for n in [1_000, 10_000] {
        let y = decay(n);
        let x = linspace01(n);
        c.bench_function(&format!("fit_exp2 n={n}"), |b| {
            b.iter(|| fit_exp2(black_box(&y), black_box(&x)))
        });
    }
}

fn bench_peaks(c: &mut Criterion) {
    let y: Vec<f64> = (0..100_000).map(|i| (i as f64 * 0.05).sin() + 0.3 * (i as f64 * 0.9).sin()).collect();
    c.bench_function("find_peaks n=100000", |b| {
        b.iter(|| find_peaks(black_box(&y), 0.5))
    });
}

criterion_group!(benches, bench_fit, bench_peaks);
criterion_main!(benches);
