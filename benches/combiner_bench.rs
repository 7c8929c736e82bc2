use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

use weighted_combiner::{stochastic_acceptance, Combiner, CombinerConfig, Priority};

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

fn filled_combiner(weights: &[f64], per_input: usize) -> Combiner<u64> {
    let combiner = Combiner::with_config(CombinerConfig {
        input_capacity: per_input,
        ..CombinerConfig::default()
    })
    .expect("valid bench config");
    for &weight in weights {
        let input = combiner.add_input(weight, IDLE_TIMEOUT);
        for value in 0..per_input as u64 {
            input.push(value).unwrap();
        }
    }
    combiner
}

fn bench_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("combiner_poll");

    let even: Vec<f64> = vec![1.0; 16];
    let skewed: Vec<f64> = (0..16).map(|i| if i == 0 { 100.0 } else { 1.0 }).collect();

    for (name, weights) in [("even_16", &even), ("skewed_16", &skewed)] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || filled_combiner(weights, 1_000),
                |combiner| {
                    for _ in 0..1_000 {
                        black_box(combiner.poll());
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("stochastic_acceptance");
    let weights: Vec<Priority> = (1..=64)
        .map(|i| Priority::new(f64::from(i)).unwrap())
        .collect();
    let max = Priority::new(64.0).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    group.bench_function("draw_64", |b| {
        b.iter(|| stochastic_acceptance(black_box(&weights), max, &mut rng));
    });

    group.finish();
}

fn bench_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("combiner_input");

    group.bench_function("push_then_poll", |b| {
        let combiner = Combiner::<u64>::new();
        let input = combiner.add_input(1.0, IDLE_TIMEOUT);
        b.iter(|| {
            input.push(black_box(1)).unwrap();
            black_box(combiner.poll());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_poll, bench_selection, bench_input);
criterion_main!(benches);
