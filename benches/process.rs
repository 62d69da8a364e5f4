//! Per-Sample Processing Benchmarks
//!
//! Validates that every generator stays well inside its real-time budget.
//! For a mono voice at 44.1 kHz, one tick must cost far less than 22.7 us;
//! the polyphonic cases scale that budget by channel count.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use aleator::prelude::*;

const SAMPLE_RATE: f64 = 44100.0;
const BUFFER_SIZE: usize = 256;
const CHANNEL_COUNTS: [usize; 3] = [1, 4, 16];

fn run_buffer(module: &mut dyn PolyModule, inputs: &PortValues, outputs: &mut PortValues) {
    let args = ProcessArgs::new(SAMPLE_RATE);
    for _ in 0..BUFFER_SIZE {
        module.tick(&args, inputs, outputs);
    }
}

fn bench_random_walks(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_walks");
    group.throughput(Throughput::Elements(BUFFER_SIZE as u64));

    group.bench_function("ornstein_uhlenbeck", |b| {
        let mut module = OrnsteinUhlenbeck::new(SAMPLE_RATE);
        let inputs = PortValues::new();
        let mut outputs = PortValues::new();
        b.iter(|| {
            run_buffer(&mut module, &inputs, &mut outputs);
            black_box(outputs.voltage(OrnsteinUhlenbeck::<Rng>::SIG_OUTPUT, 0))
        });
    });

    group.bench_function("iou", |b| {
        let mut module = Iou::new(SAMPLE_RATE);
        let inputs = PortValues::new();
        let mut outputs = PortValues::new();
        b.iter(|| {
            run_buffer(&mut module, &inputs, &mut outputs);
            black_box(outputs.voltage(Iou::<Rng>::IOU_OUTPUT, 0))
        });
    });

    group.bench_function("brownian_bridge", |b| {
        let mut module = BrownianBridge::new(SAMPLE_RATE);
        let inputs = PortValues::new();
        let mut outputs = PortValues::new();
        b.iter(|| {
            run_buffer(&mut module, &inputs, &mut outputs);
            black_box(outputs.voltage(BrownianBridge::<Rng>::SIG_OUTPUT, 0))
        });
    });

    group.finish();
}

fn bench_chaos(c: &mut Criterion) {
    let mut group = c.benchmark_group("chaos");
    group.throughput(Throughput::Elements(BUFFER_SIZE as u64));

    group.bench_function("rossler_rustler", |b| {
        let mut module = RosslerRustler::new(SAMPLE_RATE);
        let inputs = PortValues::new();
        let mut outputs = PortValues::new();
        b.iter(|| {
            run_buffer(&mut module, &inputs, &mut outputs);
            black_box(outputs.voltage(RosslerRustler::X_OUTPUT, 0))
        });
    });

    group.bench_function("dynamo", |b| {
        let mut module = Dynamo::new(SAMPLE_RATE);
        let mut inputs = PortValues::new();
        inputs.set_mono(Dynamo::IN_INPUT, 2.0);
        let mut outputs = PortValues::new();
        b.iter(|| {
            run_buffer(&mut module, &inputs, &mut outputs);
            black_box(outputs.voltage(Dynamo::X_OUTPUT, 0))
        });
    });

    group.finish();
}

fn bench_oscillator_banks(c: &mut Criterion) {
    let mut group = c.benchmark_group("oscillator_banks");
    group.throughput(Throughput::Elements(BUFFER_SIZE as u64));

    for channels in CHANNEL_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("firefly", channels),
            &channels,
            |b, &channels| {
                let mut module = Firefly::new(SAMPLE_RATE);
                let mut inputs = PortValues::new();
                inputs.set(Firefly::VOCT_INPUT, PolyValue::with_channels(channels));
                let mut outputs = PortValues::new();
                b.iter(|| {
                    run_buffer(&mut module, &inputs, &mut outputs);
                    black_box(outputs.voltage(Firefly::SM_OUTPUT, 0))
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("warbler", channels),
            &channels,
            |b, &channels| {
                let mut module = Warbler::new(SAMPLE_RATE);
                let mut inputs = PortValues::new();
                inputs.set(Warbler::PITCH_INPUT, PolyValue::with_channels(channels));
                let mut outputs = PortValues::new();
                b.iter(|| {
                    run_buffer(&mut module, &inputs, &mut outputs);
                    black_box(outputs.voltage(Warbler::X_OUTPUT, 0))
                });
            },
        );
    }

    group.finish();
}

fn bench_state_machines(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_machines");
    group.throughput(Throughput::Elements(BUFFER_SIZE as u64));

    // Alternate trigger high/low so the machines actually advance
    group.bench_function("rosenchance", |b| {
        let mut module = Rosenchance::new(SAMPLE_RATE);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();
        let args = ProcessArgs::new(SAMPLE_RATE);
        b.iter(|| {
            for i in 0..BUFFER_SIZE {
                let v = if i % 2 == 0 { 5.0 } else { 0.0 };
                inputs.set_mono(Rosenchance::<Rng>::TRIG_INPUT, v);
                module.tick(&args, &inputs, &mut outputs);
            }
            black_box(outputs.voltage(Rosenchance::<Rng>::OUT_OUTPUT, 0))
        });
    });

    group.bench_function("guildensturn", |b| {
        let mut module = GuildensTurn::new(SAMPLE_RATE);
        let mut inputs = PortValues::new();
        inputs.set_mono(GuildensTurn::<Rng>::A_INPUT, 1.0);
        let mut outputs = PortValues::new();
        let args = ProcessArgs::new(SAMPLE_RATE);
        b.iter(|| {
            for i in 0..BUFFER_SIZE {
                let v = if i % 2 == 0 { 5.0 } else { 0.0 };
                inputs.set_mono(GuildensTurn::<Rng>::TRIG_INPUT, v);
                module.tick(&args, &inputs, &mut outputs);
            }
            black_box(outputs.voltage(GuildensTurn::<Rng>::OUT_OUTPUT, 0))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_random_walks,
    bench_chaos,
    bench_oscillator_banks,
    bench_state_machines
);
criterion_main!(benches);
