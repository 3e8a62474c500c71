//! Benchmarks for direction estimation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sound_compass::audio::FrameAccumulator;
use sound_compass::{DirectionEstimator, EstimatorConfig, StereoFrameBlock};

fn generate_interleaved(sample_rate: u32, duration_secs: f32, pan: f32) -> Vec<f32> {
    let num_frames = (sample_rate as f32 * duration_secs) as usize;
    let (left_gain, right_gain) = (1.0 - pan, pan);
    (0..num_frames)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            // Tone with a slow tremolo so block energies vary
            let envelope = 0.5 + 0.5 * (2.0 * std::f32::consts::PI * 3.0 * t).sin();
            let s = 0.3 * envelope * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            [s * left_gain, s * right_gain]
        })
        .collect()
}

fn generate_block(frames: usize, pan: f32) -> StereoFrameBlock {
    let interleaved = generate_interleaved(48000, frames as f32 / 48000.0, pan);
    StereoFrameBlock::from_interleaved(&interleaved, 2)
}

fn bench_energy(c: &mut Criterion) {
    let mut group = c.benchmark_group("energy");

    for frames in [256, 1024, 2048, 4096] {
        let block = generate_block(frames, 0.7);
        group.bench_with_input(BenchmarkId::new("mean_square", frames), &block, |b, block| {
            b.iter(|| black_box(block.energy().unwrap()))
        });
    }

    group.finish();
}

fn bench_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimator");
    let config = EstimatorConfig::default();

    for gamma in [1.0f32, 0.5] {
        let block = generate_block(2048, 0.8);
        let config = EstimatorConfig {
            angle_curve_gamma: gamma,
            ..config.clone()
        };
        group.bench_with_input(
            BenchmarkId::new("observe_2048", format!("gamma_{}", gamma)),
            &block,
            |b, block| {
                let mut estimator = DirectionEstimator::with_alpha(&config, 0.4).unwrap();
                b.iter(|| black_box(estimator.observe(block).unwrap()))
            },
        );
    }

    // One second of blocks, silence included
    let blocks: Vec<StereoFrameBlock> = (0..24)
        .map(|i| {
            if i % 4 == 0 {
                StereoFrameBlock::new(vec![0.0; 2048], vec![0.0; 2048])
            } else {
                generate_block(2048, (i % 10) as f32 / 10.0)
            }
        })
        .collect();
    group.bench_function("one_second_stream", |b| {
        b.iter_with_setup(
            || DirectionEstimator::with_alpha(&config, 0.4).unwrap(),
            |mut estimator| {
                for block in &blocks {
                    black_box(estimator.estimate(block).unwrap());
                }
            },
        )
    });

    group.finish();
}

fn bench_accumulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulator");

    // Typical WASAPI callback sizes
    for callback_frames in [441, 480, 1024] {
        let audio = generate_interleaved(48000, 1.0, 0.3);
        group.bench_with_input(
            BenchmarkId::new("push_interleaved", callback_frames),
            &audio,
            |b, audio| {
                b.iter_with_setup(
                    || FrameAccumulator::new(2, 2048),
                    |mut acc| {
                        for chunk in audio.chunks(callback_frames * 2) {
                            black_box(acc.push_interleaved(chunk));
                        }
                    },
                )
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_energy, bench_estimator, bench_accumulator);
criterion_main!(benches);
