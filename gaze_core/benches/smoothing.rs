use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use gaze_core::pipeline::GazePipeline;
use gaze_core::{GazeSample, Reading, Rect, RegionSpec, SmoothingBuffer, TrackerCfg};

// Fixations with additive noise, drifting across the screen
fn synth_gaze(n: usize, noise_px: f64, seed: u64) -> Vec<(f64, f64)> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state as f64) / (u64::MAX as f64) * 2.0 - 1.0
    };
    (0..n)
        .map(|i| {
            let fixation = (i / 40) as f64;
            let cx = 200.0 + 150.0 * (fixation % 8.0);
            let cy = 150.0 + 120.0 * (fixation % 5.0);
            (cx + next() * noise_px, cy + next() * noise_px)
        })
        .collect()
}

pub fn bench_buffer(c: &mut Criterion) {
    let trace = synth_gaze(4096, 20.0, 7);
    for cap in [10usize, 30] {
        c.bench_function(&format!("buffer_push_compute_cap{cap}"), |b| {
            b.iter_batched(
                || SmoothingBuffer::new(cap, 50.0),
                |mut buf| {
                    let mut stable = 0u32;
                    for (i, (x, y)) in trace.iter().enumerate() {
                        buf.push(GazeSample {
                            x: *x,
                            y: *y,
                            timestamp_ms: i as u64 * 100,
                        });
                        if buf.compute_stable().is_some_and(|p| p.stable) {
                            stable += 1;
                        }
                    }
                    black_box(stable)
                },
                BatchSize::SmallInput,
            )
        });
    }
}

pub fn bench_pipeline(c: &mut Criterion) {
    let trace = synth_gaze(4096, 20.0, 11);
    c.bench_function("pipeline_64_regions", |b| {
        b.iter_batched(
            || {
                let mut p = GazePipeline::new(TrackerCfg::default());
                for i in 0..64 {
                    let left = f64::from(i % 8) * 150.0;
                    let top = f64::from(i / 8) * 120.0;
                    p.watch(
                        RegionSpec::new(format!("r{i}"))
                            .bounds(Rect::new(left, top, left + 150.0, top + 120.0))
                            .dwell_ms(1000)
                            .on_dwell(|_, _| {}),
                    )
                    .ok();
                }
                p
            },
            |mut p| {
                let mut events = 0usize;
                for (i, (x, y)) in trace.iter().enumerate() {
                    let now = i as u64 * 100;
                    events += p.on_reading(now, Ok(Reading::Gaze { x: *x, y: *y })).events.len();
                    events += p.fire_due(now).events.len();
                }
                black_box(events)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_buffer, bench_pipeline);
criterion_main!(benches);
