use gaze_core::{GazeSample, SmoothingBuffer};
use proptest::prelude::*;

fn sample(x: f64, y: f64, t: u64) -> GazeSample {
    GazeSample {
        x,
        y,
        timestamp_ms: t,
    }
}

#[test]
fn ten_identical_samples_are_exactly_stable() {
    let mut b = SmoothingBuffer::new(10, 50.0);
    for t in 0..10 {
        b.push(sample(100.0, 100.0, t * 100));
    }
    let p = b.compute_stable().unwrap();
    assert_eq!((p.x, p.y, p.stable), (100.0, 100.0, true));
}

#[test]
fn fifteen_pushes_keep_the_last_ten() {
    let mut b = SmoothingBuffer::new(10, 50.0);
    for i in 0..15u32 {
        b.push(sample(f64::from(i), 0.0, u64::from(i)));
    }
    assert_eq!(b.len(), 10);
    // Mean of 5..=14
    assert_eq!(b.compute_stable().unwrap().x, 9.5);
}

proptest! {
    #[test]
    fn tight_clusters_are_stable_at_their_mean(
        cx in -2000.0f64..4000.0,
        cy in -2000.0f64..4000.0,
        offsets in prop::collection::vec((-24.5f64..24.5, -24.5f64..24.5), 3..30),
    ) {
        // Every sample within 24.5 of the centre is within 49 of the mean
        let mut b = SmoothingBuffer::new(10, 50.0);
        for (i, (dx, dy)) in offsets.iter().enumerate() {
            b.push(sample(cx + dx, cy + dy, i as u64));
        }
        let kept = &offsets[offsets.len().saturating_sub(10)..];
        let n = kept.len() as f64;
        let mean_x = kept.iter().map(|(dx, _)| cx + dx).sum::<f64>() / n;
        let mean_y = kept.iter().map(|(_, dy)| cy + dy).sum::<f64>() / n;

        let p = b.compute_stable().unwrap();
        prop_assert!(p.stable);
        prop_assert!((p.x - mean_x).abs() < 1e-6);
        prop_assert!((p.y - mean_y).abs() < 1e-6);
    }

    #[test]
    fn never_exceeds_capacity(cap in 1usize..32, pushes in 0usize..100) {
        let mut b = SmoothingBuffer::new(cap, 50.0);
        for i in 0..pushes {
            b.push(sample(i as f64, 0.0, i as u64));
            prop_assert!(b.len() <= cap);
        }
        prop_assert_eq!(b.len(), pushes.min(cap));
        prop_assert_eq!(b.compute_stable().is_some(), b.len() >= 3);
    }

    #[test]
    fn reported_point_is_the_mean_even_when_unstable(
        xs in prop::collection::vec(-5000.0f64..5000.0, 3..10),
    ) {
        let mut b = SmoothingBuffer::new(10, 1.0);
        for (i, x) in xs.iter().enumerate() {
            b.push(sample(*x, 0.0, i as u64));
        }
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let p = b.compute_stable().unwrap();
        prop_assert!((p.x - mean).abs() < 1e-6);
    }
}
