#![no_main]
use gaze_core::pipeline::GazePipeline;
use gaze_core::{Reading, Rect, RegionSpec, TrackerCfg};
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Input {
    Gaze(f64, f64),
    NoSignal,
    Fault,
    Wait(u16),
}

fuzz_target!(|inputs: Vec<Input>| {
    let mut p = GazePipeline::new(TrackerCfg::default());
    for (i, (l, t)) in [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)].into_iter().enumerate() {
        let _ = p.watch(
            RegionSpec::new(format!("r{i}"))
                .bounds(Rect::new(l, t, l + 100.0, t + 100.0))
                .dwell_ms(500)
                .on_dwell(|_, _| {}),
        );
    }
    let mut now = 0u64;
    for input in inputs {
        let reading: gaze_core::pipeline::SourceResult = match input {
            Input::Gaze(x, y) => Ok(Reading::Gaze { x, y }),
            Input::NoSignal => Ok(Reading::NoSignal),
            Input::Fault => Err("fault".into()),
            Input::Wait(ms) => {
                now += u64::from(ms);
                let _ = p.fire_due(now);
                continue;
            }
        };
        now += 100;
        let _ = p.on_reading(now, reading);
        let _ = p.fire_due(now);
        // Every pending deadline lies in the future once due regions fired.
        if let Some(d) = p.next_deadline() {
            assert!(d > now);
        }
    }
});
