#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = gaze_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated config must map onto a tracker config the builder accepts.
            let tcfg: gaze_core::TrackerCfg = (&cfg.tracker).into();
            assert!(gaze_core::builder::validate_cfg(&tcfg).is_ok());
        }
    }
});
