#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. A config that
    // validates must also build a pipeline.
    if let Ok(cfg) = toml::from_str::<vbt_config::Config>(data)
        && cfg.validate().is_ok()
    {
        let builder: vbt_core::PipelineBuilder = (&cfg).into();
        assert!(builder.build().is_ok(), "validated config failed to build");
    }
});
