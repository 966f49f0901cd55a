#![no_main]
//! Type detection over arbitrary bytes.

use libfuzzer_sys::fuzz_target;
use mediafuzz_core::error::fatal_setup_error;
use mediafuzz_core::gstreamer::GstFramework;
use mediafuzz_core::{FuzzTarget, HarnessConfig, TypefindHarness};

use std::sync::OnceLock;

fn harness() -> &'static TypefindHarness<GstFramework> {
    static HARNESS: OnceLock<TypefindHarness<GstFramework>> = OnceLock::new();
    HARNESS.get_or_init(|| {
        let config = HarnessConfig::from_env().unwrap_or_else(|e| fatal_setup_error(&e));
        TypefindHarness::new(GstFramework::new(), config)
    })
}

fuzz_target!(|data: &[u8]| {
    harness().test_one_input(data);
});
