#![no_main]
//! Container discovery over arbitrary bytes.

use libfuzzer_sys::fuzz_target;
use mediafuzz_core::error::fatal_setup_error;
use mediafuzz_core::gstreamer::GstFramework;
use mediafuzz_core::{DiscovererHarness, FuzzTarget, HarnessConfig};

use std::sync::OnceLock;

fn harness() -> &'static DiscovererHarness<GstFramework> {
    static HARNESS: OnceLock<DiscovererHarness<GstFramework>> = OnceLock::new();
    HARNESS.get_or_init(|| {
        let config = HarnessConfig::from_env().unwrap_or_else(|e| fatal_setup_error(&e));
        DiscovererHarness::new(GstFramework::new(), config)
    })
}

fuzz_target!(|data: &[u8]| {
    harness().test_one_input(data);
});
