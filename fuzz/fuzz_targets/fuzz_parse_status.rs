#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Scraped pages arrive as arbitrary text; the parsers must never panic
    if let Ok(body) = std::str::from_utf8(data) {
        let _ = argus::sample::parse_status_page(body);
        let _ = argus::sample::parse_power_kw(body);
        let _ = argus::sample::parse_energy_kwh(body);
    }
});
