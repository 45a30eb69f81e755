//! Linearizer fuzz target: run the bundled formats over arbitrary bytes,
//! seeking to an offset taken from the input. Spans must stay contiguous.
//! Build with: cargo fuzz run linearize_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let mut reg = hexlayout::FormatRegistry::new();
    for src in [
        include_str!("../../formats/luks.hfmt"),
        include_str!("../../formats/mifare.hfmt"),
        include_str!("../../formats/strings.hfmt"),
    ] {
        if reg.load_source(src).is_err() {
            return;
        }
    }
    let target = data.first().copied().unwrap_or(0) as u64;
    let names: Vec<String> = reg.names().map(str::to_string).collect();
    for name in names {
        let mut cache = match reg.activate(&name, data.to_vec()) {
            Ok(c) => c,
            Err(_) => return,
        };
        let _ = cache.seek_to(target);
        let spans = cache.materialized();
        assert!(spans.windows(2).all(|w| w[0].to < w[1].from));
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run linearize_fuzz");
}
