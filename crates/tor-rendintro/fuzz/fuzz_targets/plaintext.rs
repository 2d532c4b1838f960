#![no_main]
use libfuzzer_sys::fuzz_target;
use tor_rendintro::IntroPlaintext;

fuzz_target!(|data: &[u8]| {
    if let Some((len, body)) = data.split_first() {
        let _ = IntroPlaintext::parse(body, usize::from(*len));
    }
});
