#![no_main]

use libfuzzer_sys::fuzz_target;
use dotsign::signing::StrongNameKey;

fuzz_target!(|data: &[u8]| {
    if let Ok(key) = StrongNameKey::from_bytes(data) {
        let _ = key.public_key_token();
    }
});
