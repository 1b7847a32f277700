#![no_main]

use libfuzzer_sys::fuzz_target;
use dotsign::metadata::view::AssemblyView;

fuzz_target!(|data: &[u8]| {
    if let Ok(view) = AssemblyView::from_mem("fuzz.dll".into(), data.to_vec()) {
        let _ = view.unsigned_references();
    }
});
