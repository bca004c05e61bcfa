#![no_main]

use libfuzzer_sys::fuzz_target;
use macer::core::frame::{Reassembler, Report, REPORT_SIZE};

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes as a run of 64-byte reports
    let mut assembler = Reassembler::new();
    for chunk in data.chunks(REPORT_SIZE) {
        let mut report: Report = [0u8; REPORT_SIZE];
        report[..chunk.len()].copy_from_slice(chunk);
        if assembler.push(&report).is_err() {
            assembler.reset();
        }
    }
});
