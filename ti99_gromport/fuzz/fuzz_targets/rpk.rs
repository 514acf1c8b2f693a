//! Feeds random archives to the RPK reader.
#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use ti99_gromport::components::rpk::RpkReader;

fuzz_target!(|data: &[u8]| {
    let reader = RpkReader::new("/nonexistent/nvram");
    // Almost every input is rejected, but the reader should never panic!
    let _ = reader.open_archive(Cursor::new(data), "ti99_4a");
});
