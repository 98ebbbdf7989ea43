//! Fuzz target for the table parser and the error-cell and update loaders.
//!
//! Arbitrary bytes must never panic the parser, and whatever it accepts
//! must load as error cells or updates without panicking either.

#![no_main]

use libfuzzer_sys::fuzz_target;
use kiln::cells::{ErrorCells, updates_from_table};
use kiln::Parser;
use std::io::Write;

fuzz_target!(|data: &[u8]| {
    // Only process reasonable-sized inputs to avoid OOM
    if data.len() > 100_000 {
        return;
    }

    if let Ok(mut temp_file) = tempfile::NamedTempFile::new() {
        if temp_file.write_all(data).is_ok() {
            let Ok((table, _)) = Parser::new().parse_file(temp_file.path()) else {
                return;
            };
            if let Some(id) = table.headers.first().cloned() {
                let _ = ErrorCells::from_table(&table, &id);
                let _ = updates_from_table(&table, &id);
            }
        }
    }
});
