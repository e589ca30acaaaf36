#![no_main]

use abiscope::{abi::serialize::write_unit, classfile::read_unit};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything the reader accepts and the writer encodes must be readable again
    if let Ok(unit) = read_unit(data) {
        if let Ok(bytes) = write_unit(&unit) {
            let reread = read_unit(&bytes).expect("serialized unit must parse");
            assert_eq!(reread.name, unit.name);
            assert_eq!(reread.members.len(), unit.members.len());
        }
    }
});
