#![no_main]

use ldap_core::ldif::LdifChangeRecordReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz LDIF parsing - test for panics and infinite loops
    for record in LdifChangeRecordReader::new(data).take(64) {
        if record.is_err() {
            break;
        }
    }
});
