#![no_main]

use ldap_core::filter::Filter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // whatever parses must print to something that parses to the same filter
    if let Ok(filter) = Filter::parse(text) {
        let printed = filter.to_string();
        assert_eq!(Filter::parse(&printed).unwrap(), filter);
        assert_eq!(Filter::from_ber(&filter.to_ber()).unwrap(), filter);
    }
});
