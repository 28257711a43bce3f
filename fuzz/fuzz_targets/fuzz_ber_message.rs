#![no_main]

use ldap_core::core::byte_string::ByteString;
use ldap_core::filter::Filter;
use ldap_core::protocol::control::ControlRegistry;
use ldap_core::protocol::message::LdapMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz message and filter decoding - must fail cleanly, never panic
    let bytes = ByteString::copy_from_slice(data);
    let registry = ControlRegistry::with_defaults();
    if let Ok(message) = LdapMessage::from_bytes(&bytes, &registry) {
        let encoded = message.to_byte_string().unwrap();
        let again = LdapMessage::from_bytes(&encoded, &registry).unwrap();
        assert_eq!(again, message);
    }
    let _ = Filter::from_ber(&bytes);
});
