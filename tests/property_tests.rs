//! Property-based tests using proptest
//!
//! Invariants of the codecs and matching rules over randomly generated input.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ldap_core::core::ber::{BerReader, BerWriter};
use ldap_core::core::byte_string::ByteString;
use ldap_core::filter::Filter;
use ldap_core::ldif::{fold_line, ChangeRecord, LdifChangeRecordReader, LdifChangeRecordWriter};
use ldap_core::protocol::control::{AssertionControl, Control, ControlRegistry, FlagControl};
use ldap_core::protocol::message::{LdapMessage, ProtocolOp, SearchRequest};
use ldap_core::protocol::Entry;
use ldap_core::schema::Schema;
use proptest::prelude::*;
use std::cmp::Ordering;

fn attribute() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["cn", "sn", "mail", "objectClass", "uidNumber", "x-custom", "2.5.4.3"])
        .prop_map(str::to_string)
}

fn value(min: usize) -> impl Strategy<Value = ByteString> {
    prop::collection::vec(any::<u8>(), min..16).prop_map(ByteString::from)
}

fn leaf() -> impl Strategy<Value = Filter> {
    prop_oneof![
        (attribute(), value(1)).prop_map(|(a, v)| Filter::equality(a, v)),
        (attribute(), value(1)).prop_map(|(a, v)| Filter::greater_or_equal(a, v)),
        (attribute(), value(1)).prop_map(|(a, v)| Filter::less_or_equal(a, v)),
        (attribute(), value(1)).prop_map(|(a, v)| Filter::approx(a, v)),
        attribute().prop_map(Filter::present),
        (
            prop_oneof![attribute(), Just(String::new())],
            prop::option::of(value(1)),
            prop::collection::vec(value(1), 0..3),
            prop::option::of(value(1)),
        )
            .prop_filter_map("needs a component", |(a, i, any, f)| {
                Filter::substrings(a, i, any, f).ok()
            }),
        (
            prop::option::of(prop::sample::select(vec!["caseExactMatch", "2.5.13.2", "dn", "DN", ""])),
            prop::option::of(prop_oneof![attribute(), Just(String::new())]),
            value(0),
            any::<bool>(),
        )
            .prop_filter_map("needs a printable rule or attribute", |(rule, a, v, dn)| {
                Filter::extensible(rule.map(str::to_string), a, v, dn).ok()
            }),
    ]
}

fn filter() -> impl Strategy<Value = Filter> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Filter::and),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Filter::or),
            inner.prop_map(Filter::not),
        ]
    })
}

// Property: any filter survives its BER encoding
proptest! {
    #[test]
    fn prop_filter_ber_roundtrip(f in filter()) {
        let decoded = Filter::from_ber(&f.to_ber()).expect("decoding should not fail");
        prop_assert_eq!(decoded, f);
    }
}

// Property: the printed form parses back to the same filter
proptest! {
    #[test]
    fn prop_filter_text_roundtrip(f in filter()) {
        let text = f.to_string();
        let parsed = Filter::parse(&text).expect("printed filter should parse");
        prop_assert_eq!(parsed, f);
    }
}

// Property: "dn" never names a matching rule, so `:dn` always means dnAttributes
proptest! {
    #[test]
    fn prop_dn_rule_name_refused(rule in "[dD][nN]", a in prop::option::of(attribute()), dn in any::<bool>()) {
        prop_assert!(Filter::extensible(Some(rule), a, "x", dn).is_err());
    }
}

// Property: controls with registered decoders survive encoding
proptest! {
    #[test]
    fn prop_control_roundtrip(f in filter(), critical in any::<bool>(), which in 0usize..4) {
        let control: Box<dyn Control> = match which {
            0 => Box::new(AssertionControl::new(critical, f)),
            1 => Box::new(FlagControl::manage_dsa_it(critical)),
            2 => Box::new(FlagControl::permissive_modify(critical)),
            _ => Box::new(FlagControl::subtree_delete(critical)),
        };

        let mut writer = BerWriter::new();
        control.write_to(&mut writer);
        let mut reader = BerReader::new(writer.finish());
        let decoded = ControlRegistry::with_defaults()
            .read_control(&mut reader)
            .expect("decoding should not fail");

        prop_assert!(decoded.as_ref() == control.as_ref());
        if let Some(assertion) = control.downcast_ref::<AssertionControl>() {
            let decoded = decoded.downcast_ref::<AssertionControl>().expect("typed control");
            prop_assert_eq!(decoded.filter(), assertion.filter());
        }
    }
}

// Property: cutting a search message anywhere never decodes
proptest! {
    #[test]
    fn prop_truncated_message_is_rejected(f in filter(), cut in any::<prop::sample::Index>()) {
        let message = LdapMessage::new(1, ProtocolOp::SearchRequest(SearchRequest::new("dc=example", f)));
        let bytes = message.to_byte_string().unwrap();
        let cut = cut.index(bytes.len());
        let prefix = bytes.sub_sequence(0, cut);
        prop_assert!(LdapMessage::from_bytes(&prefix, &ControlRegistry::with_defaults()).is_err());
    }
}

// Property: caseExactOrderingMatch is antisymmetric and transitive
proptest! {
    #[test]
    fn prop_ordering_rule_is_a_total_order(
        a in "[ -~]{0,12}",
        b in "[ -~]{0,12}",
        c in "[ -~]{0,12}",
    ) {
        let rule = Schema::core().matching_rule("caseExactOrderingMatch").unwrap();
        let cmp = |x: &str, y: &str| rule.compare(x.as_bytes(), y.as_bytes()).unwrap();

        prop_assert_eq!(cmp(&a, &b), cmp(&b, &a).reverse());
        if cmp(&a, &b) != Ordering::Greater && cmp(&b, &c) != Ordering::Greater {
            prop_assert_ne!(cmp(&a, &c), Ordering::Greater);
        }
    }
}

// Property: LDIF values come back byte for byte, and non-ASCII values are base64
proptest! {
    #[test]
    fn prop_ldif_value_roundtrip(raw in prop::collection::vec(any::<u8>(), 0..64)) {
        let record = ChangeRecord::Add(
            Entry::new("cn=test,dc=example,dc=com").with_attribute("description", [raw.clone()]),
        );
        let mut lines = Vec::new();
        LdifChangeRecordWriter::to_lines(&mut lines)
            .write_change_record(&record)
            .unwrap();

        let value_line = lines.iter().find(|l| l.starts_with("description")).unwrap();
        if raw.iter().any(|&b| b >= 0x80) {
            let encoded = value_line.strip_prefix("description:: ").expect("base64 form");
            prop_assert_eq!(STANDARD.decode(encoded).unwrap(), raw.clone());
        }

        let text = lines.join("\n");
        let mut reader = LdifChangeRecordReader::new(text.as_bytes());
        let read = reader.read_change_record().unwrap().expect("one record");
        prop_assert_eq!(read, record);
    }
}

// Property: folding respects the column and loses nothing
proptest! {
    #[test]
    fn prop_fold_line_bound_and_reconstruction(line in "[ -~]{0,300}", wrap in 2usize..100) {
        let pieces = fold_line(&line, wrap);
        for piece in &pieces {
            prop_assert!(piece.len() <= wrap, "{:?} exceeds {}", piece, wrap);
        }
        let mut rebuilt = pieces[0].clone();
        for piece in &pieces[1..] {
            rebuilt.push_str(piece.strip_prefix(' ').unwrap());
        }
        prop_assert_eq!(rebuilt, line);
    }
}

// Property: a wrapped writer never emits a long line, and the reader unfolds it
proptest! {
    #[test]
    fn prop_wrapped_ldif_reads_back(text in "[a-zA-Z0-9 ]{1,200}", wrap in 2usize..80) {
        let record = ChangeRecord::Add(
            Entry::new("cn=test,dc=example,dc=com").with_attribute("description", [text.trim()]),
        );
        let mut lines = Vec::new();
        LdifChangeRecordWriter::to_lines(&mut lines)
            .set_wrap_column(wrap)
            .write_change_record(&record)
            .unwrap();
        prop_assert!(lines.iter().all(|l| l.len() <= wrap));

        let joined = lines.join("\n");
        let read = LdifChangeRecordReader::new(joined.as_bytes())
            .read_change_record()
            .unwrap()
            .unwrap();
        prop_assert_eq!(read, record);
    }
}
