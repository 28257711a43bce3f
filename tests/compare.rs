//! Compare operations: assertion parsing, evaluation and result aggregation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use ldap_core::filter::{AttributeValueAssertion, ConditionResult, Filter};
use ldap_core::protocol::compare::{aggregate_compare_result, aggregate_compare_results, CompareAssertion};
use ldap_core::protocol::control::ControlRegistry;
use ldap_core::protocol::message::{LdapMessage, ProtocolOp};
use ldap_core::protocol::result::{LdapResult, ResultCode};
use ldap_core::protocol::Entry;
use ldap_core::schema::Schema;

fn directory() -> Vec<Entry> {
    vec![
        Entry::new("uid=bjensen,dc=example,dc=com").with_attribute("sn", ["Jensen"]),
        Entry::new("uid=rjensen,dc=example,dc=com").with_attribute("sn", ["JENSEN"]),
        Entry::new("uid=psmith,dc=example,dc=com").with_attribute("sn", ["Smith"]),
    ]
}

/// Result code a server would return for comparing `assertion` against `entry`
fn compare(entry: Option<&Entry>, assertion: &CompareAssertion) -> ResultCode {
    let Some(entry) = entry else {
        return ResultCode::NoSuchObject;
    };
    match Filter::equality(assertion.attribute.clone(), assertion.value.clone())
        .matches(entry, Schema::core())
    {
        ConditionResult::True => ResultCode::CompareTrue,
        ConditionResult::False => ResultCode::CompareFalse,
        ConditionResult::Undefined => ResultCode::UndefinedAttributeType,
    }
}

#[test]
fn test_true_false_true_aggregates_to_false() {
    let codes = [ResultCode::CompareTrue, ResultCode::CompareFalse, ResultCode::CompareTrue];
    let mut acc = ResultCode::Success;
    for code in codes {
        acc = aggregate_compare_result(acc, code);
    }
    assert_eq!(acc, ResultCode::CompareFalse);
    assert_eq!(aggregate_compare_results(codes), ResultCode::CompareFalse);
}

#[test]
fn test_compare_across_entries() {
    let entries = directory();
    let assertion = CompareAssertion::parse("sn:jensen").unwrap();

    let first_two = entries[..2].iter().map(|e| compare(Some(e), &assertion));
    assert_eq!(aggregate_compare_results(first_two), ResultCode::CompareTrue);

    let all = entries.iter().map(|e| compare(Some(e), &assertion));
    assert_eq!(aggregate_compare_results(all), ResultCode::CompareFalse);

    // an error sticks even when later comparisons succeed
    let with_missing = [None, Some(&entries[0])]
        .into_iter()
        .map(|e| compare(e, &assertion));
    assert_eq!(aggregate_compare_results(with_missing), ResultCode::NoSuchObject);
}

#[test]
fn test_base64_assertion_value() {
    // "Jensen"
    let assertion = CompareAssertion::parse("sn::SmVuc2Vu").unwrap();
    assert_eq!(compare(Some(&directory()[1]), &assertion), ResultCode::CompareTrue);
    assert!(CompareAssertion::parse("sn::not base64!").is_err());
    assert!(CompareAssertion::parse("no-separator").is_err());
}

#[test]
fn test_compare_request_and_response_on_the_wire() {
    let assertion = CompareAssertion::parse("sn:Jensen").unwrap();
    let request = LdapMessage::new(
        12,
        ProtocolOp::CompareRequest {
            dn: "uid=bjensen,dc=example,dc=com".into(),
            assertion: AttributeValueAssertion::new(assertion.attribute, assertion.value),
        },
    );
    let registry = ControlRegistry::with_defaults();
    let bytes = request.to_byte_string().unwrap();
    assert_eq!(LdapMessage::from_bytes(&bytes, &registry).unwrap(), request);

    let response = LdapMessage::new(
        12,
        ProtocolOp::CompareResponse(
            LdapResult::new(ResultCode::CompareTrue).with_diagnostic("matched"),
        ),
    );
    let decoded = LdapMessage::from_bytes(&response.to_byte_string().unwrap(), &registry).unwrap();
    assert_eq!(decoded.op.result().unwrap().code, ResultCode::CompareTrue);
    assert_eq!(ResultCode::CompareTrue.code(), 6);
    assert_eq!(ResultCode::from_code(5), ResultCode::CompareFalse);
}
