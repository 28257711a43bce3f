//! Frozen registries shared across many tasks

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use ldap_core::core::codec::LdapMessageCodec;
use ldap_core::filter::{ConditionResult, Filter};
use ldap_core::protocol::control::{AssertionControl, ControlRegistry};
use ldap_core::protocol::message::{LdapMessage, ProtocolOp};
use ldap_core::protocol::Entry;
use ldap_core::schema::Schema;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::codec::{Decoder, Encoder};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_codec_with_shared_registry() {
    let registry = Arc::new(ControlRegistry::with_defaults());
    let iterations = 2_000i32;

    let mut tasks = JoinSet::new();
    for worker in 0..8i32 {
        let registry = Arc::clone(&registry);
        tasks.spawn(async move {
            let mut codec = LdapMessageCodec::new(registry);
            let mut buf = BytesMut::new();
            for i in 0..iterations {
                let filter = Filter::equality("cn", format!("user-{worker}-{i}"));
                let message = LdapMessage::new(i, ProtocolOp::DeleteRequest { dn: format!("cn={i}") })
                    .with_control(AssertionControl::new(true, filter.clone()));
                codec.encode(message, &mut buf).unwrap();

                let decoded = codec.decode(&mut buf).unwrap().unwrap();
                assert_eq!(decoded.message_id, i);
                let control = decoded.control("1.3.6.1.1.12").unwrap();
                assert_eq!(control.downcast_ref::<AssertionControl>().unwrap().filter(), &filter);
                assert!(buf.is_empty());
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_filter_evaluation_with_shared_schema() {
    let schema: &'static Schema = Schema::core();
    let entry = Arc::new(
        Entry::new("uid=bjensen,ou=People,dc=example,dc=com")
            .with_attribute("cn", ["Babs Jensen"])
            .with_attribute("uidNumber", ["1042"]),
    );
    let filters = Arc::new(vec![
        (Filter::parse("(cn=babs jensen)").unwrap(), ConditionResult::True),
        (Filter::parse("(uidNumber>=2000)").unwrap(), ConditionResult::False),
        (Filter::parse("(uidNumber>=lots)").unwrap(), ConditionResult::Undefined),
        (Filter::parse("(ou:dn:=people)").unwrap(), ConditionResult::True),
    ]);

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let entry = Arc::clone(&entry);
        let filters = Arc::clone(&filters);
        tasks.spawn(async move {
            for _ in 0..500 {
                for (filter, expected) in filters.iter() {
                    assert_eq!(filter.matches(&entry, schema), *expected);
                }
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
}

#[test]
fn registries_are_send_and_sync() {
    fn assert_shareable<T: Send + Sync>() {}
    assert_shareable::<ControlRegistry>();
    assert_shareable::<Schema>();
    assert_shareable::<LdapMessageCodec>();
}
