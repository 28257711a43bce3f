//! Integration tests for LDAP message framing
//!
//! Messages are framed straight out of the receive buffer; these tests check
//! partial input, back-to-back frames and the size limit.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use ldap_core::config::CodecConfig;
use ldap_core::core::codec::LdapMessageCodec;
use ldap_core::error::{DecodeError, LdapError};
use ldap_core::filter::Filter;
use ldap_core::protocol::control::{ControlRegistry, FlagControl};
use ldap_core::protocol::message::{LdapMessage, ProtocolOp, SearchRequest};
use ldap_core::protocol::result::{LdapResult, ResultCode};
use ldap_core::protocol::Entry;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

fn codec() -> LdapMessageCodec {
    LdapMessageCodec::new(Arc::new(ControlRegistry::with_defaults()))
}

fn search(id: i32) -> LdapMessage {
    LdapMessage::new(
        id,
        ProtocolOp::SearchRequest(SearchRequest::new(
            "dc=example,dc=com",
            Filter::parse("(&(objectClass=person)(uid=bjensen))").unwrap(),
        )),
    )
    .with_control(FlagControl::manage_dsa_it(false))
}

#[test]
fn test_codec_byte_at_a_time() {
    let mut codec = codec();
    let bytes = search(5).to_byte_string().unwrap();

    let mut buffer = BytesMut::new();
    for (i, byte) in bytes.iter().enumerate() {
        buffer.extend_from_slice(&[*byte]);
        let decoded = codec.decode(&mut buffer).expect("decode should not error");
        if i + 1 < bytes.len() {
            assert!(decoded.is_none());
        } else {
            assert_eq!(decoded.unwrap(), search(5));
        }
    }
    assert!(buffer.is_empty());
}

#[test]
fn test_codec_multiple_messages_in_buffer() {
    let mut codec = codec();
    let mut buffer = BytesMut::new();
    codec.encode(search(1), &mut buffer).unwrap();
    codec
        .encode(
            LdapMessage::new(
                2,
                ProtocolOp::SearchResultDone(LdapResult::new(ResultCode::Success)),
            ),
            &mut buffer,
        )
        .unwrap();
    codec
        .encode(LdapMessage::new(3, ProtocolOp::UnbindRequest), &mut buffer)
        .unwrap();

    let ids: Vec<i32> = std::iter::from_fn(|| codec.decode(&mut buffer).unwrap())
        .map(|m| m.message_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(buffer.len(), 0);
}

#[test]
fn test_codec_rejects_oversized_frame_from_header() {
    let config = CodecConfig {
        max_element_size: 64,
        ..CodecConfig::default()
    };
    let mut codec = LdapMessageCodec::with_config(Arc::new(ControlRegistry::with_defaults()), &config);

    // only the header of a 1000 byte SEQUENCE has arrived
    let mut buffer = BytesMut::from(&[0x30, 0x82, 0x03, 0xe8][..]);
    match codec.decode(&mut buffer) {
        Err(LdapError::Decode(DecodeError::ElementTooLarge { size, max })) => {
            assert_eq!(size, 1004);
            assert_eq!(max, 64);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_codec_malformed_frame_is_a_decode_error() {
    let mut codec = codec();
    // a complete frame whose content is not an LDAP message
    let mut buffer = BytesMut::from(&[0x30, 0x03, 0x04, 0x01, 0x41][..]);
    assert!(matches!(codec.decode(&mut buffer), Err(LdapError::Decode(_))));
}

#[tokio::test]
async fn test_framed_stream_over_duplex() {
    let (client, server) = tokio::io::duplex(64);
    let mut sink = FramedWrite::new(client, codec());
    let mut stream = FramedRead::new(server, codec());

    let writer = tokio::spawn(async move {
        for id in 1..=20 {
            let entry = Entry::new(format!("cn=user{id},dc=example,dc=com"))
                .with_attribute("cn", [format!("user{id}")])
                .with_attribute("description", ["x".repeat(200)]);
            sink.send(LdapMessage::new(id, ProtocolOp::SearchResultEntry(entry)))
                .await
                .unwrap();
        }
    });

    let mut received = Vec::new();
    while let Some(message) = stream.next().await {
        let message = message.unwrap();
        match &message.op {
            ProtocolOp::SearchResultEntry(entry) => {
                assert_eq!(entry.dn, format!("cn=user{},dc=example,dc=com", message.message_id));
            }
            other => panic!("unexpected op: {other:?}"),
        }
        received.push(message.message_id);
    }

    writer.await.unwrap();
    assert_eq!(received, (1..=20).collect::<Vec<_>>());
}
