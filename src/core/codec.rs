//! # LDAP Message Codec
//!
//! Tokio codec that frames complete LDAP messages out of a byte stream.
//!
//! Each LDAP message is a single top-level SEQUENCE, so framing only needs the
//! identifier and length octets: once `header + content` bytes are buffered the
//! frame is split off (zero copy) and decoded into an [`LdapMessage`].
//!
//! ## Limits
//! - Frames above `max_element_size` are rejected from the header alone,
//!   before the content is buffered
//! - Nesting inside a frame is bounded by `max_nesting_depth`

use crate::config::CodecConfig;
use crate::core::ber::{BerReader, Header};
use crate::core::byte_string::ByteString;
use crate::error::{DecodeError, LdapError, Result};
use crate::protocol::control::ControlRegistry;
use crate::protocol::message::LdapMessage;
use bytes::BytesMut;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Frames and decodes [`LdapMessage`]s; controls are decoded through the shared registry.
#[derive(Debug, Clone)]
pub struct LdapMessageCodec {
    registry: Arc<ControlRegistry>,
    max_element_size: usize,
    max_nesting_depth: usize,
}

impl LdapMessageCodec {
    pub fn new(registry: Arc<ControlRegistry>) -> Self {
        Self::with_config(registry, &CodecConfig::default())
    }

    pub fn with_config(registry: Arc<ControlRegistry>, config: &CodecConfig) -> Self {
        Self {
            registry,
            max_element_size: config.max_element_size,
            max_nesting_depth: config.max_nesting_depth,
        }
    }

    pub fn max_element_size(&self) -> usize {
        self.max_element_size
    }
}

impl Decoder for LdapMessageCodec {
    type Item = LdapMessage;
    type Error = LdapError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let total = match Header::probe(src)? {
            Header::Incomplete(more) => {
                src.reserve(more);
                return Ok(None);
            }
            Header::Complete {
                header_len,
                content_len,
                ..
            } => header_len + content_len,
        };

        if total > self.max_element_size {
            return Err(DecodeError::ElementTooLarge {
                size: total,
                max: self.max_element_size,
            }
            .into());
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = ByteString::wrap(src.split_to(total).freeze());
        trace!(bytes = total, "framed LDAP message");

        let mut reader = BerReader::new(frame).with_max_depth(self.max_nesting_depth);
        let message = LdapMessage::decode(&mut reader, &self.registry)?;
        reader.ensure_consumed()?;
        Ok(Some(message))
    }
}

impl Encoder<LdapMessage> for LdapMessageCodec {
    type Error = LdapError;

    fn encode(&mut self, item: LdapMessage, dst: &mut BytesMut) -> Result<()> {
        let bytes = item.to_byte_string()?;
        dst.reserve(bytes.len());
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}
