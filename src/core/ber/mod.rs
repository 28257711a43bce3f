//! # `ber`
//!
//! Types and primitives for the ASN.1 Basic Encoding Rules as used by LDAPv3
//! (RFC 4511 §5.1).
//!
//! Every element is a tag-length-value triple. LDAP restricts BER to:
//! - single-octet tags (tag numbers below 31)
//! - definite-length encoding only
//! - `0xFF` for BOOLEAN TRUE on output (any non-zero octet is accepted as TRUE)
//!
//! [`BerReader`] decodes from an in-memory buffer, [`BerStreamReader`] pulls
//! whole elements from a blocking [`std::io::Read`], and [`BerWriter`]
//! produces encodings. Everything above this module (controls, filters,
//! messages) is written in terms of these primitives only.

pub mod reader;
pub mod stream;
pub mod writer;

pub use reader::BerReader;
pub use stream::BerStreamReader;
pub use writer::BerWriter;

use crate::core::byte_string::ByteString;
use crate::error::{constants, DecodeError};

/// Represents the class of the tag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Class {
    Universal = 0,
    Application = 1,
    ContextSpecific = 2,
    Private = 3,
}

/// Represents whether or not the type is Primitive or Constructed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Aspect {
    Primitive = 0,
    Constructed = 1,
}

/// A single-octet BER identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tag(u8);

impl Tag {
    pub const BOOLEAN: Tag = Tag::from_parts(Class::Universal, Aspect::Primitive, 0x01);
    pub const INTEGER: Tag = Tag::from_parts(Class::Universal, Aspect::Primitive, 0x02);
    pub const OCTET_STRING: Tag = Tag::from_parts(Class::Universal, Aspect::Primitive, 0x04);
    pub const NULL: Tag = Tag::from_parts(Class::Universal, Aspect::Primitive, 0x05);
    pub const ENUMERATED: Tag = Tag::from_parts(Class::Universal, Aspect::Primitive, 0x0a);
    pub const SEQUENCE: Tag = Tag::from_parts(Class::Universal, Aspect::Constructed, 0x10);
    pub const SET: Tag = Tag::from_parts(Class::Universal, Aspect::Constructed, 0x11);

    /// Construct a new `Tag` from its raw identifier octet
    pub const fn new(byte: u8) -> Self {
        Tag(byte)
    }

    pub const fn from_parts(class: Class, aspect: Aspect, number: u8) -> Self {
        Tag((number & 0x1F) | ((class as u8) << 6) | ((aspect as u8) << 5))
    }

    /// `[n]` IMPLICIT primitive
    pub const fn context(number: u8) -> Self {
        Tag::from_parts(Class::ContextSpecific, Aspect::Primitive, number)
    }

    /// `[n]` constructed
    pub const fn context_constructed(number: u8) -> Self {
        Tag::from_parts(Class::ContextSpecific, Aspect::Constructed, number)
    }

    /// `[APPLICATION n]` primitive
    pub const fn application(number: u8) -> Self {
        Tag::from_parts(Class::Application, Aspect::Primitive, number)
    }

    /// `[APPLICATION n]` constructed
    pub const fn application_constructed(number: u8) -> Self {
        Tag::from_parts(Class::Application, Aspect::Constructed, number)
    }

    /// Get the `Class` of the tag
    pub fn class(self) -> Class {
        match self.0 >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::ContextSpecific,
            _ => Class::Private,
        }
    }

    /// Get the `Aspect` of the tag
    pub fn aspect(self) -> Aspect {
        if self.is_constructed() {
            Aspect::Constructed
        } else {
            Aspect::Primitive
        }
    }

    pub fn is_constructed(self) -> bool {
        self.0 & 0x20 != 0
    }

    /// Get the tag number
    pub fn number(self) -> u8 {
        self.0 & 0x1F
    }

    /// Get the raw value of the tag
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Decoded tag-length-value element.
///
/// The length is implied by the content: for a primitive node it is the
/// content length, for a constructed node the sum of the encoded children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlvNode {
    pub tag: Tag,
    pub content: TlvContent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TlvContent {
    Primitive(ByteString),
    Constructed(Vec<TlvNode>),
}

impl TlvNode {
    pub fn primitive(tag: Tag, value: impl Into<ByteString>) -> Self {
        TlvNode {
            tag,
            content: TlvContent::Primitive(value.into()),
        }
    }

    pub fn constructed(tag: Tag, children: Vec<TlvNode>) -> Self {
        TlvNode {
            tag,
            content: TlvContent::Constructed(children),
        }
    }

    /// Length of the content octets once encoded
    pub fn content_length(&self) -> usize {
        match &self.content {
            TlvContent::Primitive(value) => value.len(),
            TlvContent::Constructed(children) => children.iter().map(TlvNode::encoded_length).sum(),
        }
    }

    /// Length of the whole element (identifier, length and content octets)
    pub fn encoded_length(&self) -> usize {
        let content = self.content_length();
        1 + length_octets(content) + content
    }

    pub fn children(&self) -> &[TlvNode] {
        match &self.content {
            TlvContent::Constructed(children) => children,
            TlvContent::Primitive(_) => &[],
        }
    }

    pub fn value(&self) -> Option<&ByteString> {
        match &self.content {
            TlvContent::Primitive(value) => Some(value),
            TlvContent::Constructed(_) => None,
        }
    }

    /// Append the encoding of this node to `writer`
    pub fn write_to(&self, writer: &mut BerWriter) {
        match &self.content {
            TlvContent::Primitive(value) => {
                writer.write_octet_string_with_tag(self.tag, value);
            }
            TlvContent::Constructed(children) => {
                writer.write_sequence(self.tag, |w| {
                    for child in children {
                        child.write_to(w);
                    }
                });
            }
        }
    }
}

/// Outcome of inspecting the identifier and length octets at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// At least this many more bytes are required before the header can be read
    Incomplete(usize),
    Complete {
        tag: Tag,
        header_len: usize,
        content_len: usize,
    },
}

impl Header {
    /// Inspect the header at the start of `data` without consuming anything.
    ///
    /// Does not check that the content is present; callers compare
    /// `header_len + content_len` against what they hold.
    pub fn probe(data: &[u8]) -> Result<Header, DecodeError> {
        let Some(&identifier) = data.first() else {
            return Ok(Header::Incomplete(2));
        };
        let tag = Tag::new(identifier);
        if tag.number() == 0x1F {
            return Err(DecodeError::InvalidTag {
                tag: identifier,
                context: "high tag number form",
            });
        }

        let Some(&first) = data.get(1) else {
            return Ok(Header::Incomplete(1));
        };
        if first & 0x80 == 0 {
            return Ok(Header::Complete {
                tag,
                header_len: 2,
                content_len: usize::from(first),
            });
        }

        let octets = usize::from(first & 0x7F);
        if octets == 0 {
            return Err(DecodeError::IndefiniteLength);
        }
        if octets > 4 {
            return Err(DecodeError::LengthTooLarge(octets));
        }
        let available = data.len() - 2;
        if available < octets {
            return Ok(Header::Incomplete(octets - available));
        }

        let content_len = data[2..2 + octets]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));

        Ok(Header::Complete {
            tag,
            header_len: 2 + octets,
            content_len,
        })
    }
}

/// Number of octets the length field takes for `len` content octets
pub(crate) fn length_octets(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        let significant = (usize::BITS - len.leading_zeros()).div_ceil(8) as usize;
        1 + significant
    }
}

/// Decode a two's complement INTEGER/ENUMERATED body, enforcing minimal encoding
pub(crate) fn decode_integer(content: &[u8]) -> Result<i64, DecodeError> {
    match content.len() {
        0 => return Err(DecodeError::Structure(constants::ERR_EMPTY_INTEGER)),
        len if len > 8 => return Err(DecodeError::IntegerTooLarge(len)),
        _ => {}
    }

    if content.len() > 1 {
        let redundant_zero = content[0] == 0x00 && content[1] & 0x80 == 0;
        let redundant_ones = content[0] == 0xFF && content[1] & 0x80 != 0;
        if redundant_zero || redundant_ones {
            return Err(DecodeError::NonMinimalInteger);
        }
    }

    let mut bytes = if content[0] & 0x80 == 0x80 {
        [0xFF; 8]
    } else {
        [0x00; 8]
    };
    bytes[8 - content.len()..].copy_from_slice(content);

    Ok(i64::from_be_bytes(bytes))
}

/// Minimal two's complement octets for `value`
pub(crate) fn encode_integer(value: i64) -> ([u8; 8], usize) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
        let redundant_ones = bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0;
        if redundant_zero || redundant_ones {
            start += 1;
        } else {
            break;
        }
    }
    (bytes, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags() {
        assert_eq!(Tag::from_parts(Class::Universal, Aspect::Primitive, 0), Tag::new(0x00));
        assert_eq!(Tag::from_parts(Class::Application, Aspect::Primitive, 0), Tag::new(0x40));
        assert_eq!(Tag::context_constructed(1), Tag::new(0xa1));
        assert_eq!(Tag::from_parts(Class::Universal, Aspect::Constructed, 5), Tag::new(0x25));
        assert_eq!(Tag::SEQUENCE.raw(), 0x30);
        assert_eq!(Tag::new(0x87).class(), Class::ContextSpecific);
        assert_eq!(Tag::new(0x87).number(), 7);
        assert_eq!(Tag::new(0xa3).aspect(), Aspect::Constructed);
    }

    #[test]
    fn probe_short_and_long_form() {
        assert_eq!(Header::probe(&[]), Ok(Header::Incomplete(2)));
        assert_eq!(Header::probe(&[0x04]), Ok(Header::Incomplete(1)));
        assert_eq!(
            Header::probe(&[0x04, 0x03]),
            Ok(Header::Complete {
                tag: Tag::OCTET_STRING,
                header_len: 2,
                content_len: 3
            })
        );
        assert_eq!(Header::probe(&[0x30, 0x82, 0x01]), Ok(Header::Incomplete(1)));
        assert_eq!(
            Header::probe(&[0x30, 0x82, 0x01, 0x00]),
            Ok(Header::Complete {
                tag: Tag::SEQUENCE,
                header_len: 4,
                content_len: 256
            })
        );
        assert_eq!(Header::probe(&[0x30, 0x80]), Err(DecodeError::IndefiniteLength));
        assert_eq!(Header::probe(&[0x30, 0x85]), Err(DecodeError::LengthTooLarge(5)));
        assert!(Header::probe(&[0x1F, 0x01]).is_err());
    }

    #[test]
    fn integer_minimal_forms() {
        for value in [0i64, 1, 127, 128, 255, 256, -1, -128, -129, i64::MAX, i64::MIN] {
            let (bytes, start) = encode_integer(value);
            assert_eq!(decode_integer(&bytes[start..]), Ok(value), "value {value}");
        }
        assert_eq!(&encode_integer(128).0[encode_integer(128).1..], &[0x00, 0x80]);
        assert_eq!(&encode_integer(-128).0[encode_integer(-128).1..], &[0x80]);
    }

    #[test]
    fn integer_rejects_redundant_octets() {
        assert_eq!(decode_integer(&[0x00, 0x01]), Err(DecodeError::NonMinimalInteger));
        assert_eq!(decode_integer(&[0xFF, 0x80]), Err(DecodeError::NonMinimalInteger));
        assert_eq!(decode_integer(&[0x00, 0x80]), Ok(128));
        assert_eq!(decode_integer(&[0xFF, 0x7F]), Ok(-129));
        assert_eq!(decode_integer(&[0; 9]), Err(DecodeError::IntegerTooLarge(9)));
        assert!(decode_integer(&[]).is_err());
    }

    #[test]
    fn length_octet_counts() {
        assert_eq!(length_octets(0), 1);
        assert_eq!(length_octets(127), 1);
        assert_eq!(length_octets(128), 2);
        assert_eq!(length_octets(255), 2);
        assert_eq!(length_octets(256), 3);
        assert_eq!(length_octets(65_536), 4);
    }

    #[test]
    fn tlv_node_lengths() {
        let node = TlvNode::constructed(
            Tag::SEQUENCE,
            vec![
                TlvNode::primitive(Tag::OCTET_STRING, "cn"),
                TlvNode::primitive(Tag::BOOLEAN, vec![0xFF]),
            ],
        );
        assert_eq!(node.content_length(), 7);
        assert_eq!(node.encoded_length(), 9);
        assert_eq!(node.children().len(), 2);
        assert!(node.value().is_none());
    }
}
