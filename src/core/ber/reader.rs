use super::{decode_integer, Header, Tag, TlvContent, TlvNode};
use crate::core::byte_string::ByteString;
use crate::error::{constants, DecodeError};
use tracing::trace;

/// Default limit on nested constructed elements
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Cursor-based BER decoder over an in-memory buffer.
///
/// Constructed elements are entered with `read_start_sequence` (or
/// `read_start_set`) which narrows the readable window to the element's
/// content; `read_end_sequence` leaves it again. Octet strings are returned as
/// zero-copy views of the input buffer.
///
/// All operations are non-blocking. Decode failures are terminal: after an
/// error the cursor position is unspecified and the reader should be dropped.
#[derive(Debug, Clone)]
pub struct BerReader {
    buffer: ByteString,
    pos: usize,
    limit: usize,
    enclosing: Vec<usize>,
    max_depth: usize,
}

impl BerReader {
    pub fn new(buffer: impl Into<ByteString>) -> Self {
        let buffer = buffer.into();
        let limit = buffer.len();
        Self {
            buffer,
            pos: 0,
            limit,
            enclosing: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit how deeply constructed elements may nest
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bytes left in the current window (the innermost open sequence, or the buffer)
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    /// Whether another element starts inside the current window
    pub fn has_next_element(&self) -> bool {
        self.remaining() > 0
    }

    /// Offset of the cursor from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Tag of the next element without consuming it
    pub fn peek_tag(&self) -> Result<Tag, DecodeError> {
        if self.pos >= self.limit {
            return Err(DecodeError::Truncated {
                needed: 1,
                available: 0,
            });
        }
        Ok(Tag::new(self.buffer[self.pos]))
    }

    /// Consume the identifier octet of the next element
    pub fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let tag = self.peek_tag()?;
        if tag.number() == 0x1F {
            return Err(DecodeError::InvalidTag {
                tag: tag.raw(),
                context: "high tag number form",
            });
        }
        self.pos += 1;
        Ok(tag)
    }

    /// Consume the length octets of the current element.
    ///
    /// Fails when the declared length exceeds what is left in the window.
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let window = &self.buffer[self.pos..self.limit];
        let first = *window.first().ok_or(DecodeError::Truncated {
            needed: 1,
            available: 0,
        })?;

        let (octets, length) = if first & 0x80 == 0 {
            (1, usize::from(first))
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 {
                return Err(DecodeError::IndefiniteLength);
            }
            if count > 4 {
                return Err(DecodeError::LengthTooLarge(count));
            }
            if window.len() < 1 + count {
                return Err(DecodeError::Truncated {
                    needed: count,
                    available: window.len() - 1,
                });
            }
            let length = window[1..=count]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            (1 + count, length)
        };

        let available = window.len() - octets;
        if length > available {
            return Err(DecodeError::Truncated {
                needed: length,
                available,
            });
        }

        self.pos += octets;
        Ok(length)
    }

    /// Read a tag and require it to be `expected`
    pub fn expect_tag(&mut self, expected: Tag) -> Result<(), DecodeError> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(DecodeError::UnexpectedTag {
                expected: expected.raw(),
                actual: actual.raw(),
            });
        }
        Ok(())
    }

    fn read_content(&mut self, length: usize) -> ByteString {
        let value = self.buffer.sub_sequence(self.pos, self.pos + length);
        self.pos += length;
        value
    }

    fn read_primitive(&mut self, expected: Tag) -> Result<ByteString, DecodeError> {
        self.expect_tag(expected)?;
        let length = self.read_length()?;
        Ok(self.read_content(length))
    }

    pub fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        self.read_boolean_with_tag(Tag::BOOLEAN)
    }

    /// Any non-zero content octet is TRUE
    pub fn read_boolean_with_tag(&mut self, tag: Tag) -> Result<bool, DecodeError> {
        let content = self.read_primitive(tag)?;
        if content.len() != 1 {
            return Err(DecodeError::InvalidBoolean(content.len()));
        }
        Ok(content[0] != 0)
    }

    pub fn read_integer(&mut self) -> Result<i64, DecodeError> {
        self.read_integer_with_tag(Tag::INTEGER)
    }

    pub fn read_integer_with_tag(&mut self, tag: Tag) -> Result<i64, DecodeError> {
        let content = self.read_primitive(tag)?;
        decode_integer(&content)
    }

    /// Read an INTEGER and require it to fit in an `i32` (message IDs, limits)
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let value = self.read_integer()?;
        i32::try_from(value).map_err(|_| DecodeError::InvalidValue(format!("{value} out of range")))
    }

    pub fn read_enumerated(&mut self) -> Result<i64, DecodeError> {
        self.read_integer_with_tag(Tag::ENUMERATED)
    }

    pub fn read_null(&mut self) -> Result<(), DecodeError> {
        self.read_null_with_tag(Tag::NULL)
    }

    pub fn read_null_with_tag(&mut self, tag: Tag) -> Result<(), DecodeError> {
        let content = self.read_primitive(tag)?;
        if !content.is_empty() {
            return Err(DecodeError::InvalidNull(content.len()));
        }
        Ok(())
    }

    pub fn read_octet_string(&mut self) -> Result<ByteString, DecodeError> {
        self.read_primitive(Tag::OCTET_STRING)
    }

    pub fn read_octet_string_with_tag(&mut self, tag: Tag) -> Result<ByteString, DecodeError> {
        self.read_primitive(tag)
    }

    /// Read an OCTET STRING holding UTF-8 text (DNs, attribute descriptions, OIDs)
    pub fn read_octet_string_utf8(&mut self) -> Result<String, DecodeError> {
        self.read_utf8_with_tag(Tag::OCTET_STRING)
    }

    pub fn read_utf8_with_tag(&mut self, tag: Tag) -> Result<String, DecodeError> {
        let content = self.read_primitive(tag)?;
        content
            .as_str()
            .map(str::to_owned)
            .ok_or(DecodeError::InvalidUtf8)
    }

    pub fn read_start_sequence(&mut self) -> Result<(), DecodeError> {
        self.read_start_sequence_with_tag(Tag::SEQUENCE)
    }

    pub fn read_start_set(&mut self) -> Result<(), DecodeError> {
        self.read_start_sequence_with_tag(Tag::SET)
    }

    /// Enter a constructed element carrying `tag` (implicitly tagged SEQUENCE, SET or CHOICE)
    pub fn read_start_sequence_with_tag(&mut self, tag: Tag) -> Result<(), DecodeError> {
        if self.enclosing.len() >= self.max_depth {
            return Err(DecodeError::TooDeep(self.max_depth));
        }
        self.expect_tag(tag)?;
        let length = self.read_length()?;
        self.enclosing.push(self.limit);
        self.limit = self.pos + length;
        Ok(())
    }

    /// Leave the innermost constructed element.
    ///
    /// Components that were not read are skipped so that decoders tolerate
    /// extensions appended to a SEQUENCE definition.
    pub fn read_end_sequence(&mut self) -> Result<(), DecodeError> {
        let outer = self
            .enclosing
            .pop()
            .ok_or(DecodeError::Structure(constants::ERR_END_WITHOUT_START))?;
        if self.pos < self.limit {
            trace!(skipped = self.limit - self.pos, "skipping unread sequence components");
        }
        self.pos = self.limit;
        self.limit = outer;
        Ok(())
    }

    pub fn read_end_set(&mut self) -> Result<(), DecodeError> {
        self.read_end_sequence()
    }

    /// Skip the next element entirely
    pub fn skip_element(&mut self) -> Result<(), DecodeError> {
        self.read_tag()?;
        let length = self.read_length()?;
        self.pos += length;
        Ok(())
    }

    /// Read the next element as a tree of nodes
    pub fn read_element(&mut self) -> Result<TlvNode, DecodeError> {
        let tag = self.peek_tag()?;
        if !tag.is_constructed() {
            let value = self.read_primitive(tag)?;
            return Ok(TlvNode::primitive(tag, value));
        }

        self.read_start_sequence_with_tag(tag)?;
        let mut children = Vec::new();
        while self.has_next_element() {
            children.push(self.read_element()?);
        }
        self.read_end_sequence()?;

        Ok(TlvNode {
            tag,
            content: TlvContent::Constructed(children),
        })
    }

    /// Fail if anything is left in the current window
    pub fn ensure_consumed(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingData(n)),
        }
    }
}

/// Total size of the element at the start of `data`, if it is fully present
pub(crate) fn complete_element_len(data: &[u8]) -> Result<Option<usize>, DecodeError> {
    match Header::probe(data)? {
        Header::Incomplete(_) => Ok(None),
        Header::Complete {
            header_len,
            content_len,
            ..
        } => {
            let total = header_len + content_len;
            Ok((data.len() >= total).then_some(total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_short_length() {
        let mut reader = BerReader::new(vec![0x04, 0x02, b'h', b'i']);
        assert_eq!(reader.read_octet_string().unwrap(), "hi");
        assert!(!reader.has_next_element());
    }

    #[test]
    fn test_reader_long_length() {
        let mut data = vec![0x04, 0x81, 0x80];
        data.extend(std::iter::repeat(b'x').take(128));
        let mut reader = BerReader::new(data);
        assert_eq!(reader.read_octet_string().unwrap().len(), 128);
    }

    #[test]
    fn test_reader_declared_length_exceeds_input() {
        let mut reader = BerReader::new(vec![0x04, 0x05, b'a', b'b']);
        assert_eq!(
            reader.read_octet_string(),
            Err(DecodeError::Truncated {
                needed: 5,
                available: 2
            })
        );
    }

    #[test]
    fn test_reader_integer_and_negative_integer() {
        let mut reader = BerReader::new(vec![0x02, 0x02, 0x01, 0x00, 0x02, 0x01, 0xFF]);
        assert_eq!(reader.read_integer().unwrap(), 256);
        assert_eq!(reader.read_integer().unwrap(), -1);
    }

    #[test]
    fn test_reader_boolean() {
        let mut reader = BerReader::new(vec![0x01, 0x01, 0xFF, 0x01, 0x01, 0x00, 0x01, 0x02, 0, 0]);
        assert!(reader.read_boolean().unwrap());
        assert!(!reader.read_boolean().unwrap());
        assert_eq!(reader.read_boolean(), Err(DecodeError::InvalidBoolean(2)));
    }

    #[test]
    fn test_reader_enumerated_non_minimal() {
        let mut reader = BerReader::new(vec![0x0a, 0x02, 0x00, 0x05]);
        assert_eq!(reader.read_enumerated(), Err(DecodeError::NonMinimalInteger));
    }

    #[test]
    fn test_reader_wrong_tag() {
        let mut reader = BerReader::new(vec![0x02, 0x01, 0x01]);
        assert_eq!(
            reader.read_octet_string(),
            Err(DecodeError::UnexpectedTag {
                expected: 0x04,
                actual: 0x02
            })
        );
    }

    #[test]
    fn test_reader_sequence_window() {
        // SEQUENCE { INTEGER 1, OCTET STRING "a" } INTEGER 2
        let data = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, b'a', 0x02, 0x01, 0x02];
        let mut reader = BerReader::new(data);
        reader.read_start_sequence().unwrap();
        assert_eq!(reader.read_integer().unwrap(), 1);
        assert_eq!(reader.remaining(), 3);
        // leave the octet string unread, it is skipped
        reader.read_end_sequence().unwrap();
        assert_eq!(reader.read_integer().unwrap(), 2);
        reader.ensure_consumed().unwrap();
    }

    #[test]
    fn test_reader_inner_length_cannot_escape_window() {
        // SEQUENCE of length 3 whose octet string claims 4 bytes
        let data = vec![0x30, 0x03, 0x04, 0x04, b'a', b'b', b'c'];
        let mut reader = BerReader::new(data);
        reader.read_start_sequence().unwrap();
        assert!(matches!(reader.read_octet_string(), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_reader_end_without_start() {
        let mut reader = BerReader::new(Vec::new());
        assert!(reader.read_end_sequence().is_err());
    }

    #[test]
    fn test_reader_depth_limit() {
        let data = vec![0x30, 0x04, 0x30, 0x02, 0x30, 0x00];
        let mut reader = BerReader::new(data).with_max_depth(2);
        assert!(matches!(reader.read_element(), Err(DecodeError::TooDeep(2))));
    }

    #[test]
    fn test_read_element_tree() {
        let data = vec![0xa3, 0x07, 0x04, 0x02, b'c', b'n', 0x04, 0x01, b'x'];
        let mut reader = BerReader::new(data);
        let node = reader.read_element().unwrap();
        assert_eq!(node.tag, Tag::context_constructed(3));
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.children()[1].value().unwrap(), &ByteString::from("x"));
    }

    #[test]
    fn test_complete_element_len() {
        assert_eq!(complete_element_len(&[0x04, 0x02, b'a']).unwrap(), None);
        assert_eq!(complete_element_len(&[0x04, 0x02, b'a', b'b', 0xff]).unwrap(), Some(4));
        assert_eq!(complete_element_len(&[0x04]).unwrap(), None);
    }
}
