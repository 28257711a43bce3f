use super::{encode_integer, Tag};
use crate::core::byte_string::ByteString;
use crate::error::{LdapError, Result};
use std::io::Write;

/// Streaming BER encoder.
///
/// Primitive writes append directly to the innermost open constructed
/// element. Lengths are always definite: when a sequence is closed its
/// buffered content is emitted behind the minimal length field.
#[derive(Debug, Default)]
pub struct BerWriter {
    out: Vec<u8>,
    open: Vec<(Tag, Vec<u8>)>,
}

impl BerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            open: Vec::new(),
        }
    }

    fn target(&mut self) -> &mut Vec<u8> {
        match self.open.last_mut() {
            Some((_, buf)) => buf,
            None => &mut self.out,
        }
    }

    fn put_header(buf: &mut Vec<u8>, tag: Tag, len: usize) {
        buf.push(tag.raw());
        if len < 0x80 {
            buf.push(len as u8);
        } else {
            let bytes = len.to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count();
            buf.push(0x80 | (bytes.len() - skip) as u8);
            buf.extend_from_slice(&bytes[skip..]);
        }
    }

    fn put_primitive(&mut self, tag: Tag, content: &[u8]) -> &mut Self {
        let buf = self.target();
        Self::put_header(buf, tag, content.len());
        buf.extend_from_slice(content);
        self
    }

    /// TRUE is always written as `0xFF`
    pub fn write_boolean(&mut self, value: bool) -> &mut Self {
        self.write_boolean_with_tag(Tag::BOOLEAN, value)
    }

    pub fn write_boolean_with_tag(&mut self, tag: Tag, value: bool) -> &mut Self {
        self.put_primitive(tag, &[if value { 0xFF } else { 0x00 }])
    }

    pub fn write_integer(&mut self, value: i64) -> &mut Self {
        self.write_integer_with_tag(Tag::INTEGER, value)
    }

    pub fn write_integer_with_tag(&mut self, tag: Tag, value: i64) -> &mut Self {
        let (bytes, start) = encode_integer(value);
        self.put_primitive(tag, &bytes[start..])
    }

    pub fn write_enumerated(&mut self, value: i64) -> &mut Self {
        self.write_integer_with_tag(Tag::ENUMERATED, value)
    }

    pub fn write_null(&mut self) -> &mut Self {
        self.put_primitive(Tag::NULL, &[])
    }

    pub fn write_octet_string(&mut self, value: &[u8]) -> &mut Self {
        self.put_primitive(Tag::OCTET_STRING, value)
    }

    pub fn write_octet_string_with_tag(&mut self, tag: Tag, value: &[u8]) -> &mut Self {
        self.put_primitive(tag, value)
    }

    /// `[n]` IMPLICIT primitive holding `value`
    pub fn write_context_tag(&mut self, number: u8, value: &[u8]) -> &mut Self {
        self.put_primitive(Tag::context(number), value)
    }

    /// Append an already encoded element verbatim
    pub fn write_raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.target().extend_from_slice(encoded);
        self
    }

    pub fn write_start_sequence(&mut self, tag: Tag) -> &mut Self {
        self.open.push((tag, Vec::new()));
        self
    }

    pub fn write_start_set(&mut self) -> &mut Self {
        self.write_start_sequence(Tag::SET)
    }

    /// Close the innermost open constructed element
    pub fn write_end_sequence(&mut self) -> Result<&mut Self> {
        let (tag, content) = self
            .open
            .pop()
            .ok_or(LdapError::InvalidArgument("no open sequence to end"))?;
        let buf = self.target();
        Self::put_header(buf, tag, content.len());
        buf.extend_from_slice(&content);
        Ok(self)
    }

    pub fn write_end_set(&mut self) -> Result<&mut Self> {
        self.write_end_sequence()
    }

    /// Write a constructed element whose content is produced by `body`
    pub fn write_sequence<F>(&mut self, tag: Tag, body: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        let depth = self.open.len();
        self.open.push((tag, Vec::new()));
        body(self);
        // close whatever the body left open, then ours
        while self.open.len() > depth {
            let (tag, content) = match self.open.pop() {
                Some(entry) => entry,
                None => break,
            };
            let buf = self.target();
            Self::put_header(buf, tag, content.len());
            buf.extend_from_slice(&content);
        }
        self
    }

    /// Number of constructed elements still open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// The finished encoding; fails if a sequence is still open
    pub fn into_byte_string(self) -> Result<ByteString> {
        if !self.open.is_empty() {
            return Err(LdapError::InvalidArgument("sequence left open"));
        }
        Ok(ByteString::wrap(self.out))
    }

    /// The encoding with any still-open constructed elements closed
    pub fn finish(mut self) -> ByteString {
        while let Some((tag, content)) = self.open.pop() {
            let buf = self.target();
            Self::put_header(buf, tag, content.len());
            buf.extend_from_slice(&content);
        }
        ByteString::wrap(self.out)
    }

    /// Flush the finished encoding to `sink`
    pub fn write_to<W: Write>(self, sink: &mut W) -> Result<()> {
        let bytes = self.into_byte_string()?;
        sink.write_all(&bytes)?;
        Ok(())
    }
}
