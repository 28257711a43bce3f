use super::{BerReader, Header};
use crate::core::byte_string::ByteString;
use crate::error::{DecodeError, LdapError, Result};
use std::io::{ErrorKind, Read};
use tracing::trace;

/// Default cap on a single element pulled from a stream (16 MiB)
pub const DEFAULT_MAX_ELEMENT_SIZE: usize = 16 * 1024 * 1024;

/// Pulls complete BER elements out of a blocking byte stream.
///
/// Each call reads exactly one element: the header is read first, then the
/// declared number of content octets. End of stream before the first octet
/// of an element is a clean end; anywhere later it is a truncation error.
pub struct BerStreamReader<R> {
    inner: R,
    max_element_size: usize,
}

impl<R: Read> BerStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_element_size: DEFAULT_MAX_ELEMENT_SIZE,
        }
    }

    pub fn with_max_element_size(mut self, max: usize) -> Self {
        self.max_element_size = max;
        self
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next whole element (header included), or `None` at end of stream
    pub fn read_element_bytes(&mut self) -> Result<Option<ByteString>> {
        let mut buf = Vec::with_capacity(8);

        let mut first = [0u8; 1];
        if !self.fill(&mut first, 0)? {
            return Ok(None);
        }
        buf.push(first[0]);

        let (header_len, content_len) = loop {
            match Header::probe(&buf)? {
                Header::Complete {
                    header_len,
                    content_len,
                    ..
                } => break (header_len, content_len),
                Header::Incomplete(more) => {
                    let start = buf.len();
                    buf.resize(start + more, 0);
                    if !self.fill(&mut buf[start..], start)? {
                        return Err(truncated(start + more, start));
                    }
                }
            }
        };

        let total = header_len + content_len;
        if total > self.max_element_size {
            return Err(DecodeError::ElementTooLarge {
                size: total,
                max: self.max_element_size,
            }
            .into());
        }

        buf.resize(total, 0);
        if !self.fill(&mut buf[header_len..], header_len)? {
            return Err(truncated(total, header_len));
        }

        trace!(bytes = total, "read BER element from stream");
        Ok(Some(ByteString::wrap(buf)))
    }

    /// Read the next element and position a [`BerReader`] over it
    pub fn read_element(&mut self) -> Result<Option<BerReader>> {
        Ok(self.read_element_bytes()?.map(BerReader::new))
    }

    /// Fill `dst` completely. Returns `false` if the stream ended before the
    /// first byte; a partial fill is reported as truncation.
    fn fill(&mut self, dst: &mut [u8], already: usize) -> Result<bool> {
        let mut filled = 0;
        while filled < dst.len() {
            match self.inner.read(&mut dst[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(truncated(already + dst.len(), already + filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LdapError::Io(e)),
            }
        }
        Ok(true)
    }
}

fn truncated(needed: usize, available: usize) -> LdapError {
    DecodeError::Truncated { needed, available }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_consecutive_elements() {
        let data = vec![0x04, 0x01, b'a', 0x02, 0x01, 0x07];
        let mut stream = BerStreamReader::new(Cursor::new(data));

        let mut first = stream.read_element().unwrap().unwrap();
        assert_eq!(first.read_octet_string().unwrap(), "a");

        let mut second = stream.read_element().unwrap().unwrap();
        assert_eq!(second.read_integer().unwrap(), 7);

        assert!(stream.read_element().unwrap().is_none());
    }

    #[test]
    fn test_eof_inside_length_is_truncation() {
        let mut stream = BerStreamReader::new(Cursor::new(vec![0x30, 0x82, 0x01]));
        match stream.read_element_bytes() {
            Err(LdapError::Decode(DecodeError::Truncated { .. })) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn test_eof_inside_content_is_truncation() {
        let mut stream = BerStreamReader::new(Cursor::new(vec![0x04, 0x05, b'a']));
        assert!(matches!(
            stream.read_element_bytes(),
            Err(LdapError::Decode(DecodeError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_oversized_element_is_rejected() {
        let mut stream =
            BerStreamReader::new(Cursor::new(vec![0x04, 0x82, 0x10, 0x00])).with_max_element_size(64);
        assert!(matches!(
            stream.read_element_bytes(),
            Err(LdapError::Decode(DecodeError::ElementTooLarge { max: 64, .. }))
        ));
    }
}
