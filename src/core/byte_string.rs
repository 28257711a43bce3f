//! # Byte Sequences
//!
//! `ByteString` is the immutable octet string used for every DN, attribute
//! value, control value and encoded element in the crate.
//!
//! It is backed by [`bytes::Bytes`], so cloning is a reference-count bump and
//! slicing never copies. Two constructors make ownership explicit:
//! - [`ByteString::copy_from_slice`] copies borrowed data into fresh storage
//! - [`ByteString::wrap`] takes ownership of an existing buffer without copying
//!
//! Both expose identical read operations. Equality and ordering are byte-wise.

use bytes::Bytes;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Immutable, possibly binary, octet string.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteString(Bytes);

impl ByteString {
    /// The empty byte string
    pub const fn empty() -> Self {
        ByteString(Bytes::new())
    }

    /// Wrap a static byte slice; no copy is made
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        ByteString(Bytes::from_static(bytes))
    }

    /// Take ownership of `bytes` without copying
    pub fn wrap(bytes: impl Into<Bytes>) -> Self {
        ByteString(bytes.into())
    }

    /// Copy `bytes` into newly allocated storage
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        ByteString(Bytes::copy_from_slice(bytes))
    }

    /// Number of octets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The UTF-8 view of this value, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// UTF-8 view with invalid sequences replaced by U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// A zero-copy view over `start..end`.
    ///
    /// Panics if the range is out of bounds, like slice indexing.
    pub fn sub_sequence(&self, start: usize, end: usize) -> ByteString {
        ByteString(self.0.slice(start..end))
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Lowercase hexadecimal rendering, e.g. `0a1b`
    pub fn to_hex(&self) -> String {
        use fmt::Write;
        let mut out = String::with_capacity(self.0.len() * 2);
        for b in self.0.iter() {
            let _ = write!(out, "{b:02x}");
        }
        out
    }

    /// Underlying shared buffer
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for ByteString {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for ByteString {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ByteString {
    fn from(s: &str) -> Self {
        ByteString::copy_from_slice(s.as_bytes())
    }
}

impl From<String> for ByteString {
    fn from(s: String) -> Self {
        ByteString::wrap(s.into_bytes())
    }
}

impl From<&[u8]> for ByteString {
    fn from(b: &[u8]) -> Self {
        ByteString::copy_from_slice(b)
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(v: Vec<u8>) -> Self {
        ByteString::wrap(v)
    }
}

impl From<Bytes> for ByteString {
    fn from(b: Bytes) -> Self {
        ByteString(b)
    }
}

impl PartialEq<[u8]> for ByteString {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ByteString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "ByteString({s:?})"),
            None => write!(f, "ByteString(0x{})", self.to_hex()),
        }
    }
}

/// Shows the UTF-8 text, or `0x`-prefixed hex for binary content
impl fmt::Display for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "0x{}", self.to_hex()),
        }
    }
}
