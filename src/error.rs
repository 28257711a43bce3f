//! # Error Types
//!
//! Error values for every fallible operation in the core.
//!
//! Failures are reported as distinct variants so callers can pick a recovery
//! strategy by pattern matching instead of inspecting messages.
//!
//! ## Error Categories
//! - **Decode errors**: malformed BER, control or filter bytes. Recoverable at the
//!   message boundary: the enclosing operation is rejected.
//! - **Filter parse errors**: malformed RFC 4515 string filters, with a byte offset.
//! - **Syntax violations**: a value rejected by an attribute syntax.
//! - **I/O errors**: failures of the underlying stream or sink, passed through unchanged.
//!
//! Nothing in this crate logs or swallows an error; every error is returned to
//! the immediate caller.
//!
//! ## Example Usage
//! ```rust
//! use ldap_core::error::{LdapError, Result};
//! use ldap_core::filter::Filter;
//!
//! fn parse(text: &str) -> Result<Filter> {
//!     Ok(Filter::parse(text)?)
//! }
//!
//! match parse("(cn=Babs") {
//!     Err(LdapError::FilterParse(e)) => assert_eq!(e.offset(), 8),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

/// Static reason strings, borrowed to avoid allocations in error paths.
pub mod constants {
    /// BER decoding
    pub const ERR_EMPTY_INTEGER: &str = "integer has no content octets";
    pub const ERR_END_WITHOUT_START: &str = "end of sequence without matching start";

    /// Filter decoding and parsing
    pub const ERR_FILTER_EMPTY: &str = "filter is empty";
    pub const ERR_FILTER_EXPECTED_OPEN: &str = "expected '('";
    pub const ERR_FILTER_EXPECTED_CLOSE: &str = "expected ')'";
    pub const ERR_FILTER_UNBALANCED: &str = "unbalanced parentheses";
    pub const ERR_FILTER_BAD_ESCAPE: &str = "invalid escape sequence, expected two hex digits";
    pub const ERR_FILTER_BAD_ATTRIBUTE: &str = "invalid attribute description";
    pub const ERR_FILTER_MISSING_OPERATOR: &str = "missing filter operator";
    pub const ERR_FILTER_TRAILING: &str = "unexpected data after filter";
    pub const ERR_FILTER_NO_SUBSTRINGS: &str =
        "substring filter requires at least one of initial, any or final";
    pub const ERR_FILTER_EXTENSIBLE_EMPTY: &str =
        "extensible match requires a matching rule or an attribute type";
    pub const ERR_FILTER_EMPTY_NAME: &str = "attribute type and matching rule names must not be empty";
    pub const ERR_FILTER_DN_RULE: &str = "'dn' cannot name a matching rule, it is the dnAttributes flag";
    pub const ERR_FILTER_BAD_SUBSTRING_ORDER: &str =
        "substring components must be initial, then any, then final";
    pub const ERR_FILTER_UNEXPECTED_ASTERISK: &str = "unescaped '*' in assertion value";
    pub const ERR_FILTER_TOO_DEEP: &str = "filter nesting is too deep";

    /// Controls
    pub const ERR_CONTROL_UNEXPECTED_VALUE: &str = "control does not take a value";

    /// LDIF
    pub const ERR_WRITER_CLOSED: &str = "LDIF writer is closed";
    pub const ERR_LDIF_NO_DN: &str = "record does not start with a dn line";
    pub const ERR_LDIF_BAD_LINE: &str = "line is not an attribute description followed by ':'";
    pub const ERR_LDIF_BAD_BASE64: &str = "value is not valid base64";
    pub const ERR_LDIF_URL_DISABLED: &str = "URL values are not enabled";
    pub const ERR_LDIF_UNSUPPORTED_URL: &str = "only file:// URLs can be resolved";
    pub const ERR_LDIF_LEADING_CONTINUATION: &str = "continuation line without a preceding line";
}

/// Malformed BER, control or filter bytes.
///
/// Always recoverable at the message boundary. Whether the connection is kept
/// is the transport's decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated element: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("indefinite length encoding is not allowed")]
    IndefiniteLength,

    #[error("length field uses {0} octets (maximum 4)")]
    LengthTooLarge(usize),

    #[error("element of {size} bytes exceeds the maximum of {max} bytes")]
    ElementTooLarge { size: usize, max: usize },

    #[error("unexpected tag 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedTag { expected: u8, actual: u8 },

    #[error("unexpected tag 0x{tag:02X} in {context}")]
    InvalidTag { tag: u8, context: &'static str },

    #[error("integer is not minimally encoded")]
    NonMinimalInteger,

    #[error("integer of {0} octets does not fit in 64 bits")]
    IntegerTooLarge(usize),

    #[error("boolean must have exactly one content octet, found {0}")]
    InvalidBoolean(usize),

    #[error("null must have no content octets, found {0}")]
    InvalidNull(usize),

    #[error("value is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0} trailing bytes after element")]
    TrailingData(usize),

    #[error("nesting depth exceeds {0}")]
    TooDeep(usize),

    #[error("invalid filter: {0}")]
    InvalidFilter(&'static str),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("control {0} requires a value")]
    MissingControlValue(String),

    #[error("invalid value for control {oid}: {reason}")]
    InvalidControlValue { oid: String, reason: String },

    #[error("control {0} appears more than once")]
    DuplicateControl(String),

    #[error("{0}")]
    Structure(&'static str),
}

/// A malformed RFC 4515 string filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct FilterParseError {
    offset: usize,
    reason: &'static str,
}

impl FilterParseError {
    pub(crate) fn new(offset: usize, reason: &'static str) -> Self {
        Self { offset, reason }
    }

    /// Byte offset into the filter string where parsing failed
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Human-readable reason, advisory only
    pub fn reason(&self) -> &str {
        self.reason
    }
}

impl fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.reason, self.offset)
    }
}

// LdapError is the primary error type for all core operations
#[derive(Error, Debug)]
pub enum LdapError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("filter parse error: {0}")]
    FilterParse(#[from] FilterParseError),

    #[error("value violates syntax {syntax}: {reason}")]
    SyntaxViolation { syntax: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported critical extension: {0}")]
    UnsupportedCriticalExtension(String),

    #[error("malformed LDIF at line {line}: {reason}")]
    MalformedLdif { line: usize, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("unknown schema element: {0}")]
    UnknownSchemaElement(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LdapError {
    pub(crate) fn malformed_ldif(line: usize, reason: impl Into<String>) -> Self {
        LdapError::MalformedLdif {
            line,
            reason: reason.into(),
        }
    }
}

/// Type alias for Results using LdapError
pub type Result<T> = std::result::Result<T, LdapError>;
