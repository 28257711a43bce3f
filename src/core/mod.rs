//! # Core Encoding Components
//!
//! Byte values and the BER wire encoding.
//!
//! This module is the foundation of the crate: every other component reads
//! and writes through these types and never parses TLV bytes by itself.
//!
//! ## Components
//! - **ByteString**: immutable octet string, zero-copy slicing
//! - **BER**: tag-length-value reader/writer over buffers and blocking streams
//! - **Codec**: Tokio codec framing whole LDAP messages over byte streams
//!
//! ## Wire Format
//! ```text
//! [Tag(1)] [Length(1..=5)] [Content(N)]
//! ```
//!
//! ## Limits
//! - Definite lengths only, at most 4 length octets
//! - Maximum element size: 16MB by default (see `CodecConfig`)
//! - Length validated against the input before any content is read

pub mod ber;
pub mod byte_string;
pub mod codec;
